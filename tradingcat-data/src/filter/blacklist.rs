use crate::{exchange::StockExchangeId, kline::KLineId};
use serde::{Deserialize, Serialize};

/// Exclusion entry: candles covered by this scope are never alerted on for the owning
/// session. An absent scope matches everything.
///
/// Wire encoding: `{"StockExchange": {"Name": ..}, "ID": {..}}`, both keys optional.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
pub struct BlackListFilterData {
    #[serde(rename = "StockExchange", default, skip_serializing_if = "Option::is_none")]
    pub stock_exchange_id: Option<StockExchangeId>,
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub kline_id: Option<KLineId>,
}

impl BlackListFilterData {
    pub fn new(stock_exchange_id: Option<StockExchangeId>, kline_id: Option<KLineId>) -> Self {
        Self {
            stock_exchange_id,
            kline_id,
        }
    }

    pub fn matches(&self, stock_exchange_id: &StockExchangeId, kline_id: &KLineId) -> bool {
        self.stock_exchange_id
            .as_ref()
            .is_none_or(|scope| scope == stock_exchange_id)
            && self.kline_id.as_ref().is_none_or(|scope| scope == kline_id)
    }
}
