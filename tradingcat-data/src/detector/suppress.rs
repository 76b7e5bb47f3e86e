use crate::{exchange::StockExchangeId, kline::KLineId};
use fnv::FnvHashMap;

/// Remembers which instruments alerted recently so that re-delivered or overlapping candle
/// batches do not produce a storm of identical alerts.
///
/// Suppression is global across sessions: once any session was alerted for an
/// `(exchange, KLineId)`, no session is alerted again for it until `window_ms` has passed.
#[derive(Debug, Clone)]
pub struct AlertSuppressor {
    window_ms: i64,
    alerted: FnvHashMap<StockExchangeId, FnvHashMap<KLineId, i64>>,
}

impl AlertSuppressor {
    pub fn new(window_ms: i64) -> Self {
        Self {
            window_ms,
            alerted: FnvHashMap::default(),
        }
    }

    pub fn is_suppressed(
        &self,
        stock_exchange_id: &StockExchangeId,
        kline_id: &KLineId,
        now: i64,
    ) -> bool {
        self.alerted
            .get(stock_exchange_id)
            .and_then(|klines| klines.get(kline_id))
            .is_some_and(|alerted_at| now.saturating_sub(*alerted_at) < self.window_ms)
    }

    pub fn record(&mut self, stock_exchange_id: &StockExchangeId, kline_id: &KLineId, now: i64) {
        self.alerted
            .entry(stock_exchange_id.clone())
            .or_default()
            .insert(kline_id.clone(), now);
    }

    /// Forget every mark older than the suppression window.
    pub fn prune(&mut self, now: i64) {
        let window_ms = self.window_ms;
        self.alerted.retain(|_, klines| {
            klines.retain(|_, alerted_at| now.saturating_sub(*alerted_at) < window_ms);
            !klines.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.alerted.values().map(FnvHashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.alerted.is_empty()
    }
}
