use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Unique identifier for a stock exchange (eg/ "BINANCE", "BYBIT_FUTURES", "OKX").
///
/// Compared by name. An empty name is representable so that wire input can be
/// deserialised, but it is rejected at every [`KLinesDataContainer`](crate::store::KLinesDataContainer)
/// entry point.
///
/// Wire encoding: `{"Name": "OKX"}`.
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display, Deserialize, Serialize,
)]
#[display("{name}")]
pub struct StockExchangeId {
    #[serde(rename = "Name", default)]
    name: SmolStr,
}

impl StockExchangeId {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl From<&str> for StockExchangeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
