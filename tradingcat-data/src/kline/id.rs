use super::interval::KLineType;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, StrExt};

/// Exchange specific trading pair symbol (eg/ "BTCUSDT", "1000PEPE-USDT").
#[derive(
    Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Display, Deserialize, Serialize,
)]
#[serde(transparent)]
pub struct Symbol(SmolStr);

impl Symbol {
    pub fn new<S>(symbol: S) -> Self
    where
        S: Into<SmolStr>,
    {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Base asset name with the quote currency and any separators removed.
    ///
    /// eg/ "btc-usdt-swap" -> "BTC", "1000PEPEUSDT" -> "1000PEPE".
    pub fn base_name(&self) -> SmolStr {
        let upper = self.0.to_uppercase_smolstr();
        let upper = upper.as_str();
        let base = match upper.find("USDT") {
            Some(quote_start) => &upper[..quote_start],
            None => upper,
        };

        base.chars()
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect()
    }

    /// First ASCII alphanumeric character of the symbol, used to select a storage shard.
    pub fn shard_char(&self) -> Option<char> {
        self.0.chars().find(char::is_ascii_alphanumeric)
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<SmolStr> for Symbol {
    fn from(value: SmolStr) -> Self {
        Self(value)
    }
}

/// Identifies one candle series within an exchange: a [`Symbol`] and its [`KLineType`].
///
/// Wire encoding: `{"Symbol": "BTCUSDT", "Type": "1m"}`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize)]
#[display("{symbol}:{interval}")]
pub struct KLineId {
    #[serde(rename = "Symbol")]
    pub symbol: Symbol,
    #[serde(rename = "Type")]
    pub interval: KLineType,
}

impl KLineId {
    pub fn new<S>(symbol: S, interval: KLineType) -> Self
    where
        S: Into<Symbol>,
    {
        Self {
            symbol: symbol.into(),
            interval,
        }
    }

    /// Same [`Symbol`], different [`KLineType`].
    pub fn with_interval(&self, interval: KLineType) -> Self {
        Self {
            symbol: self.symbol.clone(),
            interval,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_empty()
    }
}
