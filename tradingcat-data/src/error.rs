use crate::{exchange::StockExchangeId, kline::KLineId, kline::Symbol};
use thiserror::Error;

/// All errors generated in `tradingcat-data`.
///
/// Every variant is a caller contract violation. Data anomalies such as duplicate,
/// out-of-order or stale candles are absorbed silently and never surface here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("no stock exchanges provided to KLinesDataContainer")]
    NoStockExchanges,

    #[error("StockExchangeId is empty")]
    EmptyStockExchangeId,

    #[error("KLineId is empty")]
    EmptyKLineId,

    #[error("unknown stock exchange: {0}")]
    UnknownStockExchange(StockExchangeId),

    #[error("kline batch is empty")]
    EmptyBatch,

    #[error("kline batch mixes series: expected {expected}, found {found}")]
    MixedBatch { expected: KLineId, found: KLineId },

    #[error("symbol has no alphanumeric character to shard on: {0:?}")]
    UnshardableSymbol(Symbol),

    #[error("invalid time range: start {start} must be strictly before end {end}")]
    InvalidRange { start: i64, end: i64 },

    #[error("unsupported kline interval: {0}")]
    UnknownInterval(String),

    #[error("{field} threshold {value} outside of bounds [{min}, {max}]")]
    ThresholdOutOfBounds {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("failed to parse user config: {0}")]
    UserConfig(String),

    #[error("detector worker terminated")]
    WorkerTerminated,
}

impl DataError {
    /// Determine if an error was caused by invalid input the caller could have rejected
    /// up front, as opposed to the [`DetectorWorker`](crate::detector::worker::DetectorWorker)
    /// having shut down.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_contract_violation(&self) -> bool {
        match self {
            DataError::WorkerTerminated => false,
            _ => true,
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(value: serde_json::Error) -> Self {
        Self::UserConfig(value.to_string())
    }
}
