//! # TradingCat-Data
//! In-memory market data core for a multi-exchange candle alert service.
//!
//! * [`KLinesDataContainer`](store::KLinesDataContainer): concurrent, sharded store holding a
//!   bounded, gap-repaired history of candles for every `(exchange, symbol, interval)` series.
//! * [`Detector`](detector::Detector): evaluates fresh 1 minute candles against each online
//!   session's [`Filter`](filter::Filter) and confirms matches against stored history.
//! * [`DetectorWorker`](detector::worker::DetectorWorker): runs the [`Detector`](detector::Detector)
//!   on a single tokio task, delivering [`Detection`](detector::Detection)s over a channel.
//! * [`TradingData`](trading::TradingData): ingestion facade feeding both.
//!
//! Neither the store nor the detector performs I/O. Wire encodings on the value types exist so
//! transport layers can share them.

/// All [`Error`](std::error::Error)s generated in TradingCat-Data.
pub mod error;

/// [`StockExchangeId`](exchange::StockExchangeId) identity type.
pub mod exchange;

/// Candle value type and its identity types.
pub mod kline;

/// Per-session alert rules and blacklists.
pub mod filter;

/// Sharded candle store.
pub mod store;

/// Candle alert detection.
pub mod detector;

/// Ingestion facade over the store and detector.
pub mod trading;

pub use detector::{Detection, Detector, DetectorConfig, KLineDetectData, SessionId};
pub use error::DataError;
pub use exchange::StockExchangeId;
pub use filter::{BlackListFilterData, Filter, FilterTypes, KLineFilterData, UserConfig};
pub use kline::{KLine, KLineId, KLineType, Symbol};
pub use store::{InsertStats, KLinesDataContainer, StoreConfig};
pub use trading::TradingData;
