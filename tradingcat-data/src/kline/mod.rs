use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub use self::{
    id::{KLineId, Symbol},
    interval::KLineType,
};

/// [`Symbol`] and [`KLineId`] identity types.
pub mod id;

/// [`KLineType`] candle intervals and their wire tokens.
pub mod interval;

/// A single OHLCV candle for one [`KLineId`].
///
/// Derived metrics ([`KLine::delta`], [`KLine::volume_notional`]) are computed lazily and
/// memoised. Fields are only settable through the builder methods, each of which returns a
/// fresh value, so a memoised metric can never go stale.
///
/// Wire encoding:
/// ```json
/// {"ID": {"Symbol": "BTCUSDT", "Type": "1m"}, "OT": 1700000000000, "O": 1.0, "H": 1.0,
///  "L": 1.0, "C": 1.0, "V": 1.0, "CT": 1700000060000, "QAV": 1.0}
/// ```
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct KLine {
    #[serde(rename = "ID")]
    id: KLineId,
    #[serde(rename = "OT")]
    open_time: i64,
    #[serde(rename = "O")]
    open: f64,
    #[serde(rename = "H")]
    high: f64,
    #[serde(rename = "L")]
    low: f64,
    #[serde(rename = "C")]
    close: f64,
    #[serde(rename = "V")]
    volume: f64,
    #[serde(rename = "CT")]
    close_time: i64,
    #[serde(rename = "QAV")]
    quote_asset_volume: f64,

    #[serde(skip)]
    delta: OnceLock<f64>,
    #[serde(skip)]
    volume_notional: OnceLock<f64>,
}

impl KLine {
    /// Construct a [`KLine`] spanning `[open_time, close_time]` with all prices and volumes
    /// zeroed.
    pub fn new(id: KLineId, open_time: i64, close_time: i64) -> Self {
        Self {
            id,
            open_time,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            volume: 0.0,
            close_time,
            quote_asset_volume: 0.0,
            delta: OnceLock::new(),
            volume_notional: OnceLock::new(),
        }
    }

    pub fn with_prices(self, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            delta: OnceLock::new(),
            volume_notional: OnceLock::new(),
            ..self
        }
    }

    pub fn with_volume(self, volume: f64, quote_asset_volume: f64) -> Self {
        Self {
            volume,
            quote_asset_volume,
            delta: OnceLock::new(),
            volume_notional: OnceLock::new(),
            ..self
        }
    }

    pub fn id(&self) -> &KLineId {
        &self.id
    }

    pub fn open_time(&self) -> i64 {
        self.open_time
    }

    pub fn close_time(&self) -> i64 {
        self.close_time
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn quote_asset_volume(&self) -> f64 {
        self.quote_asset_volume
    }

    /// Candle range as a percentage of the low: `(high - low) / low * 100`.
    ///
    /// Returns `0.0` when the low is (approximately) zero.
    pub fn delta(&self) -> f64 {
        *self.delta.get_or_init(|| {
            if self.low.abs() < f64::EPSILON {
                0.0
            } else {
                (self.high - self.low) / self.low * 100.0
            }
        })
    }

    /// Approximate traded notional: `(open + close) / 2 * volume`.
    pub fn volume_notional(&self) -> f64 {
        *self
            .volume_notional
            .get_or_init(|| (self.open + self.close) / 2.0 * self.volume)
    }

    /// Structural validity: non-empty id, `close_time > open_time`, and no negative price or
    /// volume.
    pub fn is_valid(&self) -> bool {
        !self.id.is_empty()
            && self.close_time > self.open_time
            && [
                self.open,
                self.high,
                self.low,
                self.close,
                self.volume,
                self.quote_asset_volume,
            ]
            .into_iter()
            .all(|value| value >= 0.0)
    }

    /// Zero volume candle carrying `previous.open` as its flat price, spanning
    /// `[open_time, open_time + interval]`. Used to repair gaps in a series.
    pub(crate) fn filler(previous: &KLine, open_time: i64) -> Self {
        let price = previous.open;
        Self::new(
            previous.id.clone(),
            open_time,
            open_time + previous.id.interval.as_millis(),
        )
        .with_prices(price, price, price, price)
    }
}

impl PartialEq for KLine {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.open_time == other.open_time
            && self.close_time == other.close_time
            && self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
            && self.quote_asset_volume == other.quote_asset_volume
    }
}
