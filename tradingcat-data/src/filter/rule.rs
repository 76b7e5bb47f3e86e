use crate::{error::DataError, exchange::StockExchangeId, kline::KLineId};
use serde::{Deserialize, Serialize};

const EPSILON: f64 = f32::EPSILON as f64;

/// Alert rule scoped to an optional exchange and optional [`KLineId`].
///
/// An absent scope matches everything. An absent threshold never triggers.
///
/// Wire encoding: `{"StockExchange": {"Name": ..}, "ID": {..}, "Delta": 5.0, "Volume": 2000.0}`,
/// every key optional.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct KLineFilterData {
    #[serde(rename = "StockExchange", default, skip_serializing_if = "Option::is_none")]
    pub stock_exchange_id: Option<StockExchangeId>,
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub kline_id: Option<KLineId>,
    #[serde(rename = "Delta", default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
    #[serde(rename = "Volume", default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl KLineFilterData {
    pub const MIN_DELTA: f64 = 1.0;
    pub const MAX_DELTA: f64 = 1_000_000.0;
    pub const MIN_VOLUME: f64 = 500.0;
    pub const MAX_VOLUME: f64 = 1_000_000.0;

    /// Rule scoped to every exchange and every series.
    pub fn unscoped(delta: f64, volume: f64) -> Result<Self, DataError> {
        let rule = Self {
            delta: Some(delta),
            volume: Some(volume),
            ..Default::default()
        };
        rule.validate().map(|_| rule)
    }

    pub fn with_stock_exchange_id(self, stock_exchange_id: StockExchangeId) -> Self {
        Self {
            stock_exchange_id: Some(stock_exchange_id),
            ..self
        }
    }

    pub fn with_kline_id(self, kline_id: KLineId) -> Self {
        Self {
            kline_id: Some(kline_id),
            ..self
        }
    }

    /// Check scopes are non-empty and thresholds lie within
    /// [`MIN_DELTA`](Self::MIN_DELTA)..=[`MAX_DELTA`](Self::MAX_DELTA) and
    /// [`MIN_VOLUME`](Self::MIN_VOLUME)..=[`MAX_VOLUME`](Self::MAX_VOLUME).
    pub fn validate(&self) -> Result<(), DataError> {
        if self
            .stock_exchange_id
            .as_ref()
            .is_some_and(StockExchangeId::is_empty)
        {
            return Err(DataError::EmptyStockExchangeId);
        }
        if self.kline_id.as_ref().is_some_and(KLineId::is_empty) {
            return Err(DataError::EmptyKLineId);
        }
        if let Some(delta) = self.delta {
            check_bounds("Delta", delta, Self::MIN_DELTA, Self::MAX_DELTA)?;
        }
        if let Some(volume) = self.volume {
            check_bounds("Volume", volume, Self::MIN_VOLUME, Self::MAX_VOLUME)?;
        }
        Ok(())
    }

    pub fn is_all_stock_exchange(&self) -> bool {
        self.stock_exchange_id.is_none()
    }

    pub fn is_all_kline_id(&self) -> bool {
        self.kline_id.is_none()
    }

    /// Determine if this rule's scope covers the provided exchange and series.
    pub fn matches(&self, stock_exchange_id: &StockExchangeId, kline_id: &KLineId) -> bool {
        self.stock_exchange_id
            .as_ref()
            .is_none_or(|scope| scope == stock_exchange_id)
            && self.kline_id.as_ref().is_none_or(|scope| scope == kline_id)
    }

    /// Delta threshold, treating an absent value as unreachable.
    pub fn delta_threshold(&self) -> f64 {
        self.delta.unwrap_or(f64::MAX)
    }

    /// Volume threshold, treating an absent value as unreachable.
    pub fn volume_threshold(&self) -> f64 {
        self.volume.unwrap_or(f64::MAX)
    }
}

fn check_bounds(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), DataError> {
    if value >= min - EPSILON && value <= max + EPSILON {
        Ok(())
    } else {
        Err(DataError::ThresholdOutOfBounds {
            field,
            value,
            min,
            max,
        })
    }
}
