use crate::{error::DataError, exchange::StockExchangeId, kline::KLineId};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub use self::{blacklist::BlackListFilterData, rule::KLineFilterData, user_config::UserConfig};

/// [`BlackListFilterData`] exclusion entries.
pub mod blacklist;

/// [`KLineFilterData`] alert rules and their threshold bounds.
pub mod rule;

/// [`UserConfig`] parsed from a session's JSON configuration.
pub mod user_config;

/// Per-session rule set: ordered alert rules plus a blacklist.
///
/// Rule order matters, the first rule whose scope matches a candle is the only one applied.
///
/// Wire encoding: `{"Filters": [..], "BlackList": [..]}`.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Filter {
    #[serde(rename = "Filters", default)]
    kline_filters: Vec<KLineFilterData>,
    #[serde(rename = "BlackList", default)]
    black_list: Vec<BlackListFilterData>,
}

impl Default for Filter {
    /// Single unscoped rule with both thresholds at their maximum.
    fn default() -> Self {
        Self {
            kline_filters: vec![KLineFilterData {
                delta: Some(KLineFilterData::MAX_DELTA),
                volume: Some(KLineFilterData::MAX_VOLUME),
                ..Default::default()
            }],
            black_list: Vec::new(),
        }
    }
}

impl Filter {
    /// Construct a [`Filter`] with no rules and no blacklist, which never alerts.
    pub fn empty() -> Self {
        Self {
            kline_filters: Vec::new(),
            black_list: Vec::new(),
        }
    }

    /// Construct a validated [`Filter`].
    pub fn new(
        kline_filters: Vec<KLineFilterData>,
        black_list: Vec<BlackListFilterData>,
    ) -> Result<Self, DataError> {
        let filter = Self {
            kline_filters,
            black_list,
        };
        filter.validate().map(|_| filter)
    }

    pub fn validate(&self) -> Result<(), DataError> {
        self.kline_filters
            .iter()
            .try_for_each(KLineFilterData::validate)
    }

    pub fn add_kline_filter(&mut self, rule: KLineFilterData) -> Result<(), DataError> {
        rule.validate()?;
        self.kline_filters.push(rule);
        Ok(())
    }

    pub fn add_black_list(&mut self, entry: BlackListFilterData) {
        self.black_list.push(entry);
    }

    pub fn kline_filters(&self) -> &[KLineFilterData] {
        &self.kline_filters
    }

    pub fn black_list(&self) -> &[BlackListFilterData] {
        &self.black_list
    }

    /// Determine if any blacklist entry covers the provided exchange and series.
    pub fn is_black_listed(&self, stock_exchange_id: &StockExchangeId, kline_id: &KLineId) -> bool {
        self.black_list
            .iter()
            .any(|entry| entry.matches(stock_exchange_id, kline_id))
    }

    /// First rule whose scope covers the provided exchange and series.
    pub fn find_rule(
        &self,
        stock_exchange_id: &StockExchangeId,
        kline_id: &KLineId,
    ) -> Option<&KLineFilterData> {
        self.kline_filters
            .iter()
            .find(|rule| rule.matches(stock_exchange_id, kline_id))
    }
}

/// Set of triggered detection axes.
///
/// `UNDETECT` is the empty state and is cleared as soon as any axis is inserted.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub struct FilterTypes(u8);

impl FilterTypes {
    pub const UNDETECT: Self = Self(0b001);
    pub const DELTA: Self = Self(0b010);
    pub const VOLUME: Self = Self(0b100);

    pub fn insert(&mut self, other: Self) {
        if other != Self::UNDETECT {
            self.0 &= !Self::UNDETECT.0;
        }
        self.0 |= other.0;
    }

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for FilterTypes {
    fn default() -> Self {
        Self::UNDETECT
    }
}

impl Display for FilterTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = [
            (Self::UNDETECT, "UNDEFINED"),
            (Self::DELTA, "DELTA"),
            (Self::VOLUME, "VOLUME"),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| name)
        .join(",");

        write!(f, "{names}")
    }
}
