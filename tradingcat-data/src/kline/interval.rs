use crate::error::DataError;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt::Display, str::FromStr};

/// Candle interval. Each variant's value is its duration in milliseconds.
///
/// Wire encoding uses the short tokens `1m`, `5m`, `10m`, `15m`, `30m`, `60m`, `4h`, `8h`,
/// `1d` and `1w`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum KLineType {
    Min1,
    Min5,
    Min10,
    Min15,
    Min30,
    Min60,
    Hour4,
    Hour8,
    Day1,
    Week1,
}

impl KLineType {
    pub const ALL: [KLineType; 10] = [
        KLineType::Min1,
        KLineType::Min5,
        KLineType::Min10,
        KLineType::Min15,
        KLineType::Min30,
        KLineType::Min60,
        KLineType::Hour4,
        KLineType::Hour8,
        KLineType::Day1,
        KLineType::Week1,
    ];

    /// Interval duration in milliseconds.
    pub const fn as_millis(&self) -> i64 {
        match self {
            KLineType::Min1 => 60 * 1000,
            KLineType::Min5 => 5 * 60 * 1000,
            KLineType::Min10 => 10 * 60 * 1000,
            KLineType::Min15 => 15 * 60 * 1000,
            KLineType::Min30 => 30 * 60 * 1000,
            KLineType::Min60 => 60 * 60 * 1000,
            KLineType::Hour4 => 4 * 60 * 60 * 1000,
            KLineType::Hour8 => 8 * 60 * 60 * 1000,
            KLineType::Day1 => 24 * 60 * 60 * 1000,
            KLineType::Week1 => 7 * 24 * 60 * 60 * 1000,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            KLineType::Min1 => "1m",
            KLineType::Min5 => "5m",
            KLineType::Min10 => "10m",
            KLineType::Min15 => "15m",
            KLineType::Min30 => "30m",
            KLineType::Min60 => "60m",
            KLineType::Hour4 => "4h",
            KLineType::Hour8 => "8h",
            KLineType::Day1 => "1d",
            KLineType::Week1 => "1w",
        }
    }

    /// Parse a comma separated list of interval tokens (eg/ "1m,5m,4h"), de-duplicating and
    /// sorting the result. An empty input yields an empty list.
    pub fn parse_list(input: &str) -> Result<Vec<Self>, DataError> {
        input
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(KLineType::from_str)
            .collect::<Result<Vec<_>, _>>()
            .map(|intervals| intervals.into_iter().sorted().dedup().collect())
    }
}

impl Display for KLineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for KLineType {
    type Err = DataError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == input)
            .ok_or_else(|| DataError::UnknownInterval(input.to_string()))
    }
}

impl Serialize for KLineType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for KLineType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        KLineType::from_str(&token).map_err(serde::de::Error::custom)
    }
}
