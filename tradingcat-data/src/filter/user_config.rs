use super::Filter;
use crate::error::DataError;
use serde::{Deserialize, Serialize};

/// Session configuration delivered by the (external) session layer.
///
/// Wire encoding: `{"Filter": {"Filters": [..], "BlackList": [..]}}`.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct UserConfig {
    #[serde(rename = "Filter")]
    pub filter: Filter,
}

impl UserConfig {
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }

    /// Parse and validate a JSON configuration. An empty (or whitespace only) input yields
    /// the default [`Filter`].
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }

        let config = serde_json::from_str::<UserConfig>(json)?;
        config.filter.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, DataError> {
        serde_json::to_string(self).map_err(DataError::from)
    }
}
