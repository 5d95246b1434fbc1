// ABOUTME: Validated scenario label used to name deployments.
// ABOUTME: Restricts names to a portable character set and derives resource-safe slugs.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

const MAX_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScenarioNameError {
    #[error("scenario name cannot be empty")]
    Empty,

    #[error("scenario name exceeds maximum length of 64 characters")]
    TooLong,

    #[error("scenario name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("invalid character in scenario name: '{0}'")]
    InvalidChar(char),
}

/// Logical label of what was deployed (e.g. `standalone-v5`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScenarioName(String);

impl ScenarioName {
    pub fn new(value: &str) -> Result<Self, ScenarioNameError> {
        if value.is_empty() {
            return Err(ScenarioNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(ScenarioNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(ScenarioNameError::StartsWithHyphen);
        }

        for c in value.chars() {
            if !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.') {
                return Err(ScenarioNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name with underscores turned into hyphens and everything else but
    /// ASCII alphanumerics dropped, suitable for embedding in remote resource names.
    pub fn slug(&self) -> String {
        self.0
            .chars()
            .map(|c| if c == '_' { '-' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect()
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ScenarioName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScenarioName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ScenarioName::new(&s).map_err(serde::de::Error::custom)
    }
}
