// ABOUTME: Age thresholds like "2h" or "3d" used to select old deployments.
// ABOUTME: Parses the <integer><unit> grammar with units m, h, d, and w.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AgeParseError {
    #[error("age threshold cannot be empty")]
    Empty,

    #[error("age threshold '{0}' must start with a number")]
    MissingNumber(String),

    #[error("age threshold '{0}' has an unknown unit (expected m, h, d, or w)")]
    UnknownUnit(String),

    #[error("age threshold '{0}' is too large")]
    Overflow(String),
}

/// Unit of an [`AgeThreshold`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl AgeUnit {
    fn from_suffix(s: &str) -> Option<Self> {
        match s {
            "m" => Some(AgeUnit::Minutes),
            "h" => Some(AgeUnit::Hours),
            "d" => Some(AgeUnit::Days),
            "w" => Some(AgeUnit::Weeks),
            _ => None,
        }
    }

    fn suffix(&self) -> char {
        match self {
            AgeUnit::Minutes => 'm',
            AgeUnit::Hours => 'h',
            AgeUnit::Days => 'd',
            AgeUnit::Weeks => 'w',
        }
    }

    fn minutes(&self) -> i64 {
        match self {
            AgeUnit::Minutes => 1,
            AgeUnit::Hours => 60,
            AgeUnit::Days => 60 * 24,
            AgeUnit::Weeks => 60 * 24 * 7,
        }
    }
}

/// A parsed `<integer><unit>` age, e.g. `30m`, `2h`, `3d`, `1w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeThreshold {
    value: u32,
    unit: AgeUnit,
}

impl AgeThreshold {
    pub fn new(value: u32, unit: AgeUnit) -> Self {
        Self { value, unit }
    }

    pub fn parse(input: &str) -> Result<Self, AgeParseError> {
        let normalized = input.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(AgeParseError::Empty);
        }

        let split = normalized
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(normalized.len());
        let (digits, suffix) = normalized.split_at(split);

        if digits.is_empty() {
            return Err(AgeParseError::MissingNumber(input.to_string()));
        }

        let unit =
            AgeUnit::from_suffix(suffix).ok_or_else(|| AgeParseError::UnknownUnit(input.to_string()))?;
        let value: u32 = digits
            .parse()
            .map_err(|_| AgeParseError::Overflow(input.to_string()))?;

        Ok(Self { value, unit })
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> AgeUnit {
        self.unit
    }

    pub fn as_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.value) * self.unit.minutes())
    }
}

impl FromStr for AgeThreshold {
    type Err = AgeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for AgeThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}
