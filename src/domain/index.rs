//! The index submitted by clients and the rules it must satisfy.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::domain::error::DomainError;

/// Highest index accepted unless configured otherwise.
pub const DEFAULT_CEILING: i32 = 40;

/// A validated index in `0..=ceiling`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ValueIndex(i32);

impl ValueIndex {
    /// Validate the raw `index` field of a request body.
    ///
    /// Numbers and numeric strings are both accepted as long as they denote an
    /// integer; `"7"`, `" 7 "`, `7.0` and `"7.0"` all yield the same index.
    pub fn parse(raw: Option<&Value>, ceiling: i32) -> Result<Self, DomainError> {
        let number = match raw {
            None | Some(Value::Null) => return Err(DomainError::MissingIndex),
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(DomainError::MissingIndex);
                }
                trimmed
                    .parse::<f64>()
                    .map_err(|_| DomainError::NotAnInteger)?
            }
            Some(Value::Number(number)) => number.as_f64().ok_or(DomainError::NotAnInteger)?,
            Some(_) => return Err(DomainError::NotAnInteger),
        };

        Self::from_f64(number, ceiling)
    }

    fn from_f64(number: f64, ceiling: i32) -> Result<Self, DomainError> {
        if !number.is_finite() || number.fract() != 0.0 {
            return Err(DomainError::NotAnInteger);
        }
        if number < 0.0 {
            return Err(DomainError::Negative);
        }
        if number > f64::from(ceiling) {
            return Err(DomainError::TooLarge { ceiling });
        }

        // Bounded by `ceiling` above, so the cast is lossless.
        Ok(Self(number as i32))
    }

    pub fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for ValueIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
