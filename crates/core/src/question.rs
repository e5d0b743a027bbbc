//! Validated question text

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Default minimum question length, in characters after trimming
pub const DEFAULT_MIN_LEN: usize = 8;
/// Default maximum question length, in characters after trimming
pub const DEFAULT_MAX_LEN: usize = 350;

/// A user question that has passed length validation.
///
/// The inner string is always trimmed and within the configured bounds,
/// so pipeline stages never re-validate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Validate with the default bounds (8..=350 chars after trimming)
    pub fn new(text: impl Into<String>) -> Result<Self> {
        Self::parse(text, DEFAULT_MIN_LEN, DEFAULT_MAX_LEN)
    }

    /// Validate with explicit bounds, for config-driven limits
    pub fn parse(text: impl Into<String>, min_len: usize, max_len: usize) -> Result<Self> {
        let trimmed = text.into().trim().to_string();

        if trimmed.is_empty() {
            return Err(Error::Validation(
                "Question cannot be empty or whitespace".to_string(),
            ));
        }

        let len = trimmed.chars().count();
        if len < min_len {
            return Err(Error::Validation(format!(
                "Question must be at least {} characters long",
                min_len
            )));
        }
        if len > max_len {
            return Err(Error::Validation(format!(
                "Question must not exceed {} characters",
                max_len
            )));
        }

        Ok(Question(trimmed))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
