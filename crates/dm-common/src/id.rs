//! Run identity.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

/// Opaque unique token identifying one monitoring session.
///
/// Format: 32 lowercase hex characters (a v4 UUID without hyphens).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Parse and validate an existing run ID string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        if s.len() == 32 && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')) {
            Ok(RunId(s.to_string()))
        } else {
            Err(Error::InvalidRunId(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
