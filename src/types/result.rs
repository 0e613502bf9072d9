//! Result payload types
//!
//! A cached result is the serialized outcome of one task: the score value
//! plus enough metadata to tell which engine produced it and when.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A metric score: either a single number or a series (e.g., a curve of
/// per-fraction scores).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
    Scalar(f64),
    Series(Vec<f64>),
}

impl ScoreValue {
    /// The scalar value, if this is a scalar score
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ScoreValue::Scalar(v) => Some(*v),
            ScoreValue::Series(_) => None,
        }
    }
}

/// One persisted experiment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    /// The metric score
    pub score: ScoreValue,
    /// Engine version that produced the score
    pub engine_version: String,
    /// When the score was computed
    pub computed_at: DateTime<Utc>,
}

impl CachedResult {
    /// Wrap a freshly computed score with current metadata
    pub fn new(score: ScoreValue, engine_version: &str) -> Self {
        Self {
            score,
            engine_version: engine_version.to_string(),
            computed_at: Utc::now(),
        }
    }
}
