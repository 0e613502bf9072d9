//! Experiment task identity and cache-key derivation
//!
//! A task is an immutable (dataset, model, method, metric) tuple. Its cache
//! key is a deterministic string derived from the tuple plus the engine
//! version, so identical tasks computed by the same engine share one cached
//! result and no two distinct tasks ever collide.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Separator between cache-key fields. Must never appear inside an
/// identifier; [`validate_identifier`] enforces this before any dispatch.
pub const CACHE_KEY_SEPARATOR: &str = "__";

/// One unit of benchmark work: evaluate `method` on `model` over `dataset`,
/// scored by `metric`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Task {
    pub dataset: String,
    pub model: String,
    pub method: String,
    pub metric: String,
}

impl Task {
    /// Create a task from the four identifiers
    pub fn new(
        dataset: impl Into<String>,
        model: impl Into<String>,
        method: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            model: model.into(),
            method: method.into(),
            metric: metric.into(),
        }
    }

    /// Derive the cache key for this task under the given engine version:
    /// `v{version}__{dataset}__{model}__{method}__{metric}`
    pub fn cache_key(&self, engine_version: &str) -> String {
        format!(
            "v{}{sep}{}{sep}{}{sep}{}{sep}{}",
            engine_version,
            self.dataset,
            self.model,
            self.method,
            self.metric,
            sep = CACHE_KEY_SEPARATOR
        )
    }

    /// Validate all four identifiers against the separator and shell-unsafe
    /// characters. Called before any local or remote dispatch.
    pub fn validate(&self) -> Result<()> {
        validate_identifier("dataset", &self.dataset)?;
        validate_identifier("model", &self.model)?;
        validate_identifier("method", &self.method)?;
        validate_identifier("metric", &self.metric)?;
        Ok(())
    }

    /// The four identifiers in argument order
    pub fn fields(&self) -> [&str; 4] {
        [&self.dataset, &self.model, &self.method, &self.metric]
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.dataset, self.model, self.method, self.metric
        )
    }
}

/// Check that an identifier is safe to embed in cache keys and remote
/// command argument lists: non-empty, no separator, and only
/// `[A-Za-z0-9_.-]` characters.
pub fn validate_identifier(kind: &'static str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidIdentifier {
            kind,
            name: name.to_string(),
            reason: "identifier is empty".to_string(),
        });
    }
    if name.contains(CACHE_KEY_SEPARATOR) {
        return Err(Error::InvalidIdentifier {
            kind,
            name: name.to_string(),
            reason: format!("contains the cache-key separator '{}'", CACHE_KEY_SEPARATOR),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(Error::InvalidIdentifier {
            kind,
            name: name.to_string(),
            reason: format!("contains disallowed character '{}'", bad),
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
