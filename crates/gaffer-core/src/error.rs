// Engine error taxonomy and typed degradation markers.

use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to callers of the engines.
///
/// Per-athlete data gaps inside scoring and classification never reach this
/// type; they are recovered locally and recorded as a [`Degradation`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid squad: {reason}")]
    InvalidSquad { reason: String },

    #[error("no squad satisfies the optimization constraints")]
    Infeasible,

    #[error("solver exceeded its resolution budget of {limit_ms} ms")]
    Timeout { limit_ms: u64 },

    #[error("missing data: {what}")]
    MissingData { what: String },

    #[error("solver failure: {0}")]
    Solver(String),
}

impl EngineError {
    pub(crate) fn invalid_squad(reason: impl Into<String>) -> Self {
        EngineError::InvalidSquad {
            reason: reason.into(),
        }
    }
}

/// Why a scoring factor fell back to its neutral value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// A lookup (fixture, opponent, athlete field) found no usable record.
    MissingData { factor: &'static str, detail: String },
    /// An average, slope or ratio had nothing to divide by.
    ArithmeticGuard { factor: &'static str, detail: String },
}

impl Degradation {
    pub fn missing(factor: &'static str, detail: impl Into<String>) -> Self {
        Degradation::MissingData {
            factor,
            detail: detail.into(),
        }
    }

    pub fn guard(factor: &'static str, detail: impl Into<String>) -> Self {
        Degradation::ArithmeticGuard {
            factor,
            detail: detail.into(),
        }
    }

    /// The scoring factor that was neutralised.
    pub fn factor(&self) -> &'static str {
        match self {
            Degradation::MissingData { factor, .. } => factor,
            Degradation::ArithmeticGuard { factor, .. } => factor,
        }
    }
}
