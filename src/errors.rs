//! Engine error taxonomy
//!
//! Every failure the core can produce is one of these kinds, and all of
//! them are recoverable by the caller: a failed build or commit leaves the
//! repository in its pre-call state. Nothing is retried internally.

use crate::core_types::Revision;
use thiserror::Error;

/// Errors surfaced at the engine boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Lookup in an entities set failed.
    #[error("{kind}#{id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Optimistic-concurrency mismatch or would-be-negative balance.
    #[error("balance error: {0}")]
    Balance(String),

    /// Cancellation precondition violated (e.g. non-empty account).
    #[error("cancel error: {0}")]
    Cancel(String),

    /// Duplicate credit/debit/order identifier detected by a dedup filter.
    /// May be a bloom false positive; callers retry with a fresh id.
    #[error("conflicted id: {0}")]
    Conflicted(String),

    /// Malformed identifier or argument.
    #[error("validation error: {0}")]
    Validation(String),

    /// Deal application preconditions violated (out-of-order apply).
    #[error("deal error: {0}")]
    Deal(String),

    /// Committed event's revision does not follow the repository head.
    #[error("revision mismatch: event targets {target}, repository is at {current}")]
    Revision { target: Revision, current: Revision },
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
