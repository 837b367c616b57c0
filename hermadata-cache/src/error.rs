//! Error taxonomy shared by reads and writes.
//!
//! Fetch errors are shared state: they are stored on the cache entry and
//! visible to every subscriber of that key. Mutation errors are local: they
//! are delivered only to the invoking caller and never stored in the cache.

use serde_json::Value;
use thiserror::Error;

/// Error surfaced by a remote read or write.
///
/// `Clone` so one in-flight failure can fan out to every deduplicated
/// waiter and still be stored on the entry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DataError {
    /// Non-2xx response without structured content.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Domain-specific rejection carrying a machine-readable code, e.g. a
    /// duplicate chip code with a pointer to the conflicting record.
    #[error("conflict {code}")]
    Conflict { code: String, content: Option<Value> },

    /// Server payload failed schema parsing. A client/server contract
    /// defect, not a bad request.
    #[error("response validation failed: {0}")]
    Validation(String),

    /// Transport failure.
    #[error("network error: {0}")]
    Network(String),

    /// 401/403-class response.
    #[error("authentication failure (HTTP {status})")]
    Auth { status: u16 },
}

impl DataError {
    /// For an `ECC` duplicate-chip-code conflict, the id of the animal
    /// already holding the chip code.
    pub fn conflicting_animal(&self) -> Option<i64> {
        match self {
            DataError::Conflict { code, content } if code == "ECC" => content
                .as_ref()
                .and_then(|c| c.get("animal_id"))
                .and_then(Value::as_i64),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, DataError::Auth { .. })
    }
}
