//! Error taxonomy shared by every chime operation.

use thiserror::Error;

/// Result type for chime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chime operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed creation or call arguments.
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// A sound with this identifier already exists.
    #[error("duplicate sound id: {0}")]
    DuplicateIdentifier(String),

    /// No live sound with this identifier.
    #[error("sound not found: {0}")]
    NotFound(String),

    /// Adapter disposed, or no backend finished initializing.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend could not open the source.
    #[error("load failed for {url}: {reason}")]
    LoadFailed { url: String, reason: String },

    /// The backend did not finish loading before the deadline.
    #[error("load of {url} timed out after {timeout_ms}ms")]
    LoadTimeout { url: String, timeout_ms: u64 },

    /// The operation has no meaning for the active backend.
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    /// The manager was destructed.
    #[error("manager has been destructed")]
    ManagerDestroyed,

    /// The operation is not valid in the current play or ready state.
    #[error("cannot {op} while {state}")]
    InvalidState { op: &'static str, state: String },
}

impl Error {
    pub(crate) fn invalid_state(op: &'static str, state: impl std::fmt::Display) -> Self {
        Error::InvalidState {
            op,
            state: state.to_string(),
        }
    }
}

/// Log errors from best-effort operations without propagating them.
pub(crate) fn log_err<T>(result: Result<T>, context: &str) -> bool {
    match result {
        Ok(_) => true,
        Err(Error::Unsupported(op)) => {
            log::debug!("chime: {}: {} unsupported, ignored", context, op);
            true
        }
        Err(e) => {
            log::warn!("chime: {} failed: {}", context, e);
            false
        }
    }
}
