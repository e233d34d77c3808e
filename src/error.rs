//! Error types for records and the script boundary
//!
//! Failures are plain values returned to the caller. Nothing here unwinds:
//! a hook status travels back to whoever invoked the record operation, and a
//! script error aborts only the host-function call that produced it.

use thiserror::Error;

/// Errors reported by record operations and their backing-store hooks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// A hook reported a non-zero status
    #[error("record hook failed with status {0}")]
    Hook(i32),

    /// The record's free hook has already run
    #[error("record has already been freed")]
    Freed,

    /// The backing store rejected a bin name
    #[error("invalid bin name '{name}': {reason}")]
    BinName { name: String, reason: String },

    /// The source is gone or is not the type the hooks expect
    #[error("record source is missing or has an unexpected type")]
    MissingSource,
}

impl RecordError {
    /// Create a bin name error
    pub fn bin_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BinName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Status code as seen by callers that only deal in integers
    pub fn status(&self) -> i32 {
        match self {
            RecordError::Hook(status) => *status,
            RecordError::Freed => -1,
            RecordError::BinName { .. } => -2,
            RecordError::MissingSource => -3,
        }
    }
}

/// Errors that abort a host-function call made from script code
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// Checked argument had the wrong script type
    #[error("bad argument #{position} ({expected} expected, got {found})")]
    TypeMismatch {
        position: i32,
        expected: String,
        found: String,
    },

    /// Push beyond the configured stack limit
    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },

    /// Stack position outside the current frame
    #[error("invalid stack index {0}")]
    InvalidIndex(i32),

    /// Call to a function name nobody registered
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A record operation failed while running on behalf of a script
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// Any other failure raised by a host function
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ScriptError {
    /// Create a type mismatch error
    pub fn type_mismatch(
        position: i32,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            position,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;

/// Result type for script boundary operations
pub type ScriptResult<T> = Result<T, ScriptError>;
