//! Error taxonomy for the catalog and retrieval engine.
//!
//! Every public operation returns `Result<T>` with a [`CortexError`] on the
//! failure side. The transport maps each variant to a stable numeric code via
//! [`CortexError::code`], so the taxonomy is part of the wire contract.

/// Core error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CortexError {
    /// Malformed input, schema violation, out-of-range value. Caller-fixable.
    #[error("invalid input: {message}")]
    Invalid {
        /// What was wrong
        message: String,
        /// Dotted path to the offending field, when known
        path: Option<String>,
    },

    /// Referenced id (memory, session, activity, link endpoint) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Invariant violation that is not a malformed input
    #[error("conflict: {0}")]
    Conflict(String),

    /// Stored catalog version exceeds this build's understanding
    #[error("catalog schema version {found} is newer than supported {supported}")]
    SchemaNewer {
        /// Version found in the catalog
        found: u32,
        /// Highest version this build knows
        supported: u32,
    },

    /// Catalog was initialized with a different vector dimension
    #[error("embedding dimension mismatch: catalog has {catalog}, embedder produces {embedder}")]
    EmbeddingMismatch {
        /// Dimension recorded in the catalog metadata
        catalog: usize,
        /// Dimension the configured embedder reports
        embedder: usize,
    },

    /// Deadline or explicit cancellation reached a suspension point
    #[error("operation canceled")]
    Canceled,

    /// Underlying storage/filesystem failure; may be transient
    #[error("I/O error: {0}")]
    Io(String),

    /// Caught panic or unreachable state; indicates a bug
    #[error("internal error: {0}")]
    Internal(String),
}

impl CortexError {
    /// Build an `Invalid` error without a field path
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            path: None,
        }
    }

    /// Build an `Invalid` error pointing at a specific input field
    pub fn invalid_at(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Stable numeric code for the transport layer
    pub fn code(&self) -> i32 {
        match self {
            CortexError::Invalid { .. } => -32602,
            CortexError::NotFound(_) => -32002,
            CortexError::Conflict(_) => -32009,
            CortexError::SchemaNewer { .. } => -32010,
            CortexError::EmbeddingMismatch { .. } => -32011,
            CortexError::Canceled => -32012,
            CortexError::Io(_) => -32013,
            CortexError::Internal(_) => -32603,
        }
    }

    /// Field path for `Invalid` errors, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            CortexError::Invalid { path, .. } => path.as_deref(),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for CortexError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => {
                CortexError::NotFound("query returned no rows".to_string())
            }
            other => CortexError::Io(other.to_string()),
        }
    }
}

impl From<std::io::Error> for CortexError {
    fn from(e: std::io::Error) -> Self {
        CortexError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CortexError {
    fn from(e: serde_json::Error) -> Self {
        CortexError::Internal(format!("serialization failed: {e}"))
    }
}

/// Core result type
pub type Result<T> = std::result::Result<T, CortexError>;
