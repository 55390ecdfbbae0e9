//! # Error Handling for Bulkline
//!
//! This module defines the error types used throughout the engine. We use a
//! single error enum ([`Error`]) to represent all failure modes, which keeps
//! function signatures simple and lets callers handle errors uniformly.
//!
//! ## Error Categories
//!
//! | Category | Examples | Typical Response |
//! |----------|----------|------------------|
//! | Backend | chunk rejected, connection lost | reported in the run result |
//! | Configuration | `chunk_size == 0`, `min > max` | fix the caller's config |
//! | Lifecycle | engine thread has shut down | recreate the engine |
//!
//! Backend errors rarely cross the engine boundary: the execution modes
//! convert them into failed counts (chunked/adaptive/parallel) or structured
//! [`FailedRecord`](crate::types::FailedRecord) entries (resilient mode).
//! Only configuration and lifecycle errors are returned to callers directly.
//!
//! ## Classification
//!
//! Backends report failures with their own status codes (SQLSTATE strings,
//! SQLite extended result codes, ...). [`FailureCode`] is the engine-level
//! vocabulary those codes map into, with [`FailureCode::Unclassified`] as the
//! total fallback for anything unrecognized.

use thiserror::Error;

// =============================================================================
// Error Type
// =============================================================================

/// All errors that can occur in engine operations.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Backend Errors (converted into run-result counts by the engine)
    // =========================================================================

    /// The backing store rejected a write, or could not be reached.
    ///
    /// # When This Happens
    ///
    /// A [`Sink`](crate::sink::Sink) call failed as a whole: a constraint
    /// violation covering the chunk, a lost connection, a failed commit, or a
    /// [`SinkFactory`](crate::sink::SinkFactory) that could not acquire a
    /// session for a worker.
    ///
    /// # Recovery
    ///
    /// The execution modes recover from this internally: the chunked path
    /// aborts and counts the remainder as failed, the resilient path captures
    /// a classified per-record failure. Callers only see this variant from a
    /// Sink they invoke directly.
    #[error("backend error{}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Backend {
        /// Backend-specific status code, when the backend supplied one.
        code: Option<String>,
        /// Human-readable description from the backend.
        message: String,
    },

    // =========================================================================
    // Configuration Errors (precondition violations, returned to the caller)
    // =========================================================================

    /// A chunk size of zero was requested.
    ///
    /// Every execution mode requires `chunk_size >= 1`; a zero chunk size
    /// would make the chunk loop spin without consuming records.
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    /// An execution-mode configuration failed validation.
    ///
    /// # When This Happens
    ///
    /// Adaptive bounds out of order (`min_size > max_size`, initial size
    /// outside the bounds), or a parallelism of zero.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================

    /// The engine thread behind an async handle has shut down.
    ///
    /// # When This Happens
    ///
    /// A request was submitted after [`Engine::shutdown`](crate::api::Engine)
    /// completed, or the engine thread exited because every handle was
    /// dropped mid-request.
    #[error("engine has shut down")]
    EngineClosed,

    /// The dedicated engine thread could not be started.
    #[error("failed to start engine thread: {0}")]
    EngineThread(String),
}

impl Error {
    /// Convenience constructor for backend errors.
    pub fn backend(code: Option<impl Into<String>>, message: impl Into<String>) -> Self {
        Error::Backend {
            code: code.map(Into::into),
            message: message.into(),
        }
    }

    /// Classifies this error into the engine-level failure vocabulary.
    ///
    /// Non-backend errors classify as [`FailureCode::Unclassified`].
    pub fn classification(&self) -> FailureCode {
        match self {
            Error::Backend { code, .. } => FailureCode::classify(code.as_deref()),
            _ => FailureCode::Unclassified,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// A `Result` type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Failure Classification
// =============================================================================

/// Engine-level classification of a backend rejection.
///
/// The resilient processor attaches one of these to every
/// [`FailedRecord`](crate::types::FailedRecord). The mapping from backend
/// status codes is total: codes the engine does not recognize classify as
/// [`FailureCode::Unclassified`] rather than failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCode {
    /// Uniqueness or primary-key constraint violation.
    UniqueViolation,
    /// Foreign-key constraint violation.
    ForeignKeyViolation,
    /// NOT NULL constraint violation.
    NotNullViolation,
    /// CHECK constraint violation.
    CheckViolation,
    /// The backend session was lost or could not be reached.
    ConnectionLost,
    /// The record was never attempted because the run was cancelled.
    Cancelled,
    /// The backend gave no code, or one the engine does not recognize.
    Unclassified,
}

impl FailureCode {
    /// Maps a backend status code to the engine-level classification.
    ///
    /// Recognizes SQLSTATE codes (class `23` integrity violations, class `08`
    /// connection exceptions) and SQLite primary/extended result codes.
    /// `None` and unknown codes map to [`FailureCode::Unclassified`].
    pub fn classify(code: Option<&str>) -> FailureCode {
        let code = match code {
            Some(c) => c,
            None => return FailureCode::Unclassified,
        };

        match code {
            // SQLSTATE integrity-constraint violations
            "23505" => FailureCode::UniqueViolation,
            "23503" => FailureCode::ForeignKeyViolation,
            "23502" => FailureCode::NotNullViolation,
            "23514" => FailureCode::CheckViolation,

            // SQLite extended result codes
            "1555" | "2067" => FailureCode::UniqueViolation, // CONSTRAINT_PRIMARYKEY / _UNIQUE
            "787" => FailureCode::ForeignKeyViolation,       // CONSTRAINT_FOREIGNKEY
            "1299" => FailureCode::NotNullViolation,         // CONSTRAINT_NOTNULL
            "275" => FailureCode::CheckViolation,            // CONSTRAINT_CHECK

            // SQLite session-level failures
            "5" | "6" | "10" | "14" => FailureCode::ConnectionLost, // BUSY/LOCKED/IOERR/CANTOPEN

            // SQLSTATE class 08: connection exceptions
            c if c.starts_with("08") => FailureCode::ConnectionLost,

            _ => FailureCode::Unclassified,
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureCode::UniqueViolation => "unique_violation",
            FailureCode::ForeignKeyViolation => "foreign_key_violation",
            FailureCode::NotNullViolation => "not_null_violation",
            FailureCode::CheckViolation => "check_violation",
            FailureCode::ConnectionLost => "connection_lost",
            FailureCode::Cancelled => "cancelled",
            FailureCode::Unclassified => "unclassified",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Tests
// =============================================================================
