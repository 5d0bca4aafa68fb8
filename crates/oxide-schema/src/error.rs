//! Error types for running blueprints.

use oxide_schema_core::SchemaError;

/// Errors that can occur while introspecting or altering a database.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The blueprint was rejected before any statement ran.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A statement failed. Later statements were not run.
    #[error("Failed to execute `{statement}`: {source}")]
    Execution {
        /// The statement that failed.
        statement: String,
        /// The database error, as reported by the driver.
        #[source]
        source: sqlx::Error,
    },

    /// A verification query of an atomic batch found violating rows. The
    /// batch was rolled back.
    #[error("Check `{check}` reported {rows} violating row(s)")]
    CheckFailed {
        /// The verification query.
        check: String,
        /// Number of rows it returned.
        rows: usize,
    },

    /// Connection-level database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The declaration callback gave up. Nothing was sent to the database.
    #[error("Declaration failed: {0}")]
    Declaration(String),

    /// IO error (writing snapshots).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wraps a driver error with the statement that caused it.
    pub fn execution(statement: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Execution {
            statement: statement.into(),
            source,
        }
    }
}

/// Result type for runtime schema operations.
pub type Result<T> = std::result::Result<T, Error>;
