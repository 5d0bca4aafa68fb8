//! Errors raised while declaring, validating or compiling a blueprint.

use crate::grammar::Dialect;

/// Errors that can occur before any statement reaches the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The table does not exist.
    #[error("Table '{table}' does not exist")]
    TableNotFound {
        /// Table name.
        table: String,
    },

    /// A referenced column does not exist.
    #[error("Column '{column}' does not exist on table '{table}'")]
    ColumnNotFound {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// A column with the same name is already present.
    #[error("Column '{column}' already exists on table '{table}'")]
    ColumnExists {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// An index or constraint named in a drop operation does not exist.
    #[error("Index or constraint '{name}' does not exist on table '{table}'")]
    ConstraintNotFound {
        /// Table name.
        table: String,
        /// Index or constraint name.
        name: String,
    },

    /// A column cannot be renamed or dropped while a foreign key holds it.
    #[error(
        "Column '{column}' on table '{table}' is held by foreign key '{constraint}'; \
         drop the foreign key first"
    )]
    ForeignKeyDependency {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Foreign key constraint name.
        constraint: String,
    },

    /// The dialect cannot express the requested change.
    #[error("{dialect} does not support {operation}")]
    Unsupported {
        /// Dialect that rejected the operation.
        dialect: Dialect,
        /// Description of the operation.
        operation: String,
    },

    /// Two indexes or constraints resolve to the same name.
    #[error("Name '{name}' is used by more than one index or constraint on table '{table}'")]
    NameCollision {
        /// Table name.
        table: String,
        /// Colliding name.
        name: String,
    },

    /// A column, index or foreign key definition is incomplete or contradictory.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// The dialect name is not recognized.
    #[error("Unknown dialect '{0}'")]
    UnknownDialect(String),

    /// A catalog row is missing a field or holds an unparsable value.
    #[error("Malformed catalog data: {0}")]
    Catalog(String),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
