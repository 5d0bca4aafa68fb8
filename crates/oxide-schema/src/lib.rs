//! Runs table blueprints against a live database.
//!
//! `oxide-schema` connects the pure compiler in `oxide-schema-core` to a real
//! connection:
//! - [`SchemaBuilder`] opens blueprint scopes, introspects the live table,
//!   compiles and executes
//! - [`Connection`] is the narrow interface the builder needs, implemented
//!   over `sqlx` by [`DatabaseConnection`]
//! - [`Executor`] runs compiled steps in order, wrapping atomic batches in a
//!   transaction
//!
//! # Example
//!
//! ```rust,no_run
//! use oxide_schema::{DatabaseConnection, SchemaBuilder};
//!
//! # async fn run() -> oxide_schema::Result<()> {
//! let connection = DatabaseConnection::connect("sqlite::memory:").await?;
//! let mut schema = SchemaBuilder::new(connection);
//!
//! schema
//!     .with_new_table("users", |table| {
//!         table.increments("id");
//!         table.string("email").unique();
//!         table.integer("votes").default(0);
//!         Ok(())
//!     })
//!     .await?;
//!
//! schema
//!     .with_table("users", |table| {
//!         table.big_integer("votes").change();
//!         Ok(())
//!     })
//!     .await?;
//!
//! assert!(schema.has_column("users", "votes").await?);
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Show a table as JSON
//! oxide-schema --database sqlite:app.db describe users
//!
//! # Add a column
//! oxide-schema add-column posts content --type text --nullable
//!
//! # Show the SQL of a change without running it
//! oxide-schema --dry-run change-column users votes --type big-integer
//! ```

pub mod builder;
pub mod connection;
pub mod error;
pub mod executor;
pub mod introspector;

pub use builder::SchemaBuilder;
pub use connection::{Connection, DatabaseConnection};
pub use error::{Error, Result};
pub use executor::Executor;
pub use introspector::Introspector;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::builder::SchemaBuilder;
    pub use crate::connection::{Connection, DatabaseConnection};
    pub use crate::error::{Error, Result};
    pub use oxide_schema_core::{
        Blueprint, ColumnMeta, ColumnType, DefaultValue, Dialect, ForeignKeyAction, IndexKind,
        IntrospectedTable, SchemaError,
    };
}
