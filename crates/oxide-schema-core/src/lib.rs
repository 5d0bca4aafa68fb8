//! Cross-dialect table blueprints and DDL compilation.
//!
//! `oxide-schema-core` turns a declarative description of a table into the
//! statements each database needs to get there:
//! - A [`Blueprint`] collects column, index and foreign key operations through a
//!   fluent, handle-based API
//! - A [`Grammar`] per [`Dialect`] validates, orders and compiles them, using
//!   the live table ([`IntrospectedTable`]) to resolve changes and check
//!   references
//! - SQLite gaps (changing columns, touching keys) are closed by an atomic
//!   table rebuild
//!
//! This crate performs no I/O. The `oxide-schema` crate runs the compiled
//! steps and catalog queries against a real connection.
//!
//! # Example
//!
//! ```rust
//! use oxide_schema_core::{Blueprint, Dialect};
//!
//! let mut table = Blueprint::create("users");
//! table.increments("id");
//! table.string("email").unique();
//! table.integer("votes").default(0);
//! table.timestamps(true);
//!
//! let compiled = Dialect::Postgres.grammar().compile(&table, None).unwrap();
//! let statements = compiled.statements();
//! assert!(statements[0].starts_with("CREATE TABLE \"users\""));
//! assert_eq!(
//!     statements[1],
//!     "ALTER TABLE \"users\" ADD CONSTRAINT \"users_email_unique\" UNIQUE (\"email\")"
//! );
//! ```

pub mod blueprint;
pub mod error;
pub mod grammar;
pub mod introspect;

pub use blueprint::{
    Blueprint, ColumnDefinition, ColumnType, DefaultValue, ForeignKeyAction, IndexKind, Operation,
};
pub use error::{Result, SchemaError};
pub use grammar::{CompiledBlueprint, Dialect, Grammar, Plan, Step};
pub use introspect::{CatalogQueries, CatalogRow, CatalogRows, ColumnMeta, IntrospectedTable};
