//! Schema builder.
//!
//! Opens a blueprint scope for one table, lets the caller declare changes,
//! then introspects, compiles and executes them on its connection. A scope
//! whose declaration fails sends nothing to the database.

use oxide_schema_core::{
    Blueprint, ColumnMeta, CompiledBlueprint, Dialect, Grammar, IntrospectedTable, SchemaError,
    Step,
};
use tracing::info;

use crate::connection::Connection;
use crate::error::Result;
use crate::executor::Executor;
use crate::introspector::Introspector;

/// Creates, alters, drops and inspects tables on one connection.
pub struct SchemaBuilder<C: Connection> {
    connection: C,
    grammar: Box<dyn Grammar>,
    executor: Executor,
}

impl<C: Connection> SchemaBuilder<C> {
    /// Creates a builder using the grammar of the connection's dialect.
    pub fn new(connection: C) -> Self {
        let grammar = connection.dialect().grammar();
        Self {
            connection,
            grammar,
            executor: Executor::new(),
        }
    }

    /// Enables dry-run mode (statements are compiled and logged only).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.executor = self.executor.dry_run(enabled);
        self
    }

    /// Returns the dialect of the connection.
    pub fn dialect(&self) -> Dialect {
        self.grammar.dialect()
    }

    /// Returns the grammar used to compile blueprints.
    pub fn grammar(&self) -> &dyn Grammar {
        self.grammar.as_ref()
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Returns the underlying connection mutably.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Consumes the builder and returns the connection.
    pub fn into_inner(self) -> C {
        self.connection
    }

    fn introspector(&mut self) -> Introspector<'_, C> {
        Introspector::new(&mut self.connection, self.grammar.as_ref())
    }

    // =========================================================================
    // Blueprint scopes
    // =========================================================================

    /// Alters an existing table.
    ///
    /// `declare` fills the blueprint. If it returns an error, the blueprint
    /// is discarded before the table is even introspected.
    pub async fn with_table<F>(&mut self, table: &str, declare: F) -> Result<CompiledBlueprint>
    where
        F: FnOnce(&mut Blueprint) -> Result<()>,
    {
        let mut blueprint = Blueprint::new(table);
        declare(&mut blueprint)?;

        info!(table = %table, dialect = %self.dialect(), "Altering table");
        let current = self.introspector().describe(table).await?;
        let compiled = self.grammar.compile(&blueprint, Some(&current))?;
        self.executor.run(&mut self.connection, &compiled).await?;
        Ok(compiled)
    }

    /// Creates a new table.
    pub async fn with_new_table<F>(&mut self, table: &str, declare: F) -> Result<CompiledBlueprint>
    where
        F: FnOnce(&mut Blueprint) -> Result<()>,
    {
        let mut blueprint = Blueprint::create(table);
        declare(&mut blueprint)?;

        info!(table = %table, dialect = %self.dialect(), "Creating table");
        let compiled = self.grammar.compile(&blueprint, None)?;
        self.executor.run(&mut self.connection, &compiled).await?;
        Ok(compiled)
    }

    // =========================================================================
    // Single-statement conveniences
    // =========================================================================

    /// Drops `table`, failing with [`SchemaError::TableNotFound`] when it
    /// does not exist.
    pub async fn drop(&mut self, table: &str) -> Result<CompiledBlueprint> {
        self.require_table(table).await?;
        let sql = self.grammar.compile_drop_table(table, false);
        self.run_single(table, sql).await
    }

    /// Drops `table` if it exists.
    pub async fn drop_if_exists(&mut self, table: &str) -> Result<CompiledBlueprint> {
        let sql = self.grammar.compile_drop_table(table, true);
        self.run_single(table, sql).await
    }

    /// Renames `from` to `to`.
    pub async fn rename(&mut self, from: &str, to: &str) -> Result<CompiledBlueprint> {
        self.require_table(from).await?;
        let sql = self.grammar.compile_rename_table(from, to);
        self.run_single(from, sql).await
    }

    async fn require_table(&mut self, table: &str) -> Result<()> {
        if self.has_table(table).await? {
            Ok(())
        } else {
            Err(SchemaError::TableNotFound {
                table: table.to_string(),
            }
            .into())
        }
    }

    async fn run_single(&mut self, table: &str, sql: String) -> Result<CompiledBlueprint> {
        info!(table = %table, sql = %sql, "Running table statement");
        let compiled = CompiledBlueprint {
            table: table.to_string(),
            steps: vec![Step::Statement(sql)],
        };
        self.executor.run(&mut self.connection, &compiled).await?;
        Ok(compiled)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Returns true when `table` exists.
    pub async fn has_table(&mut self, table: &str) -> Result<bool> {
        self.introspector().has_table(table).await
    }

    /// Returns true when `table` has `column`.
    pub async fn has_column(&mut self, table: &str, column: &str) -> Result<bool> {
        self.introspector().has_column(table, column).await
    }

    /// Returns the live column, if any.
    pub async fn get_column(&mut self, table: &str, column: &str) -> Result<Option<ColumnMeta>> {
        self.introspector().get_column(table, column).await
    }

    /// Returns the column names of `table` in catalog order.
    pub async fn get_column_listing(&mut self, table: &str) -> Result<Vec<String>> {
        self.introspector().get_column_listing(table).await
    }

    /// Reads the live shape of `table`.
    pub async fn describe(&mut self, table: &str) -> Result<IntrospectedTable> {
        self.introspector().describe(table).await
    }
}
