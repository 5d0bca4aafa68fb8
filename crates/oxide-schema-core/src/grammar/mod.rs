//! Dialect-specific DDL compilation.
//!
//! Different databases have different syntax and different capability gaps
//! for DDL. A [`Grammar`] turns a [`Blueprint`] (plus, for alter flows, the
//! live [`IntrospectedTable`]) into an ordered list of [`Step`]s. One grammar
//! is selected per connection through [`Dialect::grammar`].

mod mysql;
mod plan;
mod postgres;
mod rebuild;
mod sqlite;
mod sqlserver;
mod state;

use std::fmt;
use std::str::FromStr;

pub use mysql::MySqlGrammar;
pub use plan::Plan;
pub use postgres::PostgresGrammar;
pub use rebuild::{rebuild_table, TEMP_TABLE_PREFIX};
pub use sqlite::SqliteGrammar;
pub use sqlserver::SqlServerGrammar;
pub use state::{ColumnShape, ColumnState, TableState};

use crate::blueprint::{
    Blueprint, ColumnDefinition, DefaultValue, ForeignKeyDefinition, IndexDefinition, IndexKind,
    Operation, TableOptions,
};
use crate::error::{Result, SchemaError};
use crate::introspect::{CatalogQueries, CatalogRows, ForeignKeyMeta, IntrospectedTable};

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Dialect {
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite.
    Sqlite,
    /// Microsoft SQL Server.
    SqlServer,
}

impl Dialect {
    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::SqlServer => "sqlserver",
        }
    }

    /// Picks the dialect from a connection URL scheme such as
    /// `postgres://...` or `sqlite::memory:`.
    pub fn from_url(url: &str) -> Result<Self> {
        let scheme = url.split(':').next().unwrap_or_default();
        scheme.parse()
    }

    /// Returns the grammar for this dialect.
    #[must_use]
    pub fn grammar(self) -> Box<dyn Grammar> {
        match self {
            Self::MySql => Box::new(MySqlGrammar::new()),
            Self::Postgres => Box::new(PostgresGrammar::new()),
            Self::Sqlite => Box::new(SqliteGrammar::new()),
            Self::SqlServer => Box::new(SqlServerGrammar::new()),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::Sqlite => "SQLite",
            Self::SqlServer => "SQL Server",
        };
        f.write_str(name)
    }
}

impl FromStr for Dialect {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" | "pgsql" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            "sqlserver" | "mssql" | "sql server" => Ok(Self::SqlServer),
            _ => Err(SchemaError::UnknownDialect(s.to_string())),
        }
    }
}

/// One unit of execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A single statement.
    Statement(String),
    /// Statements that must succeed or fail together.
    ///
    /// `setup` runs before the transaction opens and `teardown` runs after
    /// it closes, whether or not the transaction committed.
    Atomic {
        /// Statements run before the transaction.
        setup: Vec<String>,
        /// Statements run inside one transaction.
        statements: Vec<String>,
        /// Queries run inside the transaction after `statements`. Any row
        /// they return fails the step and rolls the transaction back.
        checks: Vec<String>,
        /// Statements run after the transaction, always.
        teardown: Vec<String>,
    },
}

impl Step {
    /// Returns every statement of the step in execution order.
    #[must_use]
    pub fn statements(&self) -> Vec<&str> {
        match self {
            Self::Statement(sql) => vec![sql.as_str()],
            Self::Atomic {
                setup,
                statements,
                checks,
                teardown,
            } => setup
                .iter()
                .chain(statements)
                .chain(checks)
                .chain(teardown)
                .map(String::as_str)
                .collect(),
        }
    }
}

/// The result of compiling a blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledBlueprint {
    /// Table the steps apply to.
    pub table: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl CompiledBlueprint {
    /// Flattens the steps into the ordered list of SQL statements.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.steps
            .iter()
            .flat_map(Step::statements)
            .map(ToString::to_string)
            .collect()
    }

    /// Returns true when there is nothing to execute.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Output of compiling a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// An `ALTER TABLE` clause, without the `ALTER TABLE <name>` prefix.
    Clause(String),
    /// A complete step.
    Step(Step),
}

impl Fragment {
    fn statement(sql: String) -> Self {
        Self::Step(Step::Statement(sql))
    }
}

/// Trait for dialect-specific DDL generation.
pub trait Grammar: Send + Sync {
    /// Returns the dialect.
    fn dialect(&self) -> Dialect;

    /// Returns the opening and closing identifier quote characters.
    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    /// Quotes an identifier, doubling embedded closing quotes.
    fn wrap(&self, name: &str) -> String {
        let (open, close) = self.quote_chars();
        let escaped = name.replace(close, &format!("{close}{close}"));
        format!("{open}{escaped}{close}")
    }

    /// Quotes and joins a column list.
    fn columnize(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.wrap(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Maps a column to its SQL type.
    fn type_sql(&self, column: &ColumnDefinition) -> String;

    /// Renders a default value.
    fn default_sql(&self, default: &DefaultValue) -> String {
        default.to_sql()
    }

    /// Renders a full column definition.
    fn column_sql(&self, column: &ColumnDefinition) -> String;

    /// Whether consecutive clauses share one `ALTER TABLE` statement.
    fn batches_alter_clauses(&self) -> bool {
        false
    }

    /// Compiles a blueprint against the live table, if known.
    fn compile(
        &self,
        blueprint: &Blueprint,
        current: Option<&IntrospectedTable>,
    ) -> Result<CompiledBlueprint> {
        let plan = Plan::prepare(blueprint, current)?;
        self.compile_plan(&plan)
    }

    /// Compiles a prepared plan.
    fn compile_plan(&self, plan: &Plan) -> Result<CompiledBlueprint> {
        let mut steps = Vec::new();
        if plan.is_creating() {
            steps.push(Step::Statement(self.compile_create(plan)));
        }
        steps.extend(compile_operations(self, plan)?);
        Ok(CompiledBlueprint {
            table: plan.table().to_string(),
            steps,
        })
    }

    /// Generates the `CREATE TABLE` statement.
    fn compile_create(&self, plan: &Plan) -> String {
        let columns: Vec<String> = plan
            .operations()
            .iter()
            .filter_map(|op| match op {
                Operation::AddColumn(column) => Some(self.column_sql(column)),
                _ => None,
            })
            .collect();
        let temporary = if plan.options().temporary {
            "TEMPORARY "
        } else {
            ""
        };
        format!(
            "CREATE {temporary}TABLE {} ({}){}",
            self.wrap(plan.table()),
            columns.join(", "),
            self.create_table_suffix(plan.options())
        )
    }

    /// Table options appended to `CREATE TABLE`.
    fn create_table_suffix(&self, _options: &TableOptions) -> String {
        String::new()
    }

    /// Compiles one operation.
    fn compile_operation(&self, table: &str, operation: &Operation) -> Result<Vec<Fragment>> {
        match operation {
            Operation::AddColumn(column) => self.compile_add_column(table, column),
            Operation::DropColumn(name) => self.compile_drop_column(table, name),
            Operation::RenameColumn { from, to } => self.compile_rename_column(table, from, to),
            Operation::ChangeColumn(column) => self.compile_change_column(table, column),
            Operation::AddIndex(index) if index.inline => Ok(Vec::new()),
            Operation::AddIndex(index) => self.compile_add_index(table, index),
            Operation::DropIndex { name, kind } => self.compile_drop_index(table, name, *kind),
            Operation::AddForeignKey(foreign) => self.compile_add_foreign(table, foreign),
            Operation::DropForeignKey(name) => self.compile_drop_foreign(table, name),
        }
    }

    /// Generates ADD COLUMN.
    fn compile_add_column(&self, _table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::Clause(format!(
            "ADD COLUMN {}",
            self.column_sql(column)
        ))])
    }

    /// Generates DROP COLUMN.
    fn compile_drop_column(&self, _table: &str, column: &str) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::Clause(format!(
            "DROP COLUMN {}",
            self.wrap(column)
        ))])
    }

    /// Generates RENAME COLUMN.
    fn compile_rename_column(&self, table: &str, from: &str, to: &str) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::statement(format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            self.wrap(table),
            self.wrap(from),
            self.wrap(to)
        ))])
    }

    /// Generates the statements that redefine a column.
    fn compile_change_column(&self, table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>>;

    /// Generates an index or primary key.
    fn compile_add_index(&self, table: &str, index: &IndexDefinition) -> Result<Vec<Fragment>>;

    /// Drops an index or primary key.
    fn compile_drop_index(&self, table: &str, name: &str, kind: IndexKind) -> Result<Vec<Fragment>>;

    /// Generates ADD FOREIGN KEY.
    fn compile_add_foreign(
        &self,
        table: &str,
        foreign: &ForeignKeyDefinition,
    ) -> Result<Vec<Fragment>> {
        let foreign = foreign.resolve(table)?;
        Ok(vec![Fragment::statement(format!(
            "ALTER TABLE {} ADD {}",
            self.wrap(table),
            self.foreign_key_sql(&foreign)
        ))])
    }

    /// Drops a foreign key.
    fn compile_drop_foreign(&self, table: &str, name: &str) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::statement(format!(
            "ALTER TABLE {} DROP CONSTRAINT {}",
            self.wrap(table),
            self.wrap(name)
        ))])
    }

    /// Renders a named foreign key constraint.
    fn foreign_key_sql(&self, foreign: &ForeignKeyMeta) -> String {
        let mut sql = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.wrap(&foreign.name),
            self.columnize(&foreign.columns),
            self.wrap(&foreign.referenced_table),
            self.columnize(&foreign.referenced_columns)
        );
        if let Some(action) = foreign.on_delete {
            sql.push_str(" ON DELETE ");
            sql.push_str(action.as_sql());
        }
        if let Some(action) = foreign.on_update {
            sql.push_str(" ON UPDATE ");
            sql.push_str(action.as_sql());
        }
        sql
    }

    /// Generates DROP TABLE.
    fn compile_drop_table(&self, table: &str, if_exists: bool) -> String {
        let guard = if if_exists { "IF EXISTS " } else { "" };
        format!("DROP TABLE {guard}{}", self.wrap(table))
    }

    /// Generates a table rename.
    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!("ALTER TABLE {} RENAME TO {}", self.wrap(from), self.wrap(to))
    }

    /// Catalog queries describing `table`.
    fn catalog_queries(&self, table: &str) -> CatalogQueries;

    /// Parses the results of [`Grammar::catalog_queries`].
    fn describe_table(&self, table: &str, rows: &CatalogRows) -> Result<IntrospectedTable> {
        IntrospectedTable::from_catalog(table, rows)
    }
}

/// Compiles every operation of `plan` and joins clauses into statements.
pub fn compile_operations<G: Grammar + ?Sized>(grammar: &G, plan: &Plan) -> Result<Vec<Step>> {
    let mut fragments = Vec::new();
    for operation in plan.operations() {
        if plan.is_creating() && matches!(operation, Operation::AddColumn(_)) {
            continue;
        }
        fragments.extend(grammar.compile_operation(plan.table(), operation)?);
    }
    Ok(assemble(grammar, plan.table(), fragments))
}

/// Prefixes clauses with `ALTER TABLE`, merging runs of clauses when the
/// grammar batches them.
pub fn assemble<G: Grammar + ?Sized>(grammar: &G, table: &str, fragments: Vec<Fragment>) -> Vec<Step> {
    let prefix = format!("ALTER TABLE {}", grammar.wrap(table));
    let mut steps = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    for fragment in fragments {
        match fragment {
            Fragment::Clause(clause) if grammar.batches_alter_clauses() => pending.push(clause),
            Fragment::Clause(clause) => steps.push(Step::Statement(format!("{prefix} {clause}"))),
            Fragment::Step(step) => {
                flush(&prefix, &mut pending, &mut steps);
                steps.push(step);
            }
        }
    }
    flush(&prefix, &mut pending, &mut steps);
    steps
}

fn flush(prefix: &str, pending: &mut Vec<String>, steps: &mut Vec<Step>) {
    if !pending.is_empty() {
        steps.push(Step::Statement(format!("{prefix} {}", pending.join(", "))));
        pending.clear();
    }
}
