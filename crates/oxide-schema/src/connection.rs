//! Database connections.
//!
//! The schema builder only needs a handful of capabilities from a database:
//! run a statement, run a batch atomically, and read catalog rows as text.
//! [`Connection`] names them, and [`DatabaseConnection`] provides them over
//! `sqlx`'s driver-agnostic `AnyConnection`.

use oxide_schema_core::{CatalogRow, CatalogRows, Dialect, Grammar, IntrospectedTable};
use sqlx::any::{install_default_drivers, AnyRow};
use sqlx::AnyConnection;
use sqlx::{Column as _, Connection as _, Row as _};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// A connection the schema builder can drive.
///
/// Implementations must run statements strictly in call order. A connection
/// is never used by two schema operations at once.
#[allow(async_fn_in_trait)]
pub trait Connection {
    /// The dialect spoken by the database.
    fn dialect(&self) -> Dialect;

    /// Executes one statement.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query and returns every row with its values as text.
    async fn fetch(&mut self, sql: &str) -> Result<Vec<CatalogRow>>;

    /// Executes `statements` in one transaction, then runs each of `checks`
    /// in the same transaction.
    ///
    /// Either every statement takes effect or none does. A check that
    /// returns any row fails with [`Error::CheckFailed`] and rolls back.
    async fn execute_atomic(&mut self, statements: &[String], checks: &[String]) -> Result<()>;

    /// Commits pending work. Auto-committing connections do nothing.
    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Reads the live shape of `table`, or `None` when it does not exist.
    async fn describe_table(
        &mut self,
        grammar: &dyn Grammar,
        table: &str,
    ) -> Result<Option<IntrospectedTable>> {
        let queries = grammar.catalog_queries(table);
        if self.fetch(&queries.table_exists).await?.is_empty() {
            return Ok(None);
        }

        let definition = match &queries.definition {
            Some(sql) => self
                .fetch(sql)
                .await?
                .first()
                .and_then(|row| row.get("sql"))
                .map(ToString::to_string),
            None => None,
        };
        let rows = CatalogRows {
            columns: self.fetch(&queries.columns).await?,
            indexes: self.fetch(&queries.indexes).await?,
            foreign_keys: self.fetch(&queries.foreign_keys).await?,
            definition,
        };
        Ok(Some(grammar.describe_table(table, &rows)?))
    }
}

/// A `sqlx` connection to MySQL, PostgreSQL or SQLite.
pub struct DatabaseConnection {
    inner: AnyConnection,
    dialect: Dialect,
}

impl DatabaseConnection {
    /// Connects to `url` and picks the dialect from the driver that answered.
    pub async fn connect(url: &str) -> Result<Self> {
        install_default_drivers();
        let inner = AnyConnection::connect(url).await?;
        let dialect = inner.backend_name().parse()?;
        debug!(%dialect, "Connected");
        Ok(Self { inner, dialect })
    }

    /// Closes the connection.
    pub async fn close(self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("dialect", &self.dialect)
            .finish_non_exhaustive()
    }
}

impl Connection for DatabaseConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&mut self, sql: &str) -> Result<()> {
        sqlx::query(sql)
            .execute(&mut self.inner)
            .await
            .map_err(|e| Error::execution(sql, e))?;
        Ok(())
    }

    async fn fetch(&mut self, sql: &str) -> Result<Vec<CatalogRow>> {
        let rows = sqlx::query(sql)
            .fetch_all(&mut self.inner)
            .await
            .map_err(|e| Error::execution(sql, e))?;
        rows.iter().map(text_row).collect()
    }

    async fn execute_atomic(&mut self, statements: &[String], checks: &[String]) -> Result<()> {
        let mut tx = self.inner.begin().await?;
        match run_batch(&mut tx, statements, checks).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Atomic batch failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }
}

async fn run_batch(conn: &mut AnyConnection, statements: &[String], checks: &[String]) -> Result<()> {
    for sql in statements {
        debug!(sql = %sql, "Executing SQL");
        sqlx::query(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::execution(sql, e))?;
    }
    for check in checks {
        debug!(sql = %check, "Running check");
        let rows = sqlx::query(check)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| Error::execution(check, e))?;
        if !rows.is_empty() {
            return Err(Error::CheckFailed {
                check: check.clone(),
                rows: rows.len(),
            });
        }
    }
    Ok(())
}

/// Reads every value of `row` as optional text, keyed by column alias.
fn text_row(row: &AnyRow) -> Result<CatalogRow> {
    let mut values = Vec::with_capacity(row.columns().len());
    for column in row.columns() {
        values.push((column.name().to_string(), text_value(row, column.ordinal())?));
    }
    Ok(CatalogRow::new(values))
}

/// Decodes one value as text. Numbers and booleans are formatted.
fn text_value(row: &AnyRow, ordinal: usize) -> Result<Option<String>> {
    if let Ok(value) = row.try_get::<Option<String>, _>(ordinal) {
        return Ok(value);
    }
    if let Ok(value) = row.try_get::<Option<i64>, _>(ordinal) {
        return Ok(value.map(|v| v.to_string()));
    }
    if let Ok(value) = row.try_get::<Option<f64>, _>(ordinal) {
        return Ok(value.map(|v| v.to_string()));
    }
    Ok(row.try_get::<Option<bool>, _>(ordinal)?.map(|v| v.to_string()))
}
