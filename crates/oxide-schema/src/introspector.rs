//! Read-only views of the live schema.

use std::io::Write;

use oxide_schema_core::{ColumnMeta, Grammar, IntrospectedTable, SchemaError};
use tracing::debug;

use crate::connection::Connection;
use crate::error::Result;

/// Answers questions about live tables through a connection and the
/// catalog queries of its grammar.
pub struct Introspector<'a, C: Connection> {
    connection: &'a mut C,
    grammar: &'a dyn Grammar,
}

impl<'a, C: Connection> Introspector<'a, C> {
    /// Creates an introspector over `connection`.
    pub fn new(connection: &'a mut C, grammar: &'a dyn Grammar) -> Self {
        Self {
            connection,
            grammar,
        }
    }

    /// Reads `table`, or `None` when it does not exist.
    pub async fn find(&mut self, table: &str) -> Result<Option<IntrospectedTable>> {
        debug!(table = %table, dialect = %self.grammar.dialect(), "Introspecting table");
        self.connection.describe_table(self.grammar, table).await
    }

    /// Reads `table`, failing with [`SchemaError::TableNotFound`] when it
    /// does not exist.
    pub async fn describe(&mut self, table: &str) -> Result<IntrospectedTable> {
        self.find(table).await?.ok_or_else(|| {
            SchemaError::TableNotFound {
                table: table.to_string(),
            }
            .into()
        })
    }

    /// Returns true when `table` exists.
    pub async fn has_table(&mut self, table: &str) -> Result<bool> {
        let queries = self.grammar.catalog_queries(table);
        Ok(!self.connection.fetch(&queries.table_exists).await?.is_empty())
    }

    /// Returns true when `table` exists and has `column`.
    pub async fn has_column(&mut self, table: &str, column: &str) -> Result<bool> {
        Ok(self.get_column(table, column).await?.is_some())
    }

    /// Returns the live column, or `None` when the table or the column is
    /// missing.
    pub async fn get_column(&mut self, table: &str, column: &str) -> Result<Option<ColumnMeta>> {
        Ok(self
            .find(table)
            .await?
            .and_then(|described| described.column(column).cloned()))
    }

    /// Returns the column names in catalog order, empty for a missing table.
    pub async fn get_column_listing(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .find(table)
            .await?
            .map(|described| described.column_names())
            .unwrap_or_default())
    }
}

/// Writes `table` to `out` as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write>(table: &IntrospectedTable, mut out: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, table)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_schema_core::introspect::IndexMeta;
    use oxide_schema_core::IndexKind;

    #[test]
    fn test_write_json() {
        let table = IntrospectedTable {
            name: "users".into(),
            columns: vec![ColumnMeta {
                name: "id".into(),
                data_type: "INTEGER".into(),
                nullable: false,
                default: None,
                primary_key: 1,
                autoincrement: true,
                unsigned: false,
            }],
            indexes: vec![IndexMeta {
                name: "primary".into(),
                columns: vec!["id".into()],
                kind: IndexKind::Primary,
            }],
            foreign_keys: Vec::new(),
        };

        let mut out = Vec::new();
        write_json(&table, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["name"], "users");
        assert_eq!(value["columns"][0]["autoincrement"], true);
        assert_eq!(value["indexes"][0]["columns"][0], "id");
        assert!(out.ends_with(b"}\n"));
    }
}
