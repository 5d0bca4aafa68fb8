//! SQL Server grammar.
//!
//! Defaults are separately named constraints in SQL Server, so changing a
//! column's default is rejected rather than guessed at. Dropping a column
//! first drops whatever default constraint it carries.

use super::{CompiledBlueprint, Dialect, Fragment, Grammar, Plan};
use crate::blueprint::{
    Blueprint, ColumnDefinition, ColumnType, DefaultValue, IndexDefinition, IndexKind, Operation,
};
use crate::error::{Result, SchemaError};
use crate::introspect::{catalog_literal, CatalogQueries, IntrospectedTable};

/// SQL Server DDL grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerGrammar;

impl SqlServerGrammar {
    /// Creates a new SQL Server grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn unsupported(operation: String) -> SchemaError {
        SchemaError::Unsupported {
            dialect: Dialect::SqlServer,
            operation,
        }
    }

    /// Unicode string literal.
    fn literal(value: &str) -> String {
        format!("N'{}'", value.replace('\'', "''"))
    }
}

impl Grammar for SqlServerGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn quote_chars(&self) -> (char, char) {
        ('[', ']')
    }

    fn type_sql(&self, column: &ColumnDefinition) -> String {
        match &column.column_type {
            ColumnType::TinyInteger => "TINYINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::MediumInteger | ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Float | ColumnType::Double => "FLOAT".to_string(),
            ColumnType::Decimal { total, places } => format!("DECIMAL({total}, {places})"),
            ColumnType::Char(length) => format!("NCHAR({length})"),
            ColumnType::String(length) => format!("NVARCHAR({length})"),
            ColumnType::Enum(_) => "NVARCHAR(255)".to_string(),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText | ColumnType::Json => {
                "NVARCHAR(MAX)".to_string()
            }
            ColumnType::Boolean => "BIT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::Timestamp => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Binary => "VARBINARY(MAX)".to_string(),
            ColumnType::Uuid => "UNIQUEIDENTIFIER".to_string(),
        }
    }

    fn default_sql(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Bool(value) => u8::from(*value).to_string(),
            DefaultValue::String(value) => Self::literal(value),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            other => other.to_sql(),
        }
    }

    fn column_sql(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![self.wrap(&column.name), self.type_sql(column)];
        parts.push(if column.is_nullable() { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_sql(default)));
        }
        if column.autoincrement {
            parts.push("IDENTITY".to_string());
        }
        if column.primary {
            parts.push("PRIMARY KEY".to_string());
        }
        parts.join(" ")
    }

    /// Rejects default changes and full-text indexes before planning.
    fn compile(
        &self,
        blueprint: &Blueprint,
        current: Option<&IntrospectedTable>,
    ) -> Result<CompiledBlueprint> {
        for operation in blueprint.operations() {
            match operation {
                Operation::ChangeColumn(column) if column.default.is_some() || column.drop_default => {
                    return Err(Self::unsupported(format!(
                        "change the default of column '{}'",
                        column.name
                    )));
                }
                Operation::AddIndex(index) if index.kind == IndexKind::Fulltext => {
                    return Err(Self::unsupported("full-text index".to_string()));
                }
                _ => {}
            }
        }
        let plan = Plan::prepare(blueprint, current)?;
        self.compile_plan(&plan)
    }

    fn compile_add_column(&self, _table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::Clause(format!("ADD {}", self.column_sql(column)))])
    }

    /// Drops the column's default constraint, if any, then the column.
    fn compile_drop_column(&self, table: &str, column: &str) -> Result<Vec<Fragment>> {
        let drop_default = format!(
            "DECLARE @sql NVARCHAR(MAX) = N''; \
             SELECT @sql = N'ALTER TABLE {table_id} DROP CONSTRAINT ' + QUOTENAME(dc.name) \
             FROM sys.default_constraints dc \
             JOIN sys.columns c ON c.default_object_id = dc.object_id \
             WHERE c.object_id = OBJECT_ID(N'{table_name}') AND c.name = N'{column_name}'; \
             IF @sql <> N'' EXEC(@sql)",
            table_id = self.wrap(table).replace('\'', "''"),
            table_name = catalog_literal(table),
            column_name = catalog_literal(column),
        );
        Ok(vec![
            Fragment::statement(drop_default),
            Fragment::Clause(format!("DROP COLUMN {}", self.wrap(column))),
        ])
    }

    fn compile_rename_column(&self, table: &str, from: &str, to: &str) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::statement(format!(
            "EXEC sp_rename {}, {}, N'COLUMN'",
            Self::literal(&format!("{table}.{from}")),
            Self::literal(to)
        ))])
    }

    /// Restates type and nullability. Resolved defaults are left in place.
    fn compile_change_column(&self, _table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        let nullable = if column.is_nullable() { "NULL" } else { "NOT NULL" };
        Ok(vec![Fragment::Clause(format!(
            "ALTER COLUMN {} {} {nullable}",
            self.wrap(&column.name),
            self.type_sql(column)
        ))])
    }

    fn compile_add_index(&self, table: &str, index: &IndexDefinition) -> Result<Vec<Fragment>> {
        let name = self.wrap(&index.resolved_name(table));
        let columns = self.columnize(&index.columns);
        let sql = match index.kind {
            IndexKind::Primary => format!(
                "ALTER TABLE {} ADD CONSTRAINT {name} PRIMARY KEY ({columns})",
                self.wrap(table)
            ),
            IndexKind::Unique => format!("CREATE UNIQUE INDEX {name} ON {} ({columns})", self.wrap(table)),
            IndexKind::Index => format!("CREATE INDEX {name} ON {} ({columns})", self.wrap(table)),
            IndexKind::Fulltext => return Err(Self::unsupported("full-text index".to_string())),
        };
        Ok(vec![Fragment::statement(sql)])
    }

    fn compile_drop_index(&self, table: &str, name: &str, kind: IndexKind) -> Result<Vec<Fragment>> {
        let sql = match kind {
            IndexKind::Primary => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.wrap(table),
                self.wrap(name)
            ),
            _ => format!("DROP INDEX {} ON {}", self.wrap(name), self.wrap(table)),
        };
        Ok(vec![Fragment::statement(sql)])
    }

    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!("EXEC sp_rename {}, {}", Self::literal(from), Self::literal(to))
    }

    fn catalog_queries(&self, table: &str) -> CatalogQueries {
        let table = catalog_literal(table);
        CatalogQueries {
            table_exists: format!(
                "SELECT CAST(TABLE_NAME AS NVARCHAR(128)) AS name FROM INFORMATION_SCHEMA.TABLES \
                 WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_NAME = N'{table}'"
            ),
            columns: format!(
                "SELECT CAST(c.name AS NVARCHAR(128)) AS name, \
                 CAST(t.name AS NVARCHAR(128)) AS data_type, \
                 CASE WHEN c.is_nullable = 1 THEN '1' ELSE '0' END AS nullable, \
                 CAST(dc.definition AS NVARCHAR(MAX)) AS default_value, \
                 CAST(COALESCE(ic.key_ordinal, 0) AS NVARCHAR(10)) AS primary_position, \
                 CASE WHEN c.is_identity = 1 THEN '1' ELSE '0' END AS autoincrement, \
                 '0' AS unsigned \
                 FROM sys.columns c \
                 JOIN sys.types t ON t.user_type_id = c.user_type_id \
                 LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id \
                 LEFT JOIN sys.indexes pk ON pk.object_id = c.object_id AND pk.is_primary_key = 1 \
                 LEFT JOIN sys.index_columns ic ON ic.object_id = pk.object_id \
                 AND ic.index_id = pk.index_id AND ic.column_id = c.column_id \
                 WHERE c.object_id = OBJECT_ID(N'{table}') \
                 ORDER BY c.column_id"
            ),
            indexes: format!(
                "SELECT CAST(i.name AS NVARCHAR(128)) AS name, \
                 CAST(c.name AS NVARCHAR(128)) AS column_name, \
                 CAST(ic.key_ordinal AS NVARCHAR(10)) AS position, \
                 CASE WHEN i.is_unique = 1 THEN '1' ELSE '0' END AS is_unique, \
                 CASE WHEN i.is_primary_key = 1 THEN '1' ELSE '0' END AS is_primary, \
                 CAST(i.type_desc AS NVARCHAR(60)) AS index_type \
                 FROM sys.indexes i \
                 JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
                 JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
                 WHERE i.object_id = OBJECT_ID(N'{table}') AND i.name IS NOT NULL \
                 ORDER BY i.name, ic.key_ordinal"
            ),
            foreign_keys: format!(
                "SELECT CAST(fk.name AS NVARCHAR(128)) AS name, \
                 CAST(pc.name AS NVARCHAR(128)) AS column_name, \
                 CAST(fkc.constraint_column_id AS NVARCHAR(10)) AS position, \
                 CAST(rt.name AS NVARCHAR(128)) AS referenced_table, \
                 CAST(rc.name AS NVARCHAR(128)) AS referenced_column, \
                 CAST(REPLACE(fk.delete_referential_action_desc, '_', ' ') AS NVARCHAR(60)) AS on_delete, \
                 CAST(REPLACE(fk.update_referential_action_desc, '_', ' ') AS NVARCHAR(60)) AS on_update \
                 FROM sys.foreign_keys fk \
                 JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
                 JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
                 JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
                 JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id \
                 AND rc.column_id = fkc.referenced_column_id \
                 WHERE fk.parent_object_id = OBJECT_ID(N'{table}') \
                 ORDER BY fk.name, fkc.constraint_column_id"
            ),
            definition: None,
        }
    }
}
