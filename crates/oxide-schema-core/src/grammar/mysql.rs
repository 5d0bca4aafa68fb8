//! MySQL grammar.

use super::{Dialect, Fragment, Grammar};
use crate::blueprint::{
    quote_literal, ColumnDefinition, ColumnType, DefaultValue, IndexDefinition, IndexKind,
    TableOptions,
};
use crate::error::Result;
use crate::introspect::{catalog_literal, CatalogQueries};

/// MySQL DDL grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGrammar;

impl MySqlGrammar {
    /// Creates a new MySQL grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Grammar for MySqlGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_chars(&self) -> (char, char) {
        ('`', '`')
    }

    fn type_sql(&self, column: &ColumnDefinition) -> String {
        match &column.column_type {
            ColumnType::TinyInteger => "TINYINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::MediumInteger => "MEDIUMINT".to_string(),
            ColumnType::Integer => "INT".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { total, places } => format!("DECIMAL({total}, {places})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::MediumText => "MEDIUMTEXT".to_string(),
            ColumnType::LongText => "LONGTEXT".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Enum(values) => {
                let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                format!("ENUM({})", values.join(", "))
            }
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
        }
    }

    fn default_sql(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Bool(value) => u8::from(*value).to_string(),
            other => other.to_sql(),
        }
    }

    fn column_sql(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![self.wrap(&column.name), self.type_sql(column)];
        if column.unsigned && column.column_type.is_integer() {
            parts.push("UNSIGNED".to_string());
        }
        parts.push(if column.is_nullable() { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_sql(default)));
        }
        if column.autoincrement {
            parts.push("AUTO_INCREMENT".to_string());
        }
        if column.primary {
            parts.push("PRIMARY KEY".to_string());
        }
        if let Some(after) = &column.after {
            parts.push(format!("AFTER {}", self.wrap(after)));
        }
        parts.join(" ")
    }

    fn batches_alter_clauses(&self) -> bool {
        true
    }

    fn create_table_suffix(&self, options: &TableOptions) -> String {
        let mut sql = String::new();
        if let Some(engine) = &options.engine {
            sql.push_str(" ENGINE = ");
            sql.push_str(engine);
        }
        if let Some(charset) = &options.charset {
            sql.push_str(" DEFAULT CHARACTER SET ");
            sql.push_str(charset);
        }
        if let Some(collation) = &options.collation {
            sql.push_str(" COLLATE ");
            sql.push_str(collation);
        }
        sql
    }

    fn compile_add_column(&self, _table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::Clause(format!("ADD {}", self.column_sql(column)))])
    }

    fn compile_drop_column(&self, _table: &str, column: &str) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::Clause(format!("DROP {}", self.wrap(column)))])
    }

    fn compile_change_column(&self, _table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::Clause(format!("MODIFY {}", self.column_sql(column)))])
    }

    fn compile_add_index(&self, table: &str, index: &IndexDefinition) -> Result<Vec<Fragment>> {
        let columns = self.columnize(&index.columns);
        let clause = match index.kind {
            IndexKind::Primary => format!("ADD PRIMARY KEY ({columns})"),
            IndexKind::Unique => format!(
                "ADD UNIQUE {} ({columns})",
                self.wrap(&index.resolved_name(table))
            ),
            IndexKind::Index => format!(
                "ADD INDEX {} ({columns})",
                self.wrap(&index.resolved_name(table))
            ),
            IndexKind::Fulltext => format!(
                "ADD FULLTEXT {} ({columns})",
                self.wrap(&index.resolved_name(table))
            ),
        };
        Ok(vec![Fragment::Clause(clause)])
    }

    fn compile_drop_index(&self, _table: &str, name: &str, kind: IndexKind) -> Result<Vec<Fragment>> {
        let clause = match kind {
            IndexKind::Primary => "DROP PRIMARY KEY".to_string(),
            _ => format!("DROP INDEX {}", self.wrap(name)),
        };
        Ok(vec![Fragment::Clause(clause)])
    }

    fn compile_drop_foreign(&self, table: &str, name: &str) -> Result<Vec<Fragment>> {
        Ok(vec![Fragment::statement(format!(
            "ALTER TABLE {} DROP FOREIGN KEY {}",
            self.wrap(table),
            self.wrap(name)
        ))])
    }

    fn compile_rename_table(&self, from: &str, to: &str) -> String {
        format!("RENAME TABLE {} TO {}", self.wrap(from), self.wrap(to))
    }

    fn catalog_queries(&self, table: &str) -> CatalogQueries {
        let table = catalog_literal(table);
        CatalogQueries {
            table_exists: format!(
                "SELECT CAST(TABLE_NAME AS CHAR) AS name FROM information_schema.TABLES \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = '{table}'"
            ),
            columns: format!(
                "SELECT CAST(c.COLUMN_NAME AS CHAR) AS name, \
                 CAST(c.COLUMN_TYPE AS CHAR) AS data_type, \
                 CASE WHEN c.IS_NULLABLE = 'YES' THEN '1' ELSE '0' END AS nullable, \
                 CASE WHEN c.COLUMN_DEFAULT IS NULL THEN NULL \
                 WHEN c.EXTRA LIKE '%DEFAULT_GENERATED%' \
                 OR UPPER(c.COLUMN_DEFAULT) LIKE 'CURRENT_TIMESTAMP%' \
                 THEN CAST(c.COLUMN_DEFAULT AS CHAR) \
                 ELSE CAST(QUOTE(c.COLUMN_DEFAULT) AS CHAR) END AS default_value, \
                 CAST(COALESCE((SELECT k.ORDINAL_POSITION \
                 FROM information_schema.KEY_COLUMN_USAGE k \
                 WHERE k.TABLE_SCHEMA = c.TABLE_SCHEMA AND k.TABLE_NAME = c.TABLE_NAME \
                 AND k.COLUMN_NAME = c.COLUMN_NAME AND k.CONSTRAINT_NAME = 'PRIMARY'), 0) AS CHAR) \
                 AS primary_position, \
                 CASE WHEN c.EXTRA LIKE '%auto_increment%' THEN '1' ELSE '0' END AS autoincrement, \
                 CASE WHEN c.COLUMN_TYPE LIKE '%unsigned%' THEN '1' ELSE '0' END AS `unsigned` \
                 FROM information_schema.COLUMNS c \
                 WHERE c.TABLE_SCHEMA = DATABASE() AND c.TABLE_NAME = '{table}' \
                 ORDER BY c.ORDINAL_POSITION"
            ),
            indexes: format!(
                "SELECT CAST(INDEX_NAME AS CHAR) AS name, CAST(COLUMN_NAME AS CHAR) AS column_name, \
                 CAST(SEQ_IN_INDEX AS CHAR) AS position, \
                 CASE WHEN NON_UNIQUE = 0 THEN '1' ELSE '0' END AS is_unique, \
                 CASE WHEN INDEX_NAME = 'PRIMARY' THEN '1' ELSE '0' END AS is_primary, \
                 CAST(INDEX_TYPE AS CHAR) AS index_type \
                 FROM information_schema.STATISTICS \
                 WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = '{table}' \
                 ORDER BY INDEX_NAME, SEQ_IN_INDEX"
            ),
            foreign_keys: format!(
                "SELECT CAST(k.CONSTRAINT_NAME AS CHAR) AS name, \
                 CAST(k.COLUMN_NAME AS CHAR) AS column_name, \
                 CAST(k.ORDINAL_POSITION AS CHAR) AS position, \
                 CAST(k.REFERENCED_TABLE_NAME AS CHAR) AS referenced_table, \
                 CAST(k.REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column, \
                 CAST(r.DELETE_RULE AS CHAR) AS on_delete, \
                 CAST(r.UPDATE_RULE AS CHAR) AS on_update \
                 FROM information_schema.KEY_COLUMN_USAGE k \
                 JOIN information_schema.REFERENTIAL_CONSTRAINTS r \
                 ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
                 AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME AND r.TABLE_NAME = k.TABLE_NAME \
                 WHERE k.TABLE_SCHEMA = DATABASE() AND k.TABLE_NAME = '{table}' \
                 AND k.REFERENCED_TABLE_NAME IS NOT NULL \
                 ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION"
            ),
            definition: None,
        }
    }
}
