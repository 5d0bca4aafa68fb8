//! PostgreSQL grammar.

use super::{Dialect, Fragment, Grammar, Step};
use crate::blueprint::{quote_literal, ColumnDefinition, ColumnType, IndexDefinition, IndexKind};
use crate::error::Result;
use crate::introspect::{catalog_literal, CatalogQueries, CatalogRows, IntrospectedTable};

/// PostgreSQL DDL grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGrammar;

impl PostgresGrammar {
    /// Creates a new PostgreSQL grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The column type without `SERIAL` substitution.
    fn base_type_sql(&self, column: &ColumnDefinition) -> String {
        match &column.column_type {
            ColumnType::TinyInteger | ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::MediumInteger | ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal { total, places } => format!("DECIMAL({total}, {places})"),
            ColumnType::Char(length) => format!("CHAR({length})"),
            ColumnType::String(length) => format!("VARCHAR({length})"),
            ColumnType::Text | ColumnType::MediumText | ColumnType::LongText => "TEXT".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Enum(values) => {
                let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
                format!(
                    "VARCHAR(255) CHECK ({} IN ({}))",
                    self.wrap(&column.name),
                    values.join(", ")
                )
            }
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::Timestamp => {
                "TIMESTAMP(0) WITHOUT TIME ZONE".to_string()
            }
            ColumnType::Time => "TIME(0) WITHOUT TIME ZONE".to_string(),
            ColumnType::Binary => "BYTEA".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
        }
    }

    /// The type used by `ALTER COLUMN .. TYPE`, where `CHECK` is not allowed.
    fn alter_type_sql(&self, column: &ColumnDefinition) -> String {
        match &column.column_type {
            ColumnType::Enum(_) => "VARCHAR(255)".to_string(),
            _ => self.base_type_sql(column),
        }
    }

    /// Name Postgres gives an inline column `CHECK`.
    fn check_name(table: &str, column: &str) -> String {
        format!("{table}_{column}_check")
    }
}

impl Grammar for PostgresGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn type_sql(&self, column: &ColumnDefinition) -> String {
        if column.autoincrement {
            return match column.column_type {
                ColumnType::BigInteger => "BIGSERIAL".to_string(),
                ColumnType::TinyInteger | ColumnType::SmallInteger => "SMALLSERIAL".to_string(),
                _ => "SERIAL".to_string(),
            };
        }
        self.base_type_sql(column)
    }

    fn column_sql(&self, column: &ColumnDefinition) -> String {
        let mut parts = vec![self.wrap(&column.name), self.type_sql(column)];
        if column.primary {
            parts.push("PRIMARY KEY".to_string());
        }
        parts.push(if column.is_nullable() { "NULL" } else { "NOT NULL" }.to_string());
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_sql(default)));
        }
        parts.join(" ")
    }

    /// Changes type, then nullability, then default, in one transaction.
    /// Enum columns also swap their `CHECK` for one over the new values.
    ///
    /// The old default is dropped before the type changes so that a default
    /// which no longer casts to the new type cannot block the change.
    fn compile_change_column(&self, table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.wrap(table),
            self.wrap(&column.name)
        );
        let check = self.wrap(&Self::check_name(table, &column.name));
        let mut statements = Vec::new();
        if matches!(column.column_type, ColumnType::Enum(_)) {
            statements.push(format!(
                "ALTER TABLE {} DROP CONSTRAINT IF EXISTS {check}",
                self.wrap(table)
            ));
        }
        if column.default.is_some() || column.drop_default {
            statements.push(format!("{prefix} DROP DEFAULT"));
        }
        let base = self.alter_type_sql(column);
        statements.push(format!(
            "{prefix} TYPE {base} USING {}::{base}",
            self.wrap(&column.name)
        ));
        match column.nullable {
            Some(true) => statements.push(format!("{prefix} DROP NOT NULL")),
            Some(false) => statements.push(format!("{prefix} SET NOT NULL")),
            None => {}
        }
        if let Some(default) = &column.default {
            statements.push(format!("{prefix} SET DEFAULT {}", self.default_sql(default)));
        }
        if let ColumnType::Enum(values) = &column.column_type {
            let values: Vec<String> = values.iter().map(|v| quote_literal(v)).collect();
            statements.push(format!(
                "ALTER TABLE {} ADD CONSTRAINT {check} CHECK ({} IN ({}))",
                self.wrap(table),
                self.wrap(&column.name),
                values.join(", ")
            ));
        }
        Ok(vec![Fragment::Step(Step::Atomic {
            setup: Vec::new(),
            statements,
            checks: Vec::new(),
            teardown: Vec::new(),
        })])
    }

    fn compile_add_index(&self, table: &str, index: &IndexDefinition) -> Result<Vec<Fragment>> {
        let name = self.wrap(&index.resolved_name(table));
        let columns = self.columnize(&index.columns);
        let sql = match index.kind {
            IndexKind::Primary => format!(
                "ALTER TABLE {} ADD CONSTRAINT {name} PRIMARY KEY ({columns})",
                self.wrap(table)
            ),
            IndexKind::Unique => format!(
                "ALTER TABLE {} ADD CONSTRAINT {name} UNIQUE ({columns})",
                self.wrap(table)
            ),
            IndexKind::Index => format!("CREATE INDEX {name} ON {} ({columns})", self.wrap(table)),
            IndexKind::Fulltext => {
                let document: Vec<String> = index.columns.iter().map(|c| self.wrap(c)).collect();
                format!(
                    "CREATE INDEX {name} ON {} USING GIN (to_tsvector('english', {}))",
                    self.wrap(table),
                    document.join(" || ' ' || ")
                )
            }
        };
        Ok(vec![Fragment::statement(sql)])
    }

    fn compile_drop_index(&self, table: &str, name: &str, kind: IndexKind) -> Result<Vec<Fragment>> {
        let sql = match kind {
            IndexKind::Primary | IndexKind::Unique => format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.wrap(table),
                self.wrap(name)
            ),
            IndexKind::Index | IndexKind::Fulltext => format!("DROP INDEX {}", self.wrap(name)),
        };
        Ok(vec![Fragment::statement(sql)])
    }

    fn catalog_queries(&self, table: &str) -> CatalogQueries {
        let table = catalog_literal(table);
        CatalogQueries {
            table_exists: format!(
                "SELECT c.relname::text AS name FROM pg_catalog.pg_class c \
                 WHERE c.relkind IN ('r', 'p') AND c.relname = '{table}' \
                 AND pg_catalog.pg_table_is_visible(c.oid)"
            ),
            columns: format!(
                "SELECT a.attname::text AS name, \
                 pg_catalog.format_type(a.atttypid, a.atttypmod)::text AS data_type, \
                 CASE WHEN a.attnotnull THEN '0' ELSE '1' END AS nullable, \
                 pg_catalog.pg_get_expr(d.adbin, d.adrelid)::text AS default_value, \
                 COALESCE(array_position(i.indkey::int2[], a.attnum), 0)::text AS primary_position, \
                 CASE WHEN pg_catalog.pg_get_expr(d.adbin, d.adrelid) LIKE 'nextval(%' \
                 OR a.attidentity <> '' THEN '1' ELSE '0' END AS autoincrement, \
                 '0' AS unsigned \
                 FROM pg_catalog.pg_attribute a \
                 JOIN pg_catalog.pg_class c ON c.oid = a.attrelid \
                 LEFT JOIN pg_catalog.pg_attrdef d ON d.adrelid = a.attrelid AND d.adnum = a.attnum \
                 LEFT JOIN pg_catalog.pg_index i ON i.indrelid = c.oid AND i.indisprimary \
                 WHERE c.relname = '{table}' AND pg_catalog.pg_table_is_visible(c.oid) \
                 AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum"
            ),
            indexes: format!(
                "SELECT ic.relname::text AS name, a.attname::text AS column_name, \
                 k.ord::text AS position, \
                 CASE WHEN i.indisunique THEN '1' ELSE '0' END AS is_unique, \
                 CASE WHEN i.indisprimary THEN '1' ELSE '0' END AS is_primary, \
                 am.amname::text AS index_type \
                 FROM pg_catalog.pg_index i \
                 JOIN pg_catalog.pg_class tc ON tc.oid = i.indrelid \
                 JOIN pg_catalog.pg_class ic ON ic.oid = i.indexrelid \
                 JOIN pg_catalog.pg_am am ON am.oid = ic.relam \
                 CROSS JOIN LATERAL unnest(i.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
                 JOIN pg_catalog.pg_attribute a ON a.attrelid = tc.oid AND a.attnum = k.attnum \
                 WHERE tc.relname = '{table}' AND pg_catalog.pg_table_is_visible(tc.oid) \
                 ORDER BY ic.relname, k.ord"
            ),
            foreign_keys: format!(
                "SELECT con.conname::text AS name, la.attname::text AS column_name, \
                 k.ord::text AS position, rc.relname::text AS referenced_table, \
                 ra.attname::text AS referenced_column, \
                 CASE con.confdeltype WHEN 'c' THEN 'CASCADE' WHEN 'n' THEN 'SET NULL' \
                 WHEN 'd' THEN 'SET DEFAULT' WHEN 'r' THEN 'RESTRICT' ELSE 'NO ACTION' END \
                 AS on_delete, \
                 CASE con.confupdtype WHEN 'c' THEN 'CASCADE' WHEN 'n' THEN 'SET NULL' \
                 WHEN 'd' THEN 'SET DEFAULT' WHEN 'r' THEN 'RESTRICT' ELSE 'NO ACTION' END \
                 AS on_update \
                 FROM pg_catalog.pg_constraint con \
                 JOIN pg_catalog.pg_class tc ON tc.oid = con.conrelid \
                 JOIN pg_catalog.pg_class rc ON rc.oid = con.confrelid \
                 CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(local_attnum, remote_attnum, ord) \
                 JOIN pg_catalog.pg_attribute la ON la.attrelid = con.conrelid AND la.attnum = k.local_attnum \
                 JOIN pg_catalog.pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.remote_attnum \
                 WHERE con.contype = 'f' AND tc.relname = '{table}' \
                 AND pg_catalog.pg_table_is_visible(tc.oid) \
                 ORDER BY con.conname, k.ord"
            ),
            definition: None,
        }
    }

    /// Postgres reports GIN indexes by access method; those built by this
    /// grammar are full-text indexes.
    fn describe_table(&self, table: &str, rows: &CatalogRows) -> Result<IntrospectedTable> {
        let mut described = IntrospectedTable::from_catalog(table, rows)?;
        let gin: Vec<String> = rows
            .indexes
            .iter()
            .filter(|row| row.get("index_type").is_some_and(|t| t.eq_ignore_ascii_case("gin")))
            .filter_map(|row| row.get("name").map(ToString::to_string))
            .collect();
        for index in &mut described.indexes {
            if gin.contains(&index.name) {
                index.kind = IndexKind::Fulltext;
            }
        }
        Ok(described)
    }
}
