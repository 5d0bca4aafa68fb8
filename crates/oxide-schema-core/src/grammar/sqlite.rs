//! SQLite grammar.
//!
//! SQLite can add, drop and rename columns and create or drop indexes in
//! place. Everything else (changing a column, touching foreign keys or the
//! primary key, adding a column it cannot backfill) goes through the table
//! rebuild in [`super::rebuild`].

use std::sync::OnceLock;

use regex::Regex;

use super::rebuild::rebuild_table;
use super::state::{ColumnShape, ColumnState, TableState};
use super::{compile_operations, CompiledBlueprint, Dialect, Fragment, Grammar, Plan, Step};
use crate::blueprint::{
    default_foreign_name, default_index_name, ColumnDefinition, ColumnType, DefaultValue,
    ForeignKeyAction, ForeignKeyDefinition, IndexDefinition, IndexKind, Operation,
};
use crate::error::{Result, SchemaError};
use crate::introspect::{
    catalog_literal, CatalogQueries, CatalogRows, ColumnMeta, ForeignKeyMeta, IndexMeta,
    IntrospectedTable,
};

/// SQLite DDL grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl SqliteGrammar {
    /// Creates a new SQLite grammar.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn unsupported(operation: impl Into<String>) -> SchemaError {
        SchemaError::Unsupported {
            dialect: Dialect::Sqlite,
            operation: operation.into(),
        }
    }

    /// Renders a declared column, optionally carrying the primary key inline.
    fn declared_column_sql(&self, column: &ColumnDefinition, inline_primary: bool) -> String {
        let mut parts = vec![self.wrap(&column.name), self.type_sql(column)];
        if !column.is_nullable() {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", self.default_sql(default)));
        }
        if inline_primary {
            parts.push("PRIMARY KEY".to_string());
            if column.autoincrement {
                parts.push("AUTOINCREMENT".to_string());
            }
        }
        parts.join(" ")
    }

    /// Renders a live column exactly as the catalog reports it.
    fn existing_column_sql(&self, column: &ColumnMeta, inline_primary: bool) -> String {
        let mut parts = vec![self.wrap(&column.name)];
        if !column.data_type.is_empty() {
            parts.push(column.data_type.clone());
        }
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {default}"));
        }
        if inline_primary {
            parts.push("PRIMARY KEY".to_string());
            if column.autoincrement {
                parts.push("AUTOINCREMENT".to_string());
            }
        }
        parts.join(" ")
    }

    fn state_column_sql(&self, column: &ColumnState, inline_primary: bool) -> String {
        match &column.shape {
            ColumnShape::Existing(meta) => self.existing_column_sql(meta, inline_primary),
            ColumnShape::Declared(definition) => {
                self.declared_column_sql(definition, inline_primary)
            }
        }
    }

    /// Generates `CREATE TABLE` for the given table shape.
    ///
    /// A single auto-incrementing key column keeps its primary key inline
    /// (SQLite only accepts `AUTOINCREMENT` there); any other primary key is
    /// declared at table level. Foreign keys are always declared inline.
    pub(crate) fn create_table_sql(&self, name: &str, state: &TableState, temporary: bool) -> String {
        let primary = state.primary();
        let inline_column = primary
            .filter(|p| p.columns.len() == 1)
            .and_then(|p| state.column(&p.columns[0]))
            .filter(|c| c.is_autoincrement())
            .map(ColumnState::name);

        let mut definitions: Vec<String> = state
            .columns
            .iter()
            .map(|c| self.state_column_sql(c, Some(c.name()) == inline_column))
            .collect();
        if let Some(primary) = primary {
            if inline_column.is_none() {
                definitions.push(format!("PRIMARY KEY ({})", self.columnize(&primary.columns)));
            }
        }
        for foreign in &state.foreign_keys {
            definitions.push(self.foreign_key_sql(&without_no_action(foreign)));
        }

        let mut sql = String::from("CREATE ");
        if temporary {
            sql.push_str("TEMPORARY ");
        }
        sql.push_str("TABLE ");
        sql.push_str(&self.wrap(name));
        sql.push_str(" (");
        sql.push_str(&definitions.join(", "));
        sql.push(')');
        sql
    }

    /// Generates `CREATE INDEX` for every secondary index of `state`.
    ///
    /// Automatic indexes behind inline `UNIQUE` constraints get a derived
    /// name, since the recreated table no longer carries the constraint.
    pub(crate) fn index_statements(&self, table: &str, state: &TableState) -> Vec<String> {
        state
            .indexes
            .iter()
            .filter(|index| index.kind != IndexKind::Primary)
            .map(|index| {
                let name = if index.name.starts_with("sqlite_autoindex_") {
                    default_index_name(table, &index.columns, index.kind)
                } else {
                    index.name.clone()
                };
                self.create_index_sql(table, &name, &index.columns, index.kind == IndexKind::Unique)
            })
            .collect()
    }

    fn create_index_sql(&self, table: &str, name: &str, columns: &[String], unique: bool) -> String {
        let mut sql = String::from("CREATE ");
        if unique {
            sql.push_str("UNIQUE ");
        }
        sql.push_str("INDEX ");
        sql.push_str(&self.wrap(name));
        sql.push_str(" ON ");
        sql.push_str(&self.wrap(table));
        sql.push_str(" (");
        sql.push_str(&self.columnize(columns));
        sql.push(')');
        sql
    }

    /// Returns true when the plan cannot be carried out with native
    /// `ALTER TABLE` statements.
    #[must_use]
    pub fn needs_rebuild(&self, plan: &Plan) -> bool {
        let indexed_later = |column: &str| {
            plan.operations().iter().any(|op| match op {
                Operation::AddIndex(index) => index.columns.iter().any(|c| c == column),
                _ => false,
            })
        };
        plan.operations().iter().any(|op| match op {
            Operation::ChangeColumn(_)
            | Operation::AddForeignKey(_)
            | Operation::DropForeignKey(_) => true,
            Operation::AddIndex(index) => index.kind == IndexKind::Primary,
            Operation::DropIndex { kind, .. } => *kind == IndexKind::Primary,
            Operation::AddColumn(column) => !can_add_in_place(column),
            Operation::DropColumn(name) => {
                plan.before().is_some_and(|before| before.is_keyed(name)) || indexed_later(name)
            }
            Operation::RenameColumn { .. } => false,
        })
    }
}

/// SQLite adds a column in place only when existing rows can take a
/// constant default (or NULL) and no key is involved.
fn can_add_in_place(column: &ColumnDefinition) -> bool {
    if column.primary || column.autoincrement {
        return false;
    }
    match &column.default {
        Some(default) => default.is_constant(),
        None => column.is_nullable(),
    }
}

/// `NO ACTION` is SQLite's default and is left implicit.
fn without_no_action(foreign: &ForeignKeyMeta) -> ForeignKeyMeta {
    let keep = |action: Option<ForeignKeyAction>| action.filter(|a| *a != ForeignKeyAction::NoAction);
    ForeignKeyMeta {
        on_delete: keep(foreign.on_delete),
        on_update: keep(foreign.on_update),
        ..foreign.clone()
    }
}

fn constraint_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)CONSTRAINT\s+["`\[]?(\w+)["`\]]?\s+FOREIGN\s+KEY\s*\(([^)]*)\)"#)
            .expect("valid foreign key pattern")
    })
}

fn autoincrement_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bAUTOINCREMENT\b").expect("valid autoincrement pattern")
    })
}

/// Pulls `(name, columns)` pairs out of the named foreign key constraints in
/// a stored `CREATE TABLE` statement.
fn named_foreign_keys(definition: &str) -> Vec<(String, Vec<String>)> {
    constraint_pattern()
        .captures_iter(definition)
        .map(|captures| {
            let columns = captures[2]
                .split(',')
                .map(|c| c.trim().trim_matches(|ch: char| matches!(ch, '"' | '`' | '[' | ']')).to_string())
                .collect();
            (captures[1].to_string(), columns)
        })
        .collect()
}

impl Grammar for SqliteGrammar {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn type_sql(&self, column: &ColumnDefinition) -> String {
        if column.autoincrement {
            return "INTEGER".to_string();
        }
        match &column.column_type {
            ColumnType::TinyInteger | ColumnType::Boolean => "TINYINT".to_string(),
            ColumnType::SmallInteger => "SMALLINT".to_string(),
            ColumnType::MediumInteger => "MEDIUMINT".to_string(),
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::BigInteger => "BIGINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { .. } => "NUMERIC".to_string(),
            ColumnType::Char(_)
            | ColumnType::String(_)
            | ColumnType::Enum(_)
            | ColumnType::Uuid => "VARCHAR".to_string(),
            ColumnType::Text
            | ColumnType::MediumText
            | ColumnType::LongText
            | ColumnType::Json => "TEXT".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::DateTime | ColumnType::Timestamp => "DATETIME".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::Binary => "BLOB".to_string(),
        }
    }

    fn default_sql(&self, default: &DefaultValue) -> String {
        match default {
            DefaultValue::Bool(value) => u8::from(*value).to_string(),
            other => other.to_sql(),
        }
    }

    fn column_sql(&self, column: &ColumnDefinition) -> String {
        self.declared_column_sql(column, column.primary && column.autoincrement)
    }

    fn compile_plan(&self, plan: &Plan) -> Result<CompiledBlueprint> {
        if plan.operations().iter().any(|op| {
            matches!(op, Operation::AddIndex(index) if index.kind == IndexKind::Fulltext)
        }) {
            return Err(Self::unsupported("full-text index"));
        }

        let table = plan.table();
        let steps = if plan.is_creating() {
            let after = plan
                .after()
                .ok_or_else(|| Self::unsupported("create table without a simulated shape"))?;
            let mut steps = vec![Step::Statement(self.create_table_sql(
                table,
                after,
                plan.options().temporary,
            ))];
            steps.extend(self.index_statements(table, after).into_iter().map(Step::Statement));
            steps
        } else if self.needs_rebuild(plan) {
            let after = plan
                .after()
                .ok_or_else(|| Self::unsupported("table rebuild without the live table"))?;
            vec![rebuild_table(self, after)]
        } else {
            compile_operations(self, plan)?
        };

        Ok(CompiledBlueprint {
            table: table.to_string(),
            steps,
        })
    }

    fn compile_change_column(&self, _table: &str, column: &ColumnDefinition) -> Result<Vec<Fragment>> {
        Err(Self::unsupported(format!(
            "change column '{}' outside a table rebuild",
            column.name
        )))
    }

    fn compile_add_index(&self, table: &str, index: &IndexDefinition) -> Result<Vec<Fragment>> {
        match index.kind {
            IndexKind::Primary => Err(Self::unsupported("add primary key outside a table rebuild")),
            IndexKind::Fulltext => Err(Self::unsupported("full-text index")),
            IndexKind::Unique | IndexKind::Index => Ok(vec![Fragment::statement(
                self.create_index_sql(
                    table,
                    &index.resolved_name(table),
                    &index.columns,
                    index.kind == IndexKind::Unique,
                ),
            )]),
        }
    }

    fn compile_drop_index(&self, _table: &str, name: &str, kind: IndexKind) -> Result<Vec<Fragment>> {
        if kind == IndexKind::Primary {
            return Err(Self::unsupported("drop primary key outside a table rebuild"));
        }
        Ok(vec![Fragment::statement(format!("DROP INDEX {}", self.wrap(name)))])
    }

    fn compile_add_foreign(
        &self,
        _table: &str,
        foreign: &ForeignKeyDefinition,
    ) -> Result<Vec<Fragment>> {
        Err(Self::unsupported(format!(
            "add foreign key on ({}) outside a table rebuild",
            foreign.columns.join(", ")
        )))
    }

    fn compile_drop_foreign(&self, _table: &str, name: &str) -> Result<Vec<Fragment>> {
        Err(Self::unsupported(format!(
            "drop foreign key '{name}' outside a table rebuild"
        )))
    }

    fn catalog_queries(&self, table: &str) -> CatalogQueries {
        let table = catalog_literal(table);
        CatalogQueries {
            table_exists: format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '{table}'"
            ),
            columns: format!(
                "SELECT name, type AS data_type, \
                 CASE WHEN \"notnull\" = 0 THEN '1' ELSE '0' END AS nullable, \
                 dflt_value AS default_value, CAST(pk AS TEXT) AS primary_position \
                 FROM pragma_table_info('{table}') ORDER BY cid"
            ),
            indexes: format!(
                "SELECT il.name AS name, ii.name AS column_name, \
                 CAST(ii.seqno + 1 AS TEXT) AS position, \
                 CAST(il.\"unique\" AS TEXT) AS is_unique, \
                 CASE WHEN il.origin = 'pk' THEN '1' ELSE '0' END AS is_primary \
                 FROM pragma_index_list('{table}') AS il, pragma_index_info(il.name) AS ii \
                 ORDER BY il.name, ii.seqno"
            ),
            foreign_keys: format!(
                "SELECT CAST(id AS TEXT) AS name, \"from\" AS column_name, \
                 CAST(seq + 1 AS TEXT) AS position, \"table\" AS referenced_table, \
                 \"to\" AS referenced_column, on_delete, on_update \
                 FROM pragma_foreign_key_list('{table}') ORDER BY id, seq"
            ),
            definition: Some(format!(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = '{table}'"
            )),
        }
    }

    fn describe_table(&self, table: &str, rows: &CatalogRows) -> Result<IntrospectedTable> {
        let mut described = IntrospectedTable::from_catalog(table, rows)?;
        let definition = rows.definition.as_deref().unwrap_or_default();

        let keyed: Vec<usize> = described
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.primary_key > 0)
            .map(|(i, _)| i)
            .collect();
        if keyed.len() == 1 && autoincrement_pattern().is_match(definition) {
            described.columns[keyed[0]].autoincrement = true;
        }

        if described.primary_key().is_none() && !keyed.is_empty() {
            let mut columns: Vec<&ColumnMeta> = keyed.iter().map(|i| &described.columns[*i]).collect();
            columns.sort_by_key(|c| c.primary_key);
            let primary = IndexMeta {
                name: "primary".to_string(),
                columns: columns.iter().map(|c| c.name.clone()).collect(),
                kind: IndexKind::Primary,
            };
            described.indexes.insert(0, primary);
        }

        let named = named_foreign_keys(definition);
        for foreign in &mut described.foreign_keys {
            foreign.name = named
                .iter()
                .find(|(_, columns)| *columns == foreign.columns)
                .map_or_else(|| default_foreign_name(table, &foreign.columns), |(n, _)| n.clone());
        }
        Ok(described)
    }
}
