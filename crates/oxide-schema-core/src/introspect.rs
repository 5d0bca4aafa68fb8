//! Introspected table state and catalog row parsing.
//!
//! Every dialect projects its catalog into the same column aliases, with all
//! values rendered as text, so one row shape serves every backend:
//!
//! - columns: `name`, `data_type`, `nullable`, `default_value`,
//!   `primary_position`, `autoincrement`, `unsigned`
//! - indexes: `name`, `column_name`, `position`, `is_unique`, `is_primary`,
//!   `index_type`
//! - foreign keys: `name`, `column_name`, `position`, `referenced_table`,
//!   `referenced_column`, `on_delete`, `on_update`

use std::collections::BTreeMap;

use crate::blueprint::{ForeignKeyAction, IndexKind};
use crate::error::{Result, SchemaError};

/// One catalog row, keyed by column alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRow(BTreeMap<String, Option<String>>);

impl CatalogRow {
    /// Creates a row from `(alias, value)` pairs.
    pub fn new<K, I>(values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<String>)>,
    {
        Self(values.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns the value of `alias`, treating SQL NULL as absent.
    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.0.get(alias).and_then(|v| v.as_deref())
    }

    /// Returns the value of `alias` or a catalog error.
    pub fn require(&self, alias: &str) -> Result<&str> {
        self.get(alias)
            .ok_or_else(|| SchemaError::Catalog(format!("missing field '{alias}'")))
    }

    /// Interprets `alias` as a boolean flag.
    #[must_use]
    pub fn flag(&self, alias: &str) -> bool {
        self.get(alias).is_some_and(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "t" | "true" | "yes" | "y"
            )
        })
    }

    /// Interprets `alias` as an unsigned number, defaulting to zero.
    pub fn number(&self, alias: &str) -> Result<u32> {
        match self.get(alias) {
            None => Ok(0),
            Some(v) => v.trim().parse().map_err(|_| {
                SchemaError::Catalog(format!("field '{alias}' is not a number: '{v}'"))
            }),
        }
    }
}

/// Catalog queries for one table, in a specific dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQueries {
    /// Returns one row if the table exists.
    pub table_exists: String,
    /// Column rows.
    pub columns: String,
    /// Index rows, one per indexed column.
    pub indexes: String,
    /// Foreign key rows, one per referencing column.
    pub foreign_keys: String,
    /// Stored table definition, when the catalog keeps one (`sql` alias).
    pub definition: Option<String>,
}

/// Raw results of running [`CatalogQueries`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRows {
    /// Rows of the column query.
    pub columns: Vec<CatalogRow>,
    /// Rows of the index query.
    pub indexes: Vec<CatalogRow>,
    /// Rows of the foreign key query.
    pub foreign_keys: Vec<CatalogRow>,
    /// Stored table definition, if any.
    pub definition: Option<String>,
}

/// A live column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnMeta {
    /// Column name.
    pub name: String,
    /// Declared type as reported by the catalog.
    pub data_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default expression, re-emittable in the same dialect.
    pub default: Option<String>,
    /// Position in the primary key (1-based), 0 when not part of it.
    pub primary_key: u32,
    /// Whether the column auto-increments.
    pub autoincrement: bool,
    /// Whether the column is an unsigned integer.
    pub unsigned: bool,
}

impl ColumnMeta {
    /// Returns the default with SQL quoting, parentheses and casts removed.
    ///
    /// `'0'::character varying` and `((0))` both yield `0`.
    #[must_use]
    pub fn default_literal(&self) -> Option<String> {
        self.default.as_deref().map(strip_default)
    }
}

fn strip_default(raw: &str) -> String {
    let mut value = raw.trim();
    while value.len() >= 2 && value.starts_with('(') && value.ends_with(')') {
        value = value[1..value.len() - 1].trim();
    }
    if value.starts_with('\'') {
        if let Some(end) = value.rfind('\'') {
            if end > 0 {
                return value[1..end].replace("''", "'");
            }
        }
    }
    match value.find("::") {
        Some(cast) => value[..cast].to_string(),
        None => value.to_string(),
    }
}

/// A live index.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexMeta {
    /// Index name.
    pub name: String,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Index kind.
    pub kind: IndexKind,
}

/// A live foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForeignKeyMeta {
    /// Constraint name.
    pub name: String,
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update.
    pub on_update: Option<ForeignKeyAction>,
}

/// Read-only snapshot of a live table.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntrospectedTable {
    /// Table name.
    pub name: String,
    /// Columns in catalog order.
    pub columns: Vec<ColumnMeta>,
    /// Indexes, including the primary key when the catalog reports one.
    pub indexes: Vec<IndexMeta>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKeyMeta>,
}

impl IntrospectedTable {
    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Looks up an index by name.
    #[must_use]
    pub fn index(&self, name: &str) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Looks up a foreign key by name.
    #[must_use]
    pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeyMeta> {
        self.foreign_keys.iter().find(|f| f.name == name)
    }

    /// Returns the primary key index, if any.
    #[must_use]
    pub fn primary_key(&self) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Returns the column names in catalog order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Builds a snapshot from catalog rows in the shared alias layout.
    pub fn from_catalog(name: &str, rows: &CatalogRows) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            columns: parse_columns(&rows.columns)?,
            indexes: parse_indexes(&rows.indexes)?,
            foreign_keys: parse_foreign_keys(&rows.foreign_keys)?,
        })
    }
}

/// Parses column rows.
pub fn parse_columns(rows: &[CatalogRow]) -> Result<Vec<ColumnMeta>> {
    rows.iter()
        .map(|row| {
            Ok(ColumnMeta {
                name: row.require("name")?.to_string(),
                data_type: row.get("data_type").unwrap_or_default().to_string(),
                nullable: row.flag("nullable"),
                default: row.get("default_value").map(ToString::to_string),
                primary_key: row.number("primary_position")?,
                autoincrement: row.flag("autoincrement"),
                unsigned: row.flag("unsigned"),
            })
        })
        .collect()
}

/// Parses index rows, grouping them by index name.
pub fn parse_indexes(rows: &[CatalogRow]) -> Result<Vec<IndexMeta>> {
    let mut grouped: Vec<(IndexMeta, Vec<(u32, String)>)> = Vec::new();
    for row in rows {
        let name = row.require("name")?;
        let column = row.require("column_name")?.to_string();
        let position = row.number("position")?;
        if let Some((_, columns)) = grouped.iter_mut().find(|(index, _)| index.name == name) {
            columns.push((position, column));
            continue;
        }
        let kind = if row.flag("is_primary") {
            IndexKind::Primary
        } else if row.flag("is_unique") {
            IndexKind::Unique
        } else if row
            .get("index_type")
            .is_some_and(|t| t.eq_ignore_ascii_case("fulltext"))
        {
            IndexKind::Fulltext
        } else {
            IndexKind::Index
        };
        let index = IndexMeta {
            name: name.to_string(),
            columns: Vec::new(),
            kind,
        };
        grouped.push((index, vec![(position, column)]));
    }
    Ok(grouped
        .into_iter()
        .map(|(mut index, mut columns)| {
            columns.sort_by_key(|(position, _)| *position);
            index.columns = columns.into_iter().map(|(_, c)| c).collect();
            index
        })
        .collect())
}

/// Parses foreign key rows, grouping them by constraint name.
pub fn parse_foreign_keys(rows: &[CatalogRow]) -> Result<Vec<ForeignKeyMeta>> {
    let mut grouped: Vec<(ForeignKeyMeta, Vec<(u32, String, String)>)> = Vec::new();
    for row in rows {
        let name = row.require("name")?;
        let column = row.require("column_name")?.to_string();
        let referenced = row.get("referenced_column").unwrap_or_default().to_string();
        let position = row.number("position")?;
        if let Some((_, columns)) = grouped.iter_mut().find(|(fk, _)| fk.name == name) {
            columns.push((position, column, referenced));
            continue;
        }
        let foreign = ForeignKeyMeta {
            name: name.to_string(),
            columns: Vec::new(),
            referenced_table: row.require("referenced_table")?.to_string(),
            referenced_columns: Vec::new(),
            on_delete: row.get("on_delete").and_then(ForeignKeyAction::from_sql),
            on_update: row.get("on_update").and_then(ForeignKeyAction::from_sql),
        };
        grouped.push((foreign, vec![(position, column, referenced)]));
    }
    Ok(grouped
        .into_iter()
        .map(|(mut foreign, mut columns)| {
            columns.sort_by_key(|(position, _, _)| *position);
            for (_, column, referenced) in columns {
                foreign.columns.push(column);
                foreign.referenced_columns.push(referenced);
            }
            foreign
        })
        .collect())
}

/// Escapes a value for use inside a single-quoted catalog query literal.
#[must_use]
pub fn catalog_literal(value: &str) -> String {
    value.replace('\'', "''")
}
