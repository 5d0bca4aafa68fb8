//! Simulated table state.
//!
//! A [`TableState`] starts from the live table (or from nothing, for a
//! create) and replays a blueprint's operations one by one. Replaying checks
//! every reference against the columns, indexes and foreign keys that exist at
//! that point, resolves changed columns against their current definition, and
//! leaves behind the target shape of the table.

use crate::blueprint::{ColumnDefinition, ColumnType, DefaultValue, IndexKind, Operation};
use crate::error::{Result, SchemaError};
use crate::introspect::{ColumnMeta, ForeignKeyMeta, IndexMeta, IntrospectedTable};

/// Where a column's definition comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnShape {
    /// Untouched live column.
    Existing(ColumnMeta),
    /// Column added or redefined by the blueprint.
    Declared(ColumnDefinition),
}

/// A column of the simulated table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnState {
    /// Name of the live column holding this column's data, if any.
    pub source: Option<String>,
    /// Current definition.
    pub shape: ColumnShape,
}

impl ColumnState {
    /// Current column name.
    #[must_use]
    pub fn name(&self) -> &str {
        match &self.shape {
            ColumnShape::Existing(meta) => &meta.name,
            ColumnShape::Declared(column) => &column.name,
        }
    }

    /// Whether NULL is allowed.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        match &self.shape {
            ColumnShape::Existing(meta) => meta.nullable,
            ColumnShape::Declared(column) => column.is_nullable(),
        }
    }

    /// Whether the column auto-increments.
    #[must_use]
    pub fn is_autoincrement(&self) -> bool {
        match &self.shape {
            ColumnShape::Existing(meta) => meta.autoincrement,
            ColumnShape::Declared(column) => column.autoincrement,
        }
    }

    /// Whether the column has a default value.
    #[must_use]
    pub fn has_default(&self) -> bool {
        match &self.shape {
            ColumnShape::Existing(meta) => meta.default.is_some(),
            ColumnShape::Declared(column) => column.default.is_some(),
        }
    }

    fn rename(&mut self, to: &str) {
        match &mut self.shape {
            ColumnShape::Existing(meta) => meta.name = to.to_string(),
            ColumnShape::Declared(column) => column.name = to.to_string(),
        }
    }
}

/// Simulated shape of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableState {
    /// Table name.
    pub name: String,
    /// Columns in table order.
    pub columns: Vec<ColumnState>,
    /// Indexes, including the primary key.
    pub indexes: Vec<IndexMeta>,
    /// Foreign keys.
    pub foreign_keys: Vec<ForeignKeyMeta>,
}

impl TableState {
    /// State of a table that does not exist yet.
    #[must_use]
    pub fn empty(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// State of a live table.
    ///
    /// When the catalog reports primary key columns but no primary index
    /// (SQLite rowid tables), a primary index named `primary` is synthesized.
    #[must_use]
    pub fn from_introspected(table: &IntrospectedTable) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|meta| ColumnState {
                source: Some(meta.name.clone()),
                shape: ColumnShape::Existing(meta.clone()),
            })
            .collect();
        let mut indexes = table.indexes.clone();
        if table.primary_key().is_none() {
            let mut keyed: Vec<&ColumnMeta> =
                table.columns.iter().filter(|c| c.primary_key > 0).collect();
            keyed.sort_by_key(|c| c.primary_key);
            if !keyed.is_empty() {
                indexes.insert(
                    0,
                    IndexMeta {
                        name: "primary".to_string(),
                        columns: keyed.iter().map(|c| c.name.clone()).collect(),
                        kind: IndexKind::Primary,
                    },
                );
            }
        }
        Self {
            name: table.name.clone(),
            columns,
            indexes,
            foreign_keys: table.foreign_keys.clone(),
        }
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnState> {
        self.columns.iter().find(|c| c.name() == name)
    }

    /// Returns the primary key, if any.
    #[must_use]
    pub fn primary(&self) -> Option<&IndexMeta> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    /// Returns true when an index or foreign key covers `column`.
    #[must_use]
    pub fn is_keyed(&self, column: &str) -> bool {
        self.indexes
            .iter()
            .any(|i| i.columns.iter().any(|c| c == column))
            || self
                .foreign_keys
                .iter()
                .any(|f| f.columns.iter().any(|c| c == column))
    }

    fn require_column(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == column)
            .ok_or_else(|| SchemaError::ColumnNotFound {
                table: self.name.clone(),
                column: column.to_string(),
            })
    }

    fn reject_existing(&self, column: &str) -> Result<()> {
        if self.column(column).is_some() {
            return Err(SchemaError::ColumnExists {
                table: self.name.clone(),
                column: column.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_not_held(&self, column: &str) -> Result<()> {
        match self
            .foreign_keys
            .iter()
            .find(|f| f.columns.iter().any(|c| c == column))
        {
            Some(foreign) => Err(SchemaError::ForeignKeyDependency {
                table: self.name.clone(),
                column: column.to_string(),
                constraint: foreign.name.clone(),
            }),
            None => Ok(()),
        }
    }

    fn collision(&self, name: &str) -> SchemaError {
        SchemaError::NameCollision {
            table: self.name.clone(),
            name: name.to_string(),
        }
    }

    fn missing_constraint(&self, name: &str) -> SchemaError {
        SchemaError::ConstraintNotFound {
            table: self.name.clone(),
            name: name.to_string(),
        }
    }

    /// Applies one operation and returns it resolved against this state.
    ///
    /// Changed columns come back with unstated attributes filled in from the
    /// current definition; primary key drops come back with the live name.
    pub fn apply(&mut self, operation: Operation) -> Result<Operation> {
        match operation {
            Operation::AddColumn(column) => {
                self.reject_existing(&column.name)?;
                self.columns.push(ColumnState {
                    source: None,
                    shape: ColumnShape::Declared(column.clone()),
                });
                Ok(Operation::AddColumn(column))
            }
            Operation::DropColumn(name) => {
                let position = self.require_column(&name)?;
                self.ensure_not_held(&name)?;
                self.columns.remove(position);
                self.indexes.retain(|i| !i.columns.contains(&name));
                Ok(Operation::DropColumn(name))
            }
            Operation::RenameColumn { from, to } => {
                let position = self.require_column(&from)?;
                self.reject_existing(&to)?;
                self.ensure_not_held(&from)?;
                self.columns[position].rename(&to);
                for index in &mut self.indexes {
                    for column in &mut index.columns {
                        if *column == from {
                            column.clone_from(&to);
                        }
                    }
                }
                Ok(Operation::RenameColumn { from, to })
            }
            Operation::ChangeColumn(column) => {
                let position = self.require_column(&column.name)?;
                let resolved = resolve_change(&self.columns[position], &column);
                self.columns[position].shape = ColumnShape::Declared(resolved.clone());
                Ok(Operation::ChangeColumn(resolved))
            }
            Operation::AddIndex(index) => {
                for column in &index.columns {
                    self.require_column(column)?;
                }
                let name = index.resolved_name(&self.name);
                if index.kind == IndexKind::Primary {
                    if let Some(existing) = self.primary() {
                        return Err(SchemaError::InvalidDefinition(format!(
                            "table '{}' already has primary key '{}'",
                            self.name, existing.name
                        )));
                    }
                } else if self.indexes.iter().any(|i| i.name == name) {
                    return Err(self.collision(&name));
                }
                self.indexes.push(IndexMeta {
                    name,
                    columns: index.columns.clone(),
                    kind: index.kind,
                });
                Ok(Operation::AddIndex(index))
            }
            Operation::DropIndex { name, kind } => {
                let position = if kind == IndexKind::Primary {
                    self.indexes.iter().position(|i| i.kind == IndexKind::Primary)
                } else {
                    self.indexes
                        .iter()
                        .position(|i| i.name == name && i.kind != IndexKind::Primary)
                };
                let Some(position) = position else {
                    return Err(self.missing_constraint(&name));
                };
                let removed = self.indexes.remove(position);
                Ok(Operation::DropIndex {
                    name: removed.name,
                    kind,
                })
            }
            Operation::AddForeignKey(foreign) => {
                let resolved = foreign.resolve(&self.name)?;
                for column in &resolved.columns {
                    self.require_column(column)?;
                }
                if self.foreign_keys.iter().any(|f| f.name == resolved.name) {
                    return Err(self.collision(&resolved.name));
                }
                self.foreign_keys.push(resolved);
                Ok(Operation::AddForeignKey(foreign))
            }
            Operation::DropForeignKey(name) => {
                let Some(position) = self.foreign_keys.iter().position(|f| f.name == name) else {
                    return Err(self.missing_constraint(&name));
                };
                self.foreign_keys.remove(position);
                Ok(Operation::DropForeignKey(name))
            }
        }
    }
}

/// Fills the unstated attributes of a changed column from its current shape.
///
/// Nullability and default carry over unless restated (or the default is
/// explicitly dropped). A live literal default is retyped for the new column
/// type, so `'0'::character varying` becomes `0` on a BIGINT. Auto-increment
/// and unsigned carry over while the column stays an integer. The result
/// never redeclares the primary key.
#[must_use]
pub fn resolve_change(current: &ColumnState, column: &ColumnDefinition) -> ColumnDefinition {
    let mut resolved = column.clone();
    let integer = column.column_type.is_integer();
    let (nullable, default, autoincrement, unsigned) = match &current.shape {
        ColumnShape::Existing(meta) => (
            Some(meta.nullable),
            inherited_default(meta, &column.column_type),
            meta.autoincrement,
            meta.unsigned,
        ),
        ColumnShape::Declared(previous) => (
            previous.nullable,
            previous.default.clone(),
            previous.autoincrement,
            previous.unsigned,
        ),
    };
    if resolved.nullable.is_none() {
        resolved.nullable = nullable;
    }
    if resolved.default.is_none() && !resolved.drop_default {
        resolved.default = default;
    }
    resolved.autoincrement |= autoincrement && integer;
    resolved.unsigned |= unsigned && integer;
    resolved.primary = false;
    resolved.renamed_from = None;
    resolved
}

/// Rebuilds a live default for `target`.
///
/// Quoted and numeric literals lose their catalog casts and are typed for
/// the new column. Anything else is an expression and is kept verbatim.
fn inherited_default(meta: &ColumnMeta, target: &ColumnType) -> Option<DefaultValue> {
    let raw = meta.default.as_deref()?;
    let bare = raw.trim().trim_start_matches('(').trim_end_matches(')').trim();
    if bare
        .split("::")
        .next()
        .is_some_and(|head| head.trim().eq_ignore_ascii_case("null"))
    {
        return Some(DefaultValue::Null);
    }
    let literal = meta.default_literal()?;
    if !bare.starts_with('\'') && literal.parse::<f64>().is_err() {
        return Some(DefaultValue::Expression(raw.to_string()));
    }
    let typed = match target {
        ColumnType::Boolean => match literal.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" => DefaultValue::Bool(true),
            "0" | "f" | "false" => DefaultValue::Bool(false),
            _ => DefaultValue::String(literal),
        },
        t if t.is_integer() => match literal.parse::<i64>() {
            Ok(value) => DefaultValue::Integer(value),
            Err(_) => DefaultValue::String(literal),
        },
        t if t.is_numeric() => match literal.parse::<f64>() {
            Ok(value) => DefaultValue::Float(value),
            Err(_) => DefaultValue::String(literal),
        },
        _ => DefaultValue::String(literal),
    };
    Some(typed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{Blueprint, ColumnType};

    fn meta(name: &str, data_type: &str, nullable: bool, default: Option<&str>) -> ColumnMeta {
        ColumnMeta {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default: default.map(ToString::to_string),
            primary_key: 0,
            autoincrement: false,
            unsigned: false,
        }
    }

    fn posts() -> IntrospectedTable {
        let mut id = meta("id", "INTEGER", false, None);
        id.primary_key = 1;
        id.autoincrement = true;
        IntrospectedTable {
            name: "posts".into(),
            columns: vec![
                id,
                meta("user_id", "INTEGER", false, None),
                meta("name", "VARCHAR", false, None),
                meta("votes", "INTEGER", false, Some("0")),
            ],
            indexes: vec![IndexMeta {
                name: "posts_name_unique".into(),
                columns: vec!["name".into()],
                kind: IndexKind::Unique,
            }],
            foreign_keys: vec![ForeignKeyMeta {
                name: "posts_user_id_foreign".into(),
                columns: vec!["user_id".into()],
                referenced_table: "users".into(),
                referenced_columns: vec!["id".into()],
                on_delete: None,
                on_update: None,
            }],
        }
    }

    fn replay(state: &mut TableState, blueprint: &Blueprint) -> Result<Vec<Operation>> {
        blueprint
            .operations()
            .iter()
            .cloned()
            .map(|op| state.apply(op))
            .collect()
    }

    #[test]
    fn test_synthesizes_rowid_primary() {
        let state = TableState::from_introspected(&posts());
        let primary = state.primary().unwrap();
        assert_eq!(primary.name, "primary");
        assert_eq!(primary.columns, vec!["id"]);
    }

    #[test]
    fn test_rename_keeps_index_pointing_at_new_name() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.rename_column("name", "title");
        replay(&mut state, &table).unwrap();

        let index = state
            .indexes
            .iter()
            .find(|i| i.name == "posts_name_unique")
            .unwrap();
        assert_eq!(index.columns, vec!["title"]);
        let title = state.column("title").unwrap();
        assert_eq!(title.source.as_deref(), Some("name"));
    }

    #[test]
    fn test_rename_of_foreign_key_column_is_rejected() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.rename_column("user_id", "my_user_id");

        assert_eq!(
            replay(&mut state, &table),
            Err(SchemaError::ForeignKeyDependency {
                table: "posts".into(),
                column: "user_id".into(),
                constraint: "posts_user_id_foreign".into(),
            })
        );
    }

    #[test]
    fn test_drop_of_foreign_key_column_is_rejected() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.drop_column("user_id");
        assert!(matches!(
            replay(&mut state, &table),
            Err(SchemaError::ForeignKeyDependency { .. })
        ));
    }

    #[test]
    fn test_missing_references() {
        let mut table = Blueprint::new("posts");
        table.drop_column("body");
        assert!(matches!(
            replay(&mut TableState::from_introspected(&posts()), &table),
            Err(SchemaError::ColumnNotFound { .. })
        ));

        let mut table = Blueprint::new("posts");
        table.string("name");
        assert!(matches!(
            replay(&mut TableState::from_introspected(&posts()), &table),
            Err(SchemaError::ColumnExists { .. })
        ));

        let mut table = Blueprint::new("posts");
        table.drop_unique("posts_title_unique");
        assert!(matches!(
            replay(&mut TableState::from_introspected(&posts()), &table),
            Err(SchemaError::ConstraintNotFound { .. })
        ));

        let mut table = Blueprint::new("posts");
        table.unique(&["name"]);
        assert!(matches!(
            replay(&mut TableState::from_introspected(&posts()), &table),
            Err(SchemaError::NameCollision { .. })
        ));
    }

    #[test]
    fn test_change_inherits_unstated_attributes() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.big_integer("votes").change();
        let operations = replay(&mut state, &table).unwrap();

        let Operation::ChangeColumn(votes) = &operations[0] else {
            panic!("expected a changed column");
        };
        assert_eq!(votes.column_type, ColumnType::BigInteger);
        assert_eq!(votes.nullable, Some(false));
        assert_eq!(votes.default, Some(DefaultValue::Integer(0)));
    }

    #[test]
    fn test_change_retypes_cast_literal_default() {
        let mut live = posts();
        live.columns[3] = meta("votes", "character varying(255)", false, Some("'0'::character varying"));
        let mut state = TableState::from_introspected(&live);
        let mut table = Blueprint::new("posts");
        table.big_integer("votes").change();
        let operations = replay(&mut state, &table).unwrap();

        let Operation::ChangeColumn(votes) = &operations[0] else {
            panic!("expected a changed column");
        };
        assert_eq!(votes.default, Some(DefaultValue::Integer(0)));
    }

    #[test]
    fn test_change_keeps_expression_default() {
        let mut live = posts();
        live.columns[3] = meta("votes", "timestamp", true, Some("CURRENT_TIMESTAMP"));
        let mut state = TableState::from_introspected(&live);
        let mut table = Blueprint::new("posts");
        table.datetime("votes").change();
        let operations = replay(&mut state, &table).unwrap();

        let Operation::ChangeColumn(votes) = &operations[0] else {
            panic!("expected a changed column");
        };
        assert_eq!(
            votes.default,
            Some(DefaultValue::Expression("CURRENT_TIMESTAMP".into()))
        );
    }

    #[test]
    fn test_change_keeps_autoincrement_but_not_primary() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.big_integer("id").change();
        let operations = replay(&mut state, &table).unwrap();

        let Operation::ChangeColumn(id) = &operations[0] else {
            panic!("expected a changed column");
        };
        assert!(id.autoincrement);
        assert!(!id.primary);
    }

    #[test]
    fn test_drop_default_is_not_inherited() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.integer("votes").drop_default().change();
        let operations = replay(&mut state, &table).unwrap();

        let Operation::ChangeColumn(votes) = &operations[0] else {
            panic!("expected a changed column");
        };
        assert_eq!(votes.default, None);
    }

    #[test]
    fn test_drop_primary_resolves_live_name() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.drop_primary();
        let operations = replay(&mut state, &table).unwrap();

        assert_eq!(
            operations[0],
            Operation::DropIndex {
                name: "primary".into(),
                kind: IndexKind::Primary
            }
        );
        assert!(state.primary().is_none());
    }

    #[test]
    fn test_drop_column_removes_its_indexes() {
        let mut state = TableState::from_introspected(&posts());
        let mut table = Blueprint::new("posts");
        table.drop_column("name");
        replay(&mut state, &table).unwrap();

        assert!(state.column("name").is_none());
        assert!(state.indexes.iter().all(|i| i.name != "posts_name_unique"));
        assert!(!state.is_keyed("name"));
    }
}
