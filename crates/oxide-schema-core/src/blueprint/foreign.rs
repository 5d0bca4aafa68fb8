//! Foreign key definitions.

use super::index::normalize_name;
use super::{Blueprint, Operation};
use crate::error::{Result, SchemaError};
use crate::introspect::ForeignKeyMeta;

/// Foreign key referential action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ForeignKeyAction {
    /// No action.
    NoAction,
    /// Restrict deletion/update.
    Restrict,
    /// Cascade the operation.
    Cascade,
    /// Set to NULL.
    SetNull,
    /// Set to default value.
    SetDefault,
}

impl ForeignKeyAction {
    /// Returns the SQL representation of the action.
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parses the action names reported by database catalogs.
    #[must_use]
    pub fn from_sql(action: &str) -> Option<Self> {
        match action.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "NO ACTION" => Some(Self::NoAction),
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }
}

/// A foreign key declared on a blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    /// Explicit constraint name, if any.
    pub name: Option<String>,
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub referenced_table: Option<String>,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// Action on delete.
    pub on_delete: Option<ForeignKeyAction>,
    /// Action on update.
    pub on_update: Option<ForeignKeyAction>,
}

impl ForeignKeyDefinition {
    /// Creates a foreign key over `columns` with no target yet.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            referenced_table: None,
            referenced_columns: Vec::new(),
            on_delete: None,
            on_update: None,
        }
    }

    /// Returns the explicit name or `<table>_<columns>_foreign`.
    #[must_use]
    pub fn resolved_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| default_foreign_name(table, &self.columns))
    }

    /// Resolves the name and checks that the target is complete.
    pub fn resolve(&self, table: &str) -> Result<ForeignKeyMeta> {
        let name = self.resolved_name(table);
        let referenced_table = self.referenced_table.clone().ok_or_else(|| {
            SchemaError::InvalidDefinition(format!(
                "foreign key '{name}' does not name a referenced table"
            ))
        })?;
        if self.columns.is_empty() || self.referenced_columns.len() != self.columns.len() {
            return Err(SchemaError::InvalidDefinition(format!(
                "foreign key '{name}' must reference as many columns as it holds"
            )));
        }
        Ok(ForeignKeyMeta {
            name,
            columns: self.columns.clone(),
            referenced_table,
            referenced_columns: self.referenced_columns.clone(),
            on_delete: self.on_delete,
            on_update: self.on_update,
        })
    }
}

/// Derives the default foreign key name for `columns` on `table`.
#[must_use]
pub fn default_foreign_name(table: &str, columns: &[String]) -> String {
    normalize_name(&format!("{}_{}_foreign", table, columns.join("_")))
}

/// Handle to a foreign key operation on a [`Blueprint`].
#[derive(Debug)]
pub struct ForeignHandle<'a> {
    blueprint: &'a mut Blueprint,
    position: usize,
}

impl<'a> ForeignHandle<'a> {
    pub(crate) fn new(blueprint: &'a mut Blueprint, position: usize) -> Self {
        Self {
            blueprint,
            position,
        }
    }

    fn update(self, apply: impl FnOnce(&mut ForeignKeyDefinition)) -> Self {
        if let Some(Operation::AddForeignKey(foreign)) =
            self.blueprint.operations.get_mut(self.position)
        {
            apply(foreign);
        }
        self
    }

    /// Sets the referenced column.
    pub fn references(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.update(|f| f.referenced_columns = vec![column])
    }

    /// Sets several referenced columns.
    pub fn references_columns(self, columns: &[&str]) -> Self {
        let columns = columns.iter().map(ToString::to_string).collect();
        self.update(|f| f.referenced_columns = columns)
    }

    /// Sets the referenced table.
    pub fn on(self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.update(|f| f.referenced_table = Some(table))
    }

    /// Sets the ON DELETE action.
    pub fn on_delete(self, action: ForeignKeyAction) -> Self {
        self.update(|f| f.on_delete = Some(action))
    }

    /// Sets the ON UPDATE action.
    pub fn on_update(self, action: ForeignKeyAction) -> Self {
        self.update(|f| f.on_update = Some(action))
    }

    /// Overrides the derived constraint name.
    pub fn name(self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.update(|f| f.name = Some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip_through_catalog_names() {
        assert_eq!(ForeignKeyAction::from_sql("CASCADE"), Some(ForeignKeyAction::Cascade));
        assert_eq!(ForeignKeyAction::from_sql("set null"), Some(ForeignKeyAction::SetNull));
        assert_eq!(ForeignKeyAction::from_sql("NO_ACTION"), Some(ForeignKeyAction::NoAction));
        assert_eq!(ForeignKeyAction::from_sql("SIMPLE"), None);
        assert_eq!(ForeignKeyAction::SetDefault.as_sql(), "SET DEFAULT");
    }

    #[test]
    fn test_default_foreign_name() {
        let columns = vec!["user_id".to_string()];
        assert_eq!(default_foreign_name("posts", &columns), "posts_user_id_foreign");
    }

    #[test]
    fn test_handle_fills_in_target() {
        let mut table = Blueprint::new("posts");
        table
            .foreign("user_id")
            .references("id")
            .on("users")
            .on_delete(ForeignKeyAction::Cascade);

        let Operation::AddForeignKey(foreign) = &table.operations()[0] else {
            panic!("expected a foreign key");
        };
        assert_eq!(foreign.referenced_table.as_deref(), Some("users"));
        assert_eq!(foreign.referenced_columns, vec!["id".to_string()]);
        assert_eq!(foreign.on_delete, Some(ForeignKeyAction::Cascade));
        assert_eq!(foreign.on_update, None);
        assert_eq!(foreign.resolved_name("posts"), "posts_user_id_foreign");
    }

    #[test]
    fn test_resolve_requires_target() {
        let mut table = Blueprint::new("posts");
        table.foreign("user_id").references("id");
        let Operation::AddForeignKey(foreign) = &table.operations()[0] else {
            panic!("expected a foreign key");
        };
        assert!(matches!(
            foreign.resolve("posts"),
            Err(SchemaError::InvalidDefinition(_))
        ));

        let mut table = Blueprint::new("friends");
        table.foreign_columns(&["user_id", "friend_id"]).references("id").on("users");
        let Operation::AddForeignKey(foreign) = &table.operations()[0] else {
            panic!("expected a foreign key");
        };
        assert!(foreign.resolve("friends").is_err());
    }
}
