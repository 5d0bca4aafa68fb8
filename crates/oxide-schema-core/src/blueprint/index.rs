//! Index definitions and their naming rules.

use super::{Blueprint, Operation};

/// Kind of index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum IndexKind {
    /// Primary key.
    Primary,
    /// Unique index.
    Unique,
    /// Plain index.
    Index,
    /// Full-text index.
    Fulltext,
}

impl IndexKind {
    /// Suffix used by the default naming scheme.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Unique => "unique",
            Self::Index => "index",
            Self::Fulltext => "fulltext",
        }
    }
}

/// An index declared on a blueprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Explicit name, if any.
    pub name: Option<String>,
    /// Indexed columns, in order.
    pub columns: Vec<String>,
    /// Index kind.
    pub kind: IndexKind,
    /// Primary key already carried by a column definition (`increments`).
    pub inline: bool,
}

impl IndexDefinition {
    /// Creates an unnamed index.
    #[must_use]
    pub fn new(kind: IndexKind, columns: Vec<String>) -> Self {
        Self {
            name: None,
            columns,
            kind,
            inline: false,
        }
    }

    /// Returns the explicit name or the derived default for `table`.
    #[must_use]
    pub fn resolved_name(&self, table: &str) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| default_index_name(table, &self.columns, self.kind))
    }
}

/// Derives `<table>_<columns>_<kind>`, lower-cased, with `-` and `.`
/// replaced by `_`.
#[must_use]
pub fn default_index_name(table: &str, columns: &[String], kind: IndexKind) -> String {
    normalize_name(&format!("{}_{}_{}", table, columns.join("_"), kind.suffix()))
}

pub(crate) fn normalize_name(raw: &str) -> String {
    raw.to_lowercase().replace(['-', '.'], "_")
}

/// Handle to an index operation on a [`Blueprint`].
#[derive(Debug)]
pub struct IndexHandle<'a> {
    blueprint: &'a mut Blueprint,
    position: usize,
}

impl<'a> IndexHandle<'a> {
    pub(crate) fn new(blueprint: &'a mut Blueprint, position: usize) -> Self {
        Self {
            blueprint,
            position,
        }
    }

    /// Overrides the derived index name.
    pub fn name(self, name: impl Into<String>) -> Self {
        if let Some(Operation::AddIndex(index)) = self.blueprint.operations.get_mut(self.position)
        {
            index.name = Some(name.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_index_names() {
        let columns = vec!["email".to_string()];
        assert_eq!(
            default_index_name("users", &columns, IndexKind::Unique),
            "users_email_unique"
        );
        let columns = vec!["imageable_id".to_string(), "imageable_type".to_string()];
        assert_eq!(
            default_index_name("photos", &columns, IndexKind::Index),
            "photos_imageable_id_imageable_type_index"
        );
    }

    #[test]
    fn test_default_name_is_normalized() {
        let columns = vec!["Post-Id".to_string()];
        assert_eq!(
            default_index_name("blog.Posts", &columns, IndexKind::Primary),
            "blog_posts_post_id_primary"
        );
    }

    #[test]
    fn test_explicit_name_wins() {
        let mut table = Blueprint::new("users");
        table.index(&["email", "votes"]).name("by_email");

        let Operation::AddIndex(index) = &table.operations()[0] else {
            panic!("expected an index");
        };
        assert_eq!(index.resolved_name("users"), "by_email");
    }
}
