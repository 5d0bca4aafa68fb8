//! Table blueprints.
//!
//! A [`Blueprint`] collects the operations declared for one table, in
//! declaration order. Declaration methods append exactly one operation (or a
//! fixed group of them for sugar such as [`Blueprint::morphs`]) and return a
//! handle whose modifiers update that pending operation in place.
//!
//! ```rust
//! use oxide_schema_core::blueprint::{Blueprint, Operation};
//!
//! let mut table = Blueprint::create("posts");
//! table.increments("id");
//! table.unsigned_integer("user_id");
//! table.string("name").unique();
//! table.foreign("user_id").references("id").on("users");
//!
//! assert!(matches!(table.operations()[0], Operation::AddColumn(_)));
//! assert_eq!(table.operations().len(), 6);
//! ```

mod column;
mod foreign;
mod index;

pub use column::{quote_literal, ColumnDefinition, ColumnHandle, ColumnType, DefaultValue};
pub use foreign::{default_foreign_name, ForeignHandle, ForeignKeyAction, ForeignKeyDefinition};
pub use index::{default_index_name, IndexDefinition, IndexHandle, IndexKind};

/// A single pending schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Add a column.
    AddColumn(ColumnDefinition),
    /// Drop a column.
    DropColumn(String),
    /// Rename a column.
    RenameColumn {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
    /// Redefine an existing column.
    ChangeColumn(ColumnDefinition),
    /// Add an index or primary key.
    AddIndex(IndexDefinition),
    /// Drop an index or primary key.
    DropIndex {
        /// Index or constraint name.
        name: String,
        /// Kind of index being dropped.
        kind: IndexKind,
    },
    /// Add a foreign key.
    AddForeignKey(ForeignKeyDefinition),
    /// Drop a foreign key by name.
    DropForeignKey(String),
}

impl Operation {
    /// Short description used in log lines and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::AddColumn(c) => format!("add column '{}'", c.name),
            Self::DropColumn(name) => format!("drop column '{name}'"),
            Self::RenameColumn { from, to } => format!("rename column '{from}' to '{to}'"),
            Self::ChangeColumn(c) => format!("change column '{}'", c.name),
            Self::AddIndex(i) => format!("add {} index on ({})", i.kind.suffix(), i.columns.join(", ")),
            Self::DropIndex { name, kind } => format!("drop {} index '{name}'", kind.suffix()),
            Self::AddForeignKey(f) => format!("add foreign key on ({})", f.columns.join(", ")),
            Self::DropForeignKey(name) => format!("drop foreign key '{name}'"),
        }
    }
}

/// Table-level hints applied when creating a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Storage engine (MySQL).
    pub engine: Option<String>,
    /// Default character set (MySQL).
    pub charset: Option<String>,
    /// Default collation (MySQL).
    pub collation: Option<String>,
    /// Create a temporary table.
    pub temporary: bool,
}

/// Ordered collection of operations scoped to one table.
#[derive(Debug, Clone, PartialEq)]
pub struct Blueprint {
    table: String,
    creating: bool,
    options: TableOptions,
    pub(crate) operations: Vec<Operation>,
}

impl Blueprint {
    /// Starts a blueprint that alters an existing table.
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            creating: false,
            options: TableOptions::default(),
            operations: Vec::new(),
        }
    }

    /// Starts a blueprint that creates a new table.
    #[must_use]
    pub fn create(table: impl Into<String>) -> Self {
        Self {
            creating: true,
            ..Self::new(table)
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns true when the blueprint creates its table.
    #[must_use]
    pub const fn is_creating(&self) -> bool {
        self.creating
    }

    /// Returns the declared operations in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Returns the table-level hints.
    #[must_use]
    pub const fn options(&self) -> &TableOptions {
        &self.options
    }

    pub(crate) fn push(&mut self, operation: Operation) -> usize {
        self.operations.push(operation);
        self.operations.len() - 1
    }

    // =========================================================================
    // Table options
    // =========================================================================

    /// Sets the storage engine.
    pub fn engine(&mut self, engine: impl Into<String>) -> &mut Self {
        self.options.engine = Some(engine.into());
        self
    }

    /// Sets the default character set.
    pub fn charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.options.charset = Some(charset.into());
        self
    }

    /// Sets the default collation.
    pub fn collation(&mut self, collation: impl Into<String>) -> &mut Self {
        self.options.collation = Some(collation.into());
        self
    }

    /// Creates the table as a temporary table.
    pub fn temporary(&mut self) -> &mut Self {
        self.options.temporary = true;
        self
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Adds a column of any type.
    pub fn column(&mut self, name: impl Into<String>, column_type: ColumnType) -> ColumnHandle<'_> {
        let position = self.push(Operation::AddColumn(ColumnDefinition::new(name, column_type)));
        ColumnHandle::new(self, position)
    }

    fn auto_increments(&mut self, name: impl Into<String>, column_type: ColumnType) -> ColumnHandle<'_> {
        let name = name.into();
        let mut column = ColumnDefinition::new(name.clone(), column_type);
        column.unsigned = true;
        column.autoincrement = true;
        column.primary = true;
        let position = self.push(Operation::AddColumn(column));
        let mut primary = IndexDefinition::new(IndexKind::Primary, vec![name]);
        primary.inline = true;
        self.push(Operation::AddIndex(primary));
        ColumnHandle::new(self, position)
    }

    /// Adds an auto-incrementing unsigned integer primary key.
    pub fn increments(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.auto_increments(name, ColumnType::Integer)
    }

    /// Adds an auto-incrementing unsigned big integer primary key.
    pub fn big_increments(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.auto_increments(name, ColumnType::BigInteger)
    }

    /// Adds a TINYINT equivalent column.
    pub fn tiny_integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::TinyInteger)
    }

    /// Adds a SMALLINT equivalent column.
    pub fn small_integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::SmallInteger)
    }

    /// Adds a MEDIUMINT equivalent column.
    pub fn medium_integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::MediumInteger)
    }

    /// Adds an INTEGER column.
    pub fn integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Integer)
    }

    /// Adds a BIGINT column.
    pub fn big_integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::BigInteger)
    }

    /// Adds an unsigned INTEGER column.
    pub fn unsigned_integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.integer(name).unsigned()
    }

    /// Adds an unsigned BIGINT column.
    pub fn unsigned_big_integer(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.big_integer(name).unsigned()
    }

    /// Adds a FLOAT column.
    pub fn float(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Float)
    }

    /// Adds a DOUBLE column.
    pub fn double(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Double)
    }

    /// Adds a DECIMAL column.
    pub fn decimal(&mut self, name: impl Into<String>, total: u8, places: u8) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Decimal { total, places })
    }

    /// Adds a BOOLEAN column.
    pub fn boolean(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Boolean)
    }

    /// Adds a CHAR column.
    pub fn char(&mut self, name: impl Into<String>, length: u32) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Char(length))
    }

    /// Adds a VARCHAR column of length 255; use [`ColumnHandle::length`] to change it.
    pub fn string(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::String(255))
    }

    /// Adds a TEXT column.
    pub fn text(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Text)
    }

    /// Adds a MEDIUMTEXT column.
    pub fn medium_text(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::MediumText)
    }

    /// Adds a LONGTEXT column.
    pub fn long_text(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::LongText)
    }

    /// Adds an ENUM column restricted to `values`.
    pub fn enumeration(&mut self, name: impl Into<String>, values: &[&str]) -> ColumnHandle<'_> {
        let values = values.iter().map(ToString::to_string).collect();
        self.column(name, ColumnType::Enum(values))
    }

    /// Adds a JSON column.
    pub fn json(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Json)
    }

    /// Adds a DATE column.
    pub fn date(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Date)
    }

    /// Adds a DATETIME column.
    pub fn datetime(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::DateTime)
    }

    /// Adds a TIME column.
    pub fn time(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Time)
    }

    /// Adds a TIMESTAMP column.
    pub fn timestamp(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Timestamp)
    }

    /// Adds a binary column.
    pub fn binary(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Binary)
    }

    /// Adds a UUID column.
    pub fn uuid(&mut self, name: impl Into<String>) -> ColumnHandle<'_> {
        self.column(name, ColumnType::Uuid)
    }

    /// Adds `created_at` and `updated_at`.
    ///
    /// With `use_current` both are NOT NULL and default to the current
    /// timestamp; otherwise both are nullable.
    pub fn timestamps(&mut self, use_current: bool) {
        for name in ["created_at", "updated_at"] {
            let column = self.timestamp(name);
            if use_current {
                column.use_current();
            } else {
                column.nullable();
            }
        }
    }

    /// Adds nullable `created_at` and `updated_at`.
    pub fn nullable_timestamps(&mut self) {
        self.timestamps(false);
    }

    /// Adds a nullable `deleted_at` timestamp.
    pub fn soft_deletes(&mut self) -> ColumnHandle<'_> {
        self.timestamp("deleted_at").nullable()
    }

    /// Adds `<name>_id` and `<name>_type` for a polymorphic relation, plus
    /// an index over both.
    pub fn morphs(&mut self, name: &str) {
        let id = format!("{name}_id");
        let kind = format!("{name}_type");
        self.unsigned_integer(id.as_str());
        self.string(kind.as_str());
        self.index(&[id.as_str(), kind.as_str()]);
    }

    /// Drops a column.
    pub fn drop_column(&mut self, name: impl Into<String>) {
        self.push(Operation::DropColumn(name.into()));
    }

    /// Drops several columns.
    pub fn drop_columns(&mut self, names: &[&str]) {
        for name in names {
            self.drop_column(*name);
        }
    }

    /// Drops `created_at` and `updated_at`.
    pub fn drop_timestamps(&mut self) {
        self.drop_columns(&["created_at", "updated_at"]);
    }

    /// Drops `deleted_at`.
    pub fn drop_soft_deletes(&mut self) {
        self.drop_column("deleted_at");
    }

    /// Renames a column.
    pub fn rename_column(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.push(Operation::RenameColumn {
            from: from.into(),
            to: to.into(),
        });
    }

    // =========================================================================
    // Indexes
    // =========================================================================

    fn add_index(&mut self, kind: IndexKind, columns: &[&str]) -> IndexHandle<'_> {
        let columns = columns.iter().map(ToString::to_string).collect();
        let position = self.push(Operation::AddIndex(IndexDefinition::new(kind, columns)));
        IndexHandle::new(self, position)
    }

    /// Declares the primary key, replacing any primary key implied by
    /// [`Blueprint::increments`].
    pub fn primary(&mut self, columns: &[&str]) -> IndexHandle<'_> {
        self.operations.retain(|op| {
            !matches!(op, Operation::AddIndex(index) if index.inline && index.kind == IndexKind::Primary)
        });
        for op in &mut self.operations {
            if let Operation::AddColumn(column) = op {
                column.primary = false;
            }
        }
        self.add_index(IndexKind::Primary, columns)
    }

    /// Adds a unique index.
    pub fn unique(&mut self, columns: &[&str]) -> IndexHandle<'_> {
        self.add_index(IndexKind::Unique, columns)
    }

    /// Adds a plain index.
    pub fn index(&mut self, columns: &[&str]) -> IndexHandle<'_> {
        self.add_index(IndexKind::Index, columns)
    }

    /// Adds a full-text index.
    pub fn fulltext(&mut self, columns: &[&str]) -> IndexHandle<'_> {
        self.add_index(IndexKind::Fulltext, columns)
    }

    /// Drops the primary key.
    pub fn drop_primary(&mut self) {
        let name = format!("{}_pkey", self.table);
        self.push(Operation::DropIndex {
            name,
            kind: IndexKind::Primary,
        });
    }

    /// Drops a unique index by name.
    pub fn drop_unique(&mut self, name: impl Into<String>) {
        self.push(Operation::DropIndex {
            name: name.into(),
            kind: IndexKind::Unique,
        });
    }

    /// Drops a plain index by name.
    pub fn drop_index(&mut self, name: impl Into<String>) {
        self.push(Operation::DropIndex {
            name: name.into(),
            kind: IndexKind::Index,
        });
    }

    /// Drops a full-text index by name.
    pub fn drop_fulltext(&mut self, name: impl Into<String>) {
        self.push(Operation::DropIndex {
            name: name.into(),
            kind: IndexKind::Fulltext,
        });
    }

    // =========================================================================
    // Foreign keys
    // =========================================================================

    /// Adds a foreign key on one column.
    pub fn foreign(&mut self, column: impl Into<String>) -> ForeignHandle<'_> {
        let position = self.push(Operation::AddForeignKey(ForeignKeyDefinition::new(vec![
            column.into(),
        ])));
        ForeignHandle::new(self, position)
    }

    /// Adds a composite foreign key.
    pub fn foreign_columns(&mut self, columns: &[&str]) -> ForeignHandle<'_> {
        let columns = columns.iter().map(ToString::to_string).collect();
        let position = self.push(Operation::AddForeignKey(ForeignKeyDefinition::new(columns)));
        ForeignHandle::new(self, position)
    }

    /// Drops a foreign key by name.
    pub fn drop_foreign(&mut self, name: impl Into<String>) {
        self.push(Operation::DropForeignKey(name.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_adds_column_and_inline_primary() {
        let mut table = Blueprint::create("users");
        table.increments("id");

        assert_eq!(table.operations().len(), 2);
        let Operation::AddColumn(id) = &table.operations()[0] else {
            panic!("expected an added column");
        };
        assert_eq!(id.column_type, ColumnType::Integer);
        assert!(id.autoincrement);
        assert!(id.primary);
        assert!(id.unsigned);
        let Operation::AddIndex(primary) = &table.operations()[1] else {
            panic!("expected a primary index");
        };
        assert_eq!(primary.kind, IndexKind::Primary);
        assert!(primary.inline);
    }

    #[test]
    fn test_explicit_primary_overrides_increments() {
        let mut table = Blueprint::create("users");
        table.increments("id");
        table.string("email");
        table.primary(&["id", "email"]);

        let primaries: Vec<&IndexDefinition> = table
            .operations()
            .iter()
            .filter_map(|op| match op {
                Operation::AddIndex(index) if index.kind == IndexKind::Primary => Some(index),
                _ => None,
            })
            .collect();
        assert_eq!(primaries.len(), 1);
        assert!(!primaries[0].inline);
        assert_eq!(primaries[0].columns, vec!["id".to_string(), "email".to_string()]);
        let Operation::AddColumn(id) = &table.operations()[0] else {
            panic!("expected an added column");
        };
        assert!(!id.primary);
        assert!(id.autoincrement);
    }

    #[test]
    fn test_timestamps_use_current() {
        let mut table = Blueprint::create("users");
        table.timestamps(true);

        let names: Vec<&str> = table
            .operations()
            .iter()
            .filter_map(|op| match op {
                Operation::AddColumn(c) => {
                    assert_eq!(c.default, Some(DefaultValue::CurrentTimestamp));
                    assert!(!c.is_nullable());
                    Some(c.name.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["created_at", "updated_at"]);
    }

    #[test]
    fn test_nullable_timestamps() {
        let mut table = Blueprint::create("users");
        table.nullable_timestamps();
        assert!(table.operations().iter().all(|op| matches!(
            op,
            Operation::AddColumn(c) if c.is_nullable() && c.default.is_none()
        )));
    }

    #[test]
    fn test_morphs_adds_pair_and_index() {
        let mut table = Blueprint::create("photos");
        table.morphs("imageable");

        assert_eq!(table.operations().len(), 3);
        let Operation::AddColumn(id) = &table.operations()[0] else {
            panic!("expected an added column");
        };
        assert_eq!(id.name, "imageable_id");
        assert!(id.unsigned);
        let Operation::AddColumn(kind) = &table.operations()[1] else {
            panic!("expected an added column");
        };
        assert_eq!(kind.name, "imageable_type");
        assert_eq!(kind.column_type, ColumnType::String(255));
        let Operation::AddIndex(index) = &table.operations()[2] else {
            panic!("expected an index");
        };
        assert_eq!(
            index.resolved_name("photos"),
            "photos_imageable_id_imageable_type_index"
        );
    }

    #[test]
    fn test_drop_helpers() {
        let mut table = Blueprint::new("posts");
        table.drop_timestamps();
        table.drop_soft_deletes();
        table.drop_foreign("posts_user_id_foreign");
        table.drop_primary();

        assert_eq!(
            table.operations(),
            &[
                Operation::DropColumn("created_at".into()),
                Operation::DropColumn("updated_at".into()),
                Operation::DropColumn("deleted_at".into()),
                Operation::DropForeignKey("posts_user_id_foreign".into()),
                Operation::DropIndex {
                    name: "posts_pkey".into(),
                    kind: IndexKind::Primary
                },
            ]
        );
    }

    #[test]
    fn test_table_options() {
        let mut table = Blueprint::create("users");
        table.engine("InnoDB").charset("utf8mb4").temporary();

        assert_eq!(table.options().engine.as_deref(), Some("InnoDB"));
        assert_eq!(table.options().charset.as_deref(), Some("utf8mb4"));
        assert!(table.options().temporary);
        assert!(table.is_creating());
    }
}
