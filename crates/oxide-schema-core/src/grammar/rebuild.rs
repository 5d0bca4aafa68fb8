//! SQLite table rebuild.
//!
//! SQLite cannot alter a column or its keys in place. The rebuild creates the
//! target shape under a temporary name, copies every surviving row across,
//! and only then drops the original and renames the copy into its place:
//!
//! 1. `PRAGMA foreign_keys = OFF` (outside the transaction, where it has
//!    effect)
//! 2. `CREATE TABLE "__temp__<table>"` with the target shape
//! 3. `INSERT INTO "__temp__<table>" (..) SELECT .. FROM "<table>"`
//! 4. `DROP TABLE "<table>"`
//! 5. `ALTER TABLE "__temp__<table>" RENAME TO "<table>"`
//! 6. `CREATE INDEX` for every surviving index
//! 7. `PRAGMA foreign_key_check("<table>")` when the table has foreign keys;
//!    any reported row is a violation
//! 8. `PRAGMA foreign_keys = ON`, whether or not steps 2 to 7 committed
//!
//! A failure anywhere in 2 to 7 rolls back and leaves the original table
//! untouched.

use super::sqlite::SqliteGrammar;
use super::state::{ColumnShape, TableState};
use super::{Grammar, Step};

/// Prefix of the table built during a rebuild.
pub const TEMP_TABLE_PREFIX: &str = "__temp__";

/// Builds the atomic step that rebuilds `target.name` into `target`.
///
/// Columns carried over from the live table are copied from their source
/// column, following renames. New columns that are NOT NULL without a
/// default are filled with the zero value of their type; other new columns
/// take their default.
#[must_use]
pub fn rebuild_table(grammar: &SqliteGrammar, target: &TableState) -> Step {
    let table = target.name.as_str();
    let temp = format!("{TEMP_TABLE_PREFIX}{table}");

    let mut statements = vec![grammar.create_table_sql(&temp, target, false)];
    if let Some(copy) = copy_rows_sql(grammar, table, &temp, target) {
        statements.push(copy);
    }
    statements.push(grammar.compile_drop_table(table, false));
    statements.push(grammar.compile_rename_table(&temp, table));
    statements.extend(grammar.index_statements(table, target));

    let checks = if target.foreign_keys.is_empty() {
        Vec::new()
    } else {
        vec![format!("PRAGMA foreign_key_check({})", grammar.wrap(table))]
    };

    Step::Atomic {
        setup: vec!["PRAGMA foreign_keys = OFF".to_string()],
        statements,
        checks,
        teardown: vec!["PRAGMA foreign_keys = ON".to_string()],
    }
}

fn copy_rows_sql(grammar: &SqliteGrammar, from: &str, into: &str, target: &TableState) -> Option<String> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    for column in &target.columns {
        match (&column.source, &column.shape) {
            (Some(source), _) => {
                columns.push(grammar.wrap(column.name()));
                values.push(grammar.wrap(source));
            }
            (None, ColumnShape::Declared(definition))
                if !definition.is_nullable()
                    && definition.default.is_none()
                    && !definition.autoincrement =>
            {
                columns.push(grammar.wrap(column.name()));
                let zero = if definition.column_type.is_numeric() {
                    "0"
                } else {
                    "''"
                };
                values.push(zero.to_string());
            }
            (None, _) => {}
        }
    }
    if columns.is_empty() {
        return None;
    }
    Some(format!(
        "INSERT INTO {} ({}) SELECT {} FROM {}",
        grammar.wrap(into),
        columns.join(", "),
        values.join(", "),
        grammar.wrap(from)
    ))
}
