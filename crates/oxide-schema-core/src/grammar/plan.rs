//! Validated, ordered and simulated blueprint.

use std::collections::HashSet;

use super::state::TableState;
use crate::blueprint::{Blueprint, ColumnType, IndexKind, Operation, TableOptions};
use crate::error::{Result, SchemaError};
use crate::introspect::IntrospectedTable;

/// A blueprint ready for compilation.
///
/// Preparing a plan checks each operation on its own, moves foreign key drops
/// to the front, splits renaming changes into a rename followed by a change,
/// and (when the live table is known) replays the operations on a
/// [`TableState`] so that every reference is checked and every changed column
/// is fully resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    table: String,
    creating: bool,
    options: TableOptions,
    operations: Vec<Operation>,
    before: Option<TableState>,
    after: Option<TableState>,
}

impl Plan {
    /// Prepares `blueprint` against the live table, if known.
    pub fn prepare(blueprint: &Blueprint, current: Option<&IntrospectedTable>) -> Result<Self> {
        validate(blueprint)?;
        let mut operations = order(blueprint.table(), blueprint.operations());

        let before = if blueprint.is_creating() {
            Some(TableState::empty(blueprint.table()))
        } else {
            current.map(TableState::from_introspected)
        };
        let after = match &before {
            Some(state) => {
                let mut after = state.clone();
                operations = operations
                    .into_iter()
                    .map(|op| after.apply(op))
                    .collect::<Result<_>>()?;
                Some(after)
            }
            None => None,
        };

        Ok(Self {
            table: blueprint.table().to_string(),
            creating: blueprint.is_creating(),
            options: blueprint.options().clone(),
            operations,
            before,
            after,
        })
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether the plan creates the table.
    #[must_use]
    pub const fn is_creating(&self) -> bool {
        self.creating
    }

    /// Table options.
    #[must_use]
    pub const fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Operations in execution order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Table state before the operations run.
    #[must_use]
    pub const fn before(&self) -> Option<&TableState> {
        self.before.as_ref()
    }

    /// Table state after the operations run.
    #[must_use]
    pub const fn after(&self) -> Option<&TableState> {
        self.after.as_ref()
    }
}

fn invalid(message: String) -> SchemaError {
    SchemaError::InvalidDefinition(message)
}

fn validate(blueprint: &Blueprint) -> Result<()> {
    let table = blueprint.table();
    let mut names: HashSet<String> = HashSet::new();
    for operation in blueprint.operations() {
        match operation {
            Operation::AddColumn(column) | Operation::ChangeColumn(column) => {
                if column.autoincrement && !column.column_type.is_integer() {
                    return Err(invalid(format!(
                        "auto-increment column '{}' must be an integer type, not {}",
                        column.name, column.column_type
                    )));
                }
                if let ColumnType::Enum(values) = &column.column_type {
                    if values.is_empty() {
                        return Err(invalid(format!(
                            "enum column '{}' has no allowed values",
                            column.name
                        )));
                    }
                }
                if matches!(operation, Operation::AddColumn(_)) && column.renamed_from.is_some() {
                    return Err(invalid(format!(
                        "new column '{}' cannot be renamed from another column",
                        column.name
                    )));
                }
            }
            Operation::AddIndex(index) => {
                if index.columns.is_empty() {
                    return Err(invalid(format!(
                        "{} index on '{table}' has no columns",
                        index.kind.suffix()
                    )));
                }
                if index.kind != IndexKind::Primary && !names.insert(index.resolved_name(table)) {
                    return Err(SchemaError::NameCollision {
                        table: table.to_string(),
                        name: index.resolved_name(table),
                    });
                }
            }
            Operation::AddForeignKey(foreign) => {
                let name = foreign.resolve(table)?.name;
                if !names.insert(name.clone()) {
                    return Err(SchemaError::NameCollision {
                        table: table.to_string(),
                        name,
                    });
                }
            }
            Operation::DropIndex { name, .. } | Operation::DropForeignKey(name) => {
                names.remove(name);
            }
            Operation::DropColumn(_) | Operation::RenameColumn { .. } => {}
        }
        if blueprint.is_creating()
            && matches!(
                operation,
                Operation::DropColumn(_)
                    | Operation::RenameColumn { .. }
                    | Operation::ChangeColumn(_)
                    | Operation::DropIndex { .. }
                    | Operation::DropForeignKey(_)
            )
        {
            return Err(invalid(format!(
                "cannot {} while creating '{table}'",
                operation.describe()
            )));
        }
    }
    Ok(())
}

/// Moves foreign key drops first and expands renaming changes.
///
/// A drop of a key added earlier in the same blueprint stays in place.
fn order(table: &str, operations: &[Operation]) -> Vec<Operation> {
    let mut added: HashSet<String> = HashSet::new();
    let mut drops = Vec::new();
    let mut rest = Vec::new();
    for operation in operations {
        match operation {
            Operation::AddForeignKey(foreign) => {
                added.insert(foreign.resolved_name(table));
                rest.push(operation);
            }
            Operation::DropForeignKey(name) if !added.contains(name) => drops.push(operation),
            _ => rest.push(operation),
        }
    }
    let mut ordered: Vec<Operation> = drops.into_iter().cloned().collect();
    for operation in rest {
        match operation {
            Operation::ChangeColumn(column) if column.renamed_from.is_some() => {
                let mut changed = column.clone();
                if let Some(from) = changed.renamed_from.take() {
                    ordered.push(Operation::RenameColumn {
                        from,
                        to: changed.name.clone(),
                    });
                }
                ordered.push(Operation::ChangeColumn(changed));
            }
            other => ordered.push(other.clone()),
        }
    }
    ordered
}
