//! oxide-schema CLI
//!
//! Command-line tool for inspecting and altering tables.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_schema::introspector::write_json;
use oxide_schema::prelude::*;
use oxide_schema_core::blueprint::ColumnHandle;
use oxide_schema_core::CompiledBlueprint;

/// Inspect and alter database tables.
#[derive(Parser)]
#[command(name = "oxide-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (e.g. `sqlite:app.db`, `postgres://...`, `mysql://...`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Show SQL without executing it.
    #[arg(long)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a table's columns, indexes and foreign keys as JSON.
    Describe {
        /// Table name.
        table: String,
    },

    /// List a table's column names.
    Columns {
        /// Table name.
        table: String,
    },

    /// Check whether a table exists.
    HasTable {
        /// Table name.
        table: String,
    },

    /// Check whether a table has a column.
    HasColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Drop a table.
    Drop {
        /// Table name.
        table: String,

        /// Do nothing when the table does not exist.
        #[arg(long)]
        if_exists: bool,
    },

    /// Rename a table.
    Rename {
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },

    /// Add a column to a table.
    AddColumn {
        /// Table name.
        table: String,
        #[command(flatten)]
        column: ColumnArgs,

        /// Place the column after another one (MySQL only).
        #[arg(long)]
        after: Option<String>,
    },

    /// Change a column's type, nullability or default.
    ChangeColumn {
        /// Table name.
        table: String,
        #[command(flatten)]
        column: ColumnArgs,

        /// Rename the column from this name as part of the change.
        #[arg(long)]
        renamed_from: Option<String>,

        /// Remove the column's default.
        #[arg(long, conflicts_with = "default")]
        drop_default: bool,
    },

    /// Drop a column from a table.
    DropColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Rename a column.
    RenameColumn {
        /// Table name.
        table: String,
        /// Current name.
        from: String,
        /// New name.
        to: String,
    },
}

#[derive(clap::Args)]
struct ColumnArgs {
    /// Column name.
    name: String,

    /// Column type (e.g. `integer`, `big-integer`, `string(100)`, `decimal(8,2)`).
    #[arg(short = 't', long = "type")]
    column_type: ColumnType,

    /// Allow NULL values.
    #[arg(long)]
    nullable: bool,

    /// Default value. Numbers and booleans are kept as such,
    /// `CURRENT_TIMESTAMP` uses the current time, anything else is a string.
    #[arg(long)]
    default: Option<String>,
}

impl ColumnArgs {
    fn declare(self, table: &mut Blueprint) -> ColumnHandle<'_> {
        let mut column = table.column(self.name, self.column_type);
        if self.nullable {
            column = column.nullable();
        }
        if let Some(raw) = self.default {
            column = column.default(parse_default(&raw));
        }
        column
    }
}

fn parse_default(raw: &str) -> DefaultValue {
    if raw.eq_ignore_ascii_case("current_timestamp") {
        return DefaultValue::CurrentTimestamp;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return DefaultValue::Integer(value);
    }
    if let Ok(value) = raw.parse::<f64>() {
        return DefaultValue::Float(value);
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => DefaultValue::Bool(true),
        "false" => DefaultValue::Bool(false),
        _ => DefaultValue::String(raw.to_string()),
    }
}

/// What a mutating command ran (or would run).
#[derive(Serialize)]
struct Report<'a> {
    table: &'a str,
    dialect: Dialect,
    dry_run: bool,
    statements: Vec<String>,
}

fn report(compiled: &CompiledBlueprint, dialect: Dialect, dry_run: bool) -> anyhow::Result<()> {
    let report = Report {
        table: &compiled.table,
        dialect,
        dry_run,
        statements: compiled.statements(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let connection = DatabaseConnection::connect(&cli.database).await?;
    let dialect = connection.dialect();
    let dry_run = cli.dry_run;
    let mut schema = SchemaBuilder::new(connection).dry_run(dry_run);

    if dry_run {
        info!("Dry run mode - SQL will be printed but not executed.");
    }

    let compiled = match cli.command {
        Commands::Describe { table } => {
            let described = schema.describe(&table).await?;
            write_json(&described, std::io::stdout().lock())?;
            None
        }

        Commands::Columns { table } => {
            for column in schema.get_column_listing(&table).await? {
                println!("{column}");
            }
            None
        }

        Commands::HasTable { table } => {
            println!("{}", schema.has_table(&table).await?);
            None
        }

        Commands::HasColumn { table, column } => {
            println!("{}", schema.has_column(&table, &column).await?);
            None
        }

        Commands::Drop { table, if_exists } => Some(if if_exists {
            schema.drop_if_exists(&table).await?
        } else {
            schema.drop(&table).await?
        }),

        Commands::Rename { from, to } => Some(schema.rename(&from, &to).await?),

        Commands::AddColumn {
            table,
            column,
            after,
        } => Some(
            schema
                .with_table(&table, |blueprint| {
                    let handle = column.declare(blueprint);
                    if let Some(after) = after {
                        handle.after(after);
                    }
                    Ok(())
                })
                .await?,
        ),

        Commands::ChangeColumn {
            table,
            column,
            renamed_from,
            drop_default,
        } => Some(
            schema
                .with_table(&table, |blueprint| {
                    let mut handle = column.declare(blueprint);
                    if let Some(previous) = renamed_from {
                        handle = handle.renamed_from(previous);
                    }
                    if drop_default {
                        handle = handle.drop_default();
                    }
                    handle.change();
                    Ok(())
                })
                .await?,
        ),

        Commands::DropColumn { table, column } => Some(
            schema
                .with_table(&table, |blueprint| {
                    blueprint.drop_column(column);
                    Ok(())
                })
                .await?,
        ),

        Commands::RenameColumn { table, from, to } => Some(
            schema
                .with_table(&table, |blueprint| {
                    blueprint.rename_column(from, to);
                    Ok(())
                })
                .await?,
        ),
    };

    if let Some(compiled) = compiled {
        report(&compiled, dialect, dry_run)?;
    }

    Ok(())
}
