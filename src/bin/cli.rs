//! rowvault CLI
//!
//! Command-line interface for inspecting and editing rowvault tables.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rowvault::{ColumnMap, Config, RowKey, RowStore, SyncStrategy, Value};
use tracing_subscriber::{fmt, EnvFilter};

/// rowvault CLI
#[derive(Parser, Debug)]
#[command(name = "rowvault")]
#[command(about = "Embedded row store with encrypted, sharded append-only logs")]
#[command(version)]
struct Args {
    /// Directory holding databases
    #[arg(short, long, default_value = ".")]
    data_dir: String,

    /// Database name
    #[arg(long, default_value = "_rowvault_")]
    db: String,

    /// Table name
    #[arg(short, long, default_value = "default")]
    table: String,

    /// Encryption key (also required to open an existing table)
    #[arg(short, long)]
    key: Option<String>,

    /// Encrypt payloads at rest (only applies when creating a table)
    #[arg(short, long)]
    encrypt: bool,

    /// Only fsync logs when a rewrite completes
    #[arg(long)]
    lazy_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a table with the given columns
    Create {
        #[arg(required = true)]
        columns: Vec<String>,
    },

    /// Insert a row from column=value pairs
    Insert {
        row: String,
        #[arg(required = true)]
        cells: Vec<String>,
    },

    /// Print a row, or one of its cells
    Find { row: String, column: Option<String> },

    /// Exit 0 if the row (or cell) exists, 1 otherwise
    Check { row: String, column: Option<String> },

    /// Set one cell of a row
    Update {
        row: String,
        column: String,
        value: String,
    },

    /// Remove one cell of a row
    Remove { row: String, column: String },

    /// Delete a row
    DropRow { row: String },

    /// List every row key
    Rows,

    /// Print the number of rows
    Count,

    /// List the declared columns
    Columns,

    /// Print a row as JSON
    Json {
        row: String,
        #[arg(long)]
        compact: bool,
    },

    /// Delete the whole table
    DropTable,

    /// List every table in the database
    Tables,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rowvault=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> rowvault::Result<ExitCode> {
    let mut builder = Config::builder()
        .data_dir(&args.data_dir)
        .db_name(&args.db)
        .table_name(&args.table)
        .encryption_enabled(args.encrypt)
        .sync_strategy(if args.lazy_sync {
            SyncStrategy::OnRewrite
        } else {
            SyncStrategy::EveryWrite
        });
    if let Some(key) = &args.key {
        builder = builder.encryption_key(key);
    }
    let config = builder.build();

    match &args.command {
        Commands::Create { columns } => {
            RowStore::create(config, columns.clone())?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Tables => {
            for name in RowStore::tables(&config)? {
                println!("{}", name);
            }
            return Ok(ExitCode::SUCCESS);
        }
        _ => {}
    }

    let store = RowStore::open(config)?;

    match args.command {
        Commands::Insert { row, cells } => {
            let mut columns = ColumnMap::new();
            for cell in &cells {
                let (column, value) = cell.split_once('=').ok_or_else(|| {
                    rowvault::VaultError::InvalidArgument(format!(
                        "expected column=value, got {:?}",
                        cell
                    ))
                })?;
                columns.set(column, Value::parse_literal(value));
            }
            store.insert(row_key(&row), columns)?;
        }
        Commands::Find { row, column } => match column {
            Some(column) => println!("{}", store.find(row_key(&row), &column)?),
            None => {
                for (column, value) in store.find_row(row_key(&row))?.iter() {
                    println!("{}\t{}", column, value);
                }
            }
        },
        Commands::Check { row, column } => {
            let found = store.check(row_key(&row), column.as_deref());
            println!("{}", found);
            if !found {
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Update { row, column, value } => {
            store.update(row_key(&row), &column, Value::parse_literal(&value))?;
        }
        Commands::Remove { row, column } => store.remove(row_key(&row), &column)?,
        Commands::DropRow { row } => store.drop_row(row_key(&row))?,
        Commands::Rows => {
            for key in store.list_rows()? {
                println!("{}", key);
            }
        }
        Commands::Count => println!("{}", store.count()),
        Commands::Columns => {
            for column in store.columns() {
                println!("{}", column);
            }
        }
        Commands::Json { row, compact } => {
            println!("{}", store.row_to_json(row_key(&row), !compact)?)
        }
        Commands::DropTable => store.drop_table()?,
        // Handled before open
        Commands::Create { .. } | Commands::Tables => {}
    }

    Ok(ExitCode::SUCCESS)
}

/// Integers on the command line are integer keys
fn row_key(s: &str) -> RowKey {
    match s.parse::<i64>() {
        Ok(n) => RowKey::Int(n),
        Err(_) => RowKey::Text(s.to_string()),
    }
}
