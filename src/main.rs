// ABOUTME: CLI entry point for pg-catalog-dump
// ABOUTME: Parses commands, builds the dump config and routes to the dump commands

use clap::{Args, Parser, Subcommand};
use pg_catalog_dump::catalog::TableFilter;
use pg_catalog_dump::commands;
use pg_catalog_dump::config::{self, DumpConfig, TableErrorPolicy};
use pg_catalog_dump::dump::{DumpReport, OutputOrder};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pg-catalog-dump")]
#[command(about = "Concurrent catalog-driven PostgreSQL schema and data dump", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every dump mode
#[derive(Args, Clone)]
struct DumpArgs {
    #[arg(long)]
    source: String,
    /// Schema to dump (default: public)
    #[arg(long)]
    schema: Option<String>,
    /// Tables scripted concurrently per batch; 0 or negative means the default (50)
    #[arg(long, allow_negative_numbers = true)]
    parallel: Option<i64>,
    /// Include only these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    include_tables: Option<Vec<String>>,
    /// Exclude these tables (comma-separated)
    #[arg(long, value_delimiter = ',')]
    exclude_tables: Option<Vec<String>>,
    /// Do not pin worker sessions to one exported snapshot
    #[arg(long)]
    no_snapshot: bool,
    /// Path to a dump config TOML file; flags given here win over it
    #[arg(long = "config")]
    config_path: Option<PathBuf>,
    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a single SQL script recreating the schema and its data
    Schema {
        #[command(flatten)]
        args: DumpArgs,
        /// Output script file
        #[arg(long)]
        output: PathBuf,
        /// What to do with a table that cannot be scripted
        #[arg(long, value_enum)]
        on_table_error: Option<TableErrorPolicy>,
        /// Order of table blocks in the script
        #[arg(long, value_enum)]
        output_order: Option<OutputOrder>,
        /// Emit foreign keys in one section after all tables
        #[arg(long)]
        defer_foreign_keys: bool,
    },
    /// Export every table as CSV plus a metadata file
    Csv {
        #[command(flatten)]
        args: DumpArgs,
        /// Directory receiving one CSV file per table
        #[arg(long)]
        output_dir: PathBuf,
        /// File receiving the header and footer metadata blocks
        #[arg(long)]
        metadata_file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging - default to INFO level if RUST_LOG not set
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Schema {
            args,
            output,
            on_table_error,
            output_order,
            defer_foreign_keys,
        } => {
            let mut config = build_config(&args)?;
            if let Some(policy) = on_table_error {
                config.on_table_error = policy;
            }
            if let Some(order) = output_order {
                config.output_order = order;
            }
            if defer_foreign_keys {
                config.defer_foreign_keys = true;
            }

            let report = commands::dump_schema(&config, &output).await?;
            finish(&report, "Schema Dump")
        }
        Commands::Csv {
            args,
            output_dir,
            metadata_file,
        } => {
            let config = build_config(&args)?;
            let report = commands::dump_csv(&config, &output_dir, &metadata_file).await?;
            finish(&report, "CSV Export")
        }
    }
}

/// Defaults, then the config file, then explicit flags
fn build_config(args: &DumpArgs) -> anyhow::Result<DumpConfig> {
    pg_catalog_dump::utils::validate_connection_string(&args.source)?;

    let mut config = DumpConfig::new(args.source.clone());
    if let Some(path) = &args.config_path {
        config.apply_file(config::load_config_file(path)?);
    }

    if let Some(schema) = &args.schema {
        config.schema = schema.clone();
    }
    if let Some(parallel) = args.parallel {
        config.parallelism = config::normalize_parallelism(parallel);
    }
    if args.include_tables.is_some() || args.exclude_tables.is_some() {
        let include = args
            .include_tables
            .clone()
            .unwrap_or_else(|| config.filter.include.clone());
        let exclude = args
            .exclude_tables
            .clone()
            .unwrap_or_else(|| config.filter.exclude.clone());
        config.filter = TableFilter::new(include, exclude);
    }
    if args.no_snapshot {
        config.snapshot = false;
    }
    config.show_progress = !args.no_progress;

    Ok(config)
}

fn finish(report: &DumpReport, what: &str) -> anyhow::Result<()> {
    report.log_summary(what);

    if !report.failures.is_empty() {
        anyhow::bail!(
            "{} table(s) could not be dumped. Review the errors above.",
            report.failures.len()
        );
    }
    Ok(())
}
