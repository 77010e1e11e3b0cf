// ABOUTME: Dump job configuration
// ABOUTME: Defaults, TOML config file loading and normalization of user-supplied settings

use crate::catalog::TableFilter;
use crate::dump::{OutputOrder, PipelineOptions};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Workers per batch when none (or a non-positive count) is requested
pub const DEFAULT_PARALLELISM: usize = 50;

/// Version written into every metadata block
pub const DUMP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// What the schema dump does with a table whose script cannot be built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TableErrorPolicy {
    /// Leave the table out without reporting it
    Skip,
    /// Leave the table out, keep going and report it at the end
    #[default]
    Collect,
    /// Stop the dump at the first failing table
    Abort,
}

/// Settings for one dump job, fixed once the job starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpConfig {
    pub source: String,
    pub schema: String,
    pub parallelism: usize,
    pub dump_version: String,
    /// Pin every worker session to one exported read-only snapshot
    pub snapshot: bool,
    pub on_table_error: TableErrorPolicy,
    pub output_order: OutputOrder,
    /// Queue depth between table workers and the output writer
    pub channel_capacity: Option<usize>,
    pub defer_foreign_keys: bool,
    pub show_progress: bool,
    pub filter: TableFilter,
}

impl DumpConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            schema: "public".to_string(),
            parallelism: DEFAULT_PARALLELISM,
            dump_version: DUMP_VERSION.to_string(),
            snapshot: true,
            on_table_error: TableErrorPolicy::default(),
            output_order: OutputOrder::default(),
            channel_capacity: None,
            defer_foreign_keys: false,
            show_progress: false,
            filter: TableFilter::default(),
        }
    }

    pub fn with_parallelism(mut self, requested: i64) -> Self {
        self.parallelism = normalize_parallelism(requested);
        self
    }

    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity.unwrap_or(self.parallelism).max(1)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            defer_foreign_keys: self.defer_foreign_keys,
        }
    }

    /// Overlay the settings present in a config file
    pub fn apply_file(&mut self, file: ConfigFile) {
        if let Some(schema) = file.schema {
            self.schema = schema;
        }
        if let Some(parallel) = file.parallel {
            self.parallelism = normalize_parallelism(parallel);
        }
        if let Some(snapshot) = file.snapshot {
            self.snapshot = snapshot;
        }
        if let Some(policy) = file.on_table_error {
            self.on_table_error = policy;
        }
        if let Some(order) = file.output_order {
            self.output_order = order;
        }
        if let Some(capacity) = file.channel_capacity {
            self.channel_capacity = Some(capacity);
        }
        if let Some(defer) = file.defer_foreign_keys {
            self.defer_foreign_keys = defer;
        }
        if let Some(tables) = file.tables {
            self.filter = tables;
        }
    }
}

/// Non-positive requests fall back to [`DEFAULT_PARALLELISM`]
pub fn normalize_parallelism(requested: i64) -> usize {
    if requested <= 0 {
        DEFAULT_PARALLELISM
    } else {
        usize::try_from(requested).unwrap_or(DEFAULT_PARALLELISM)
    }
}

/// Contents of a dump config file
///
/// ```toml
/// schema = "public"
/// parallel = 16
/// snapshot = true
/// on_table_error = "collect"
/// output_order = "submission"
/// defer_foreign_keys = true
///
/// [tables]
/// exclude = ["audit_log"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub schema: Option<String>,
    pub parallel: Option<i64>,
    pub snapshot: Option<bool>,
    pub on_table_error: Option<TableErrorPolicy>,
    pub output_order: Option<OutputOrder>,
    pub channel_capacity: Option<usize>,
    pub defer_foreign_keys: Option<bool>,
    pub tables: Option<TableFilter>,
}

pub fn parse_config(contents: &str) -> Result<ConfigFile> {
    toml::from_str(contents).context("Invalid dump config")
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}
