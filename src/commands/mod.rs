// ABOUTME: Command implementations for each dump mode
// ABOUTME: Exports the schema script dump and the per-table CSV export

pub mod export;
pub mod schema;

pub use export::{csv_file_name, dump_csv, export_csv, write_records, WriteGate};
pub use schema::{dump_schema, write_schema};

use indicatif::{ProgressBar, ProgressStyle};

/// Per-table progress bar, hidden when progress output is off
pub(crate) fn table_progress(len: usize, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let progress = ProgressBar::new(len as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    progress
}
