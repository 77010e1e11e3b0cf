// ABOUTME: Summary of a finished dump job
// ABOUTME: Counts written tables and carries per-table failures back to the caller

use crate::catalog::TableIdentifier;

/// A table left out of the output, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFailure {
    pub table: TableIdentifier,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DumpReport {
    pub tables_total: usize,
    pub tables_written: usize,
    /// Populated when failures are collected; empty when they are skipped
    pub failures: Vec<TableFailure>,
    pub bytes_written: u64,
}

impl DumpReport {
    pub fn is_complete(&self) -> bool {
        self.tables_written == self.tables_total
    }

    /// Log the summary in the same shape for every command
    pub fn log_summary(&self, what: &str) {
        tracing::info!("========================================");
        tracing::info!("{} Summary", what);
        tracing::info!("========================================");
        tracing::info!("Total tables: {}", self.tables_total);
        tracing::info!("✓ Written: {}", self.tables_written);
        if !self.failures.is_empty() {
            tracing::info!("✗ Failed: {}", self.failures.len());
            for failure in &self.failures {
                tracing::error!("  ✗ {}: {}", failure.table, failure.error);
            }
        }
        tracing::info!("========================================");
    }
}
