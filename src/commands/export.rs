// ABOUTME: CSV export command - one CSV file per table plus a metadata file
// ABOUTME: Fails fast: the first failing table stops the export before the next batch

use super::table_progress;
use crate::catalog::{Catalog, PgCatalog, TableIdentifier};
use crate::config::DumpConfig;
use crate::dump::{run_batches, DumpMetadata, DumpReport, ErrorPolicy};
use crate::utils::sanitize_identifier;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::AsyncWriteExt;

/// Export every table of the configured schema as CSV into `output_dir`
///
/// The metadata file gets the header and footer blocks and no table content.
/// Each table lands in `<table>.csv` with the column names as the first row.
///
/// # Errors
///
/// This function will return an error if:
/// - Cannot connect to the source database or export the snapshot
/// - Cannot write the metadata file or create `output_dir`
/// - Any table fails to export (remaining tables of its batch are cancelled
///   and later batches never start)
pub async fn dump_csv(
    config: &DumpConfig,
    output_dir: &Path,
    metadata_file: &Path,
) -> Result<DumpReport> {
    tracing::info!(
        "Starting CSV export of '{}' to {}",
        config.schema,
        output_dir.display()
    );

    let catalog = Arc::new(
        PgCatalog::open(
            &config.source,
            config.schema.clone(),
            config.parallelism,
            config.snapshot,
        )
        .await?,
    );

    let result = export_csv(Arc::clone(&catalog), output_dir, metadata_file, config).await;
    catalog.close().await?;
    let report = result?;

    tracing::info!(
        "✓ Exported {} table(s) to {}",
        report.tables_written,
        output_dir.display()
    );
    Ok(report)
}

/// Export engine behind [`dump_csv`], usable with any [`Catalog`]
pub async fn export_csv<C>(
    catalog: Arc<C>,
    output_dir: &Path,
    metadata_file: &Path,
    config: &DumpConfig,
) -> Result<DumpReport>
where
    C: Catalog + 'static,
{
    let server_version = catalog.server_version().await?;
    let metadata = DumpMetadata::new(&config.dump_version, server_version, config.parallelism);
    write_metadata_file(metadata_file, &metadata).await?;

    let tables = catalog
        .list_tables(&config.filter)
        .await
        .context("Failed to resolve table list")?;

    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    tracing::info!(
        "Exporting {} table(s), up to {} at a time",
        tables.len(),
        config.parallelism
    );

    let progress = table_progress(tables.len(), config.show_progress);
    let bytes_written = Arc::new(AtomicU64::new(0));
    let gate = Arc::new(WriteGate::default());

    let outcome = run_batches(&tables, config.parallelism, ErrorPolicy::Abort, |_, table| {
        let catalog = Arc::clone(&catalog);
        let path = output_dir.join(csv_file_name(&table));
        let progress = progress.clone();
        let bytes_written = Arc::clone(&bytes_written);
        let gate = Arc::clone(&gate);

        async move {
            let records = catalog
                .fetch_records(&table)
                .await
                .with_context(|| format!("Failed to read rows of {}", table))?;
            let rows = records.len().saturating_sub(1);

            let written = tokio::task::spawn_blocking(move || write_records(&path, &records, &gate))
                .await
                .context("CSV writer task failed")?
                .with_context(|| format!("Failed to write CSV for {}", table))?;

            bytes_written.fetch_add(written, Ordering::Relaxed);
            progress.inc(1);
            tracing::debug!("Exported {} row(s) from {}", rows, table);
            Ok(())
        }
    })
    .await;
    progress.finish_with_message("Tables exported");

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            // cancelled workers leave their blocking writes running
            let gate = Arc::clone(&gate);
            tokio::task::spawn_blocking(move || gate.close())
                .await
                .context("CSV writer task failed")?;
            return Err(e.context("CSV export aborted"));
        }
    };

    Ok(DumpReport {
        tables_total: tables.len(),
        tables_written: outcome.completed,
        failures: Vec::new(),
        bytes_written: bytes_written.load(Ordering::Relaxed),
    })
}

/// File name for a table's CSV: the table name, made safe for a path component
pub fn csv_file_name(table: &TableIdentifier) -> PathBuf {
    let name: String = sanitize_identifier(&table.name)
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    PathBuf::from(format!("{}.csv", name))
}

/// Admits finished CSV files into place until the export is aborted
#[derive(Debug, Default)]
pub struct WriteGate {
    closed: RwLock<bool>,
}

impl WriteGate {
    /// Refuse every later rename; waits for one already in progress
    pub fn close(&self) {
        *self.closed.write().unwrap_or_else(PoisonError::into_inner) = true;
    }

    fn admit<T>(&self, path: &Path, place: impl FnOnce() -> Result<T>) -> Result<T> {
        let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
        if *closed {
            bail!("Export aborted before {} was written", path.display());
        }
        place()
    }
}

/// Write `records` to `path` and return the file size
///
/// Rows go to `<path>.partial` first and the file is renamed into place only
/// once complete and only while `gate` is open, so neither a failed table nor
/// an aborted export leaves a CSV behind.
pub fn write_records(path: &Path, records: &[Vec<String>], gate: &WriteGate) -> Result<u64> {
    let partial = path.with_extension("csv.partial");

    let result = write_partial(&partial, records).and_then(|()| {
        gate.admit(path, || {
            std::fs::rename(&partial, path)
                .with_context(|| format!("Failed to move {} into place", path.display()))
        })?;
        let len = std::fs::metadata(path)
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        Ok(len)
    });

    if result.is_err() {
        let _ = std::fs::remove_file(&partial);
    }
    result
}

fn write_partial(path: &Path, records: &[Vec<String>]) -> Result<()> {
    let mut writer = ::csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for record in records {
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(())
}

async fn write_metadata_file(path: &Path, metadata: &DumpMetadata) -> Result<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create metadata file {}", path.display()))?;
    file.write_all(metadata.header().as_bytes()).await?;
    file.write_all(metadata.footer().as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_csv_file_name() {
        let table = TableIdentifier::new("public", "customers");
        assert_eq!(csv_file_name(&table), PathBuf::from("customers.csv"));

        let table = TableIdentifier::new("public", "a/b\\c");
        assert_eq!(csv_file_name(&table), PathBuf::from("a_b_c.csv"));
    }

    #[test]
    fn test_write_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let records = vec![
            vec!["id".to_string(), "name".to_string()],
            vec!["1".to_string(), "Alice, Inc.".to_string()],
            vec!["2".to_string(), String::new()],
        ];

        let size = write_records(&path, &records, &WriteGate::default()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "id,name\n1,\"Alice, Inc.\"\n2,\n");
        assert_eq!(size, content.len() as u64);
        assert!(!dir.path().join("customers.csv.partial").exists());
    }

    #[test]
    fn test_write_records_failure_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("orders.csv");
        let records = vec![vec!["id".to_string()]];

        assert!(write_records(&path, &records, &WriteGate::default()).is_err());
        assert!(!path.exists());
        assert!(!path.with_extension("csv.partial").exists());
    }

    #[test]
    fn test_closed_gate_keeps_file_out_of_place() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        let records = vec![vec!["id".to_string()], vec!["1".to_string()]];
        let gate = WriteGate::default();
        gate.close();

        let err = write_records(&path, &records, &gate).unwrap_err();
        assert!(err.to_string().contains("Export aborted before"));
        assert!(!path.exists());
        assert!(!path.with_extension("csv.partial").exists());
    }

    #[test]
    fn test_close_waits_for_rename_in_progress() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        let gate = Arc::new(WriteGate::default());
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();

        let writer = {
            let gate = Arc::clone(&gate);
            let path = path.clone();
            std::thread::spawn(move || {
                gate.admit(&path, || {
                    entered_tx.send(()).unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    std::fs::write(&path, "id\n")?;
                    Ok(())
                })
            })
        };

        entered_rx.recv().unwrap();
        gate.close();
        // close returned, so the admitted write is already in place
        assert!(path.exists());
        writer.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_metadata_file_has_header_and_footer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.txt");
        let metadata = DumpMetadata::new("0.2.1", "16.2", 4);

        write_metadata_file(&path, &metadata).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, format!("{}{}", metadata.header(), metadata.footer()));
    }
}
