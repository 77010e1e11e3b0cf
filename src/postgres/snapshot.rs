// ABOUTME: Exported snapshot shared by every worker session of a dump job
// ABOUTME: The coordinator exports it, each pooled session imports it into its own transaction

use crate::utils::quote_literal;
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Statement opening a repeatable-read, read-only transaction
pub const BEGIN_SNAPSHOT: &str = "BEGIN ISOLATION LEVEL REPEATABLE READ READ ONLY";

/// Open the coordinating transaction on `client` and export its snapshot
///
/// The returned id stays importable until [`end_snapshot`] closes the
/// transaction, so the coordinator must outlive every worker session.
pub async fn export_snapshot(client: &Client) -> Result<String> {
    client
        .batch_execute(BEGIN_SNAPSHOT)
        .await
        .context("Failed to open read-only snapshot transaction")?;
    let row = client
        .query_one("SELECT pg_export_snapshot()", &[])
        .await
        .context("Failed to export snapshot")?;
    let id: String = row.get(0);
    tracing::debug!("Exported snapshot {} for the dump", id);
    Ok(id)
}

/// Start a transaction on `client` that sees the exported snapshot `id`
pub async fn import_snapshot(client: &Client, id: &str) -> Result<()> {
    client
        .batch_execute(&format!(
            "{}; SET TRANSACTION SNAPSHOT {}",
            BEGIN_SNAPSHOT,
            quote_literal(id)
        ))
        .await
        .with_context(|| format!("Failed to import snapshot {}", id))
}

/// Close the coordinating transaction opened by [`export_snapshot`]
pub async fn end_snapshot(client: &Client) -> Result<()> {
    client
        .batch_execute("COMMIT")
        .await
        .context("Failed to close snapshot transaction")?;
    tracing::debug!("Closed snapshot transaction");
    Ok(())
}
