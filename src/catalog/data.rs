// ABOUTME: Row data extraction for scripts and CSV export
// ABOUTME: Streams COPY text-format payloads and fetches rows as text records

use super::tables::{table_columns, ColumnDefinition};
use super::TableIdentifier;
use crate::utils::quote_ident;
use anyhow::{Context, Result};
use futures::{pin_mut, TryStreamExt};
use tokio_postgres::Client;

/// Build a `COPY ... FROM stdin` block holding every row of `table`
///
/// The payload is produced by the server itself (`COPY ... TO STDOUT`), so
/// escaping of tabs, newlines, backslashes and NULLs matches what `psql`
/// expects when the script is replayed.
pub async fn data_copy_statement(client: &Client, table: &TableIdentifier) -> Result<String> {
    let columns = table_columns(client, table).await?;
    let column_list = copy_column_list(&columns);

    let stream = client
        .copy_out(&format!("COPY {} ({}) TO STDOUT", table, column_list))
        .await
        .with_context(|| format!("Failed to start COPY for {}", table))?;
    pin_mut!(stream);

    let mut payload = Vec::new();
    while let Some(chunk) = stream
        .try_next()
        .await
        .with_context(|| format!("Failed to read COPY data for {}", table))?
    {
        payload.extend_from_slice(&chunk);
    }

    let payload = String::from_utf8(payload)
        .with_context(|| format!("COPY data for {} is not valid UTF-8", table))?;

    Ok(format_copy_block(table, &column_list, &payload))
}

/// Columns carried by `COPY`; generated columns are recomputed on load
pub fn copy_column_list(columns: &[ColumnDefinition]) -> String {
    columns
        .iter()
        .filter(|c| c.holds_data())
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_copy_block(table: &TableIdentifier, column_list: &str, payload: &str) -> String {
    let mut block = format!("COPY {} ({}) FROM stdin;\n", table, column_list);
    block.push_str(payload);
    if !payload.is_empty() && !payload.ends_with('\n') {
        block.push('\n');
    }
    block.push_str("\\.\n");
    block
}

/// Fetch every row of `table` as text, header row first
///
/// NULL values become empty strings.
pub async fn fetch_records(client: &Client, table: &TableIdentifier) -> Result<Vec<Vec<String>>> {
    let columns = table_columns(client, table).await?;
    let select_list = columns
        .iter()
        .map(|c| format!("{}::text", quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");

    let rows = client
        .query(&format!("SELECT {} FROM {}", select_list, table), &[])
        .await
        .with_context(|| format!("Failed to fetch rows from {}", table))?;

    let mut records = Vec::with_capacity(rows.len() + 1);
    records.push(columns.into_iter().map(|c| c.name).collect::<Vec<_>>());
    for row in &rows {
        let record = (0..row.len())
            .map(|idx| row.get::<_, Option<String>>(idx).unwrap_or_default())
            .collect();
        records.push(record);
    }

    tracing::debug!("Fetched {} row(s) from {}", rows.len(), table);
    Ok(records)
}
