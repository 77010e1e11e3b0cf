// ABOUTME: Index script generation from pg_indexes
// ABOUTME: Emits stored index definitions, skipping the implicit primary key index

use super::TableIdentifier;
use anyhow::{Context, Result};
use tokio_postgres::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub name: String,
    pub definition: String,
}

/// Script every index on `table` except the primary key's
pub async fn script_indexes(client: &Client, table: &TableIdentifier) -> Result<String> {
    let rows = client
        .query(
            "SELECT indexname::text, indexdef
             FROM pg_catalog.pg_indexes
             WHERE schemaname = $1 AND tablename = $2
             ORDER BY indexname",
            &[&table.schema, &table.name],
        )
        .await
        .with_context(|| format!("Failed to query indexes for {}", table))?;

    let records: Vec<IndexRecord> = rows
        .iter()
        .map(|row| IndexRecord {
            name: row.get(0),
            definition: row.get(1),
        })
        .collect();

    Ok(format_indexes(&records))
}

/// The primary key constraint creates `<table>_pkey`; it is scripted with the constraint
pub fn is_primary_key_index(name: &str) -> bool {
    name.ends_with("_pkey")
}

pub fn format_indexes(records: &[IndexRecord]) -> String {
    records
        .iter()
        .filter(|index| !is_primary_key_index(&index.name))
        .map(|index| format!("{};\n", index.definition))
        .collect()
}
