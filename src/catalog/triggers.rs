// ABOUTME: Trigger script generation from pg_trigger
// ABOUTME: Emits pg_get_triggerdef output for user-defined triggers of a table

use super::TableIdentifier;
use anyhow::{Context, Result};
use tokio_postgres::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRecord {
    pub name: String,
    pub definition: String,
}

/// Script the non-internal triggers of `table`
///
/// Internal triggers back foreign keys and are recreated by the constraints
/// themselves, so they are skipped.
pub async fn script_triggers(client: &Client, table: &TableIdentifier) -> Result<String> {
    let rows = client
        .query(
            "SELECT t.tgname::text, pg_get_triggerdef(t.oid)
             FROM pg_catalog.pg_trigger t
             JOIN pg_catalog.pg_class rel ON rel.oid = t.tgrelid
             JOIN pg_catalog.pg_namespace nsp ON nsp.oid = rel.relnamespace
             WHERE nsp.nspname = $1
               AND rel.relname = $2
               AND NOT t.tgisinternal
             ORDER BY t.tgname",
            &[&table.schema, &table.name],
        )
        .await
        .with_context(|| format!("Failed to query triggers for {}", table))?;

    Ok(rows
        .iter()
        .map(|row| {
            format_trigger(&TriggerRecord {
                name: row.get(0),
                definition: row.get(1),
            })
        })
        .collect())
}

pub fn format_trigger(record: &TriggerRecord) -> String {
    format!("{};\n", record.definition)
}
