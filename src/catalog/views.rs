// ABOUTME: View script generation for a whole schema
// ABOUTME: Wraps pg_get_viewdef output in CREATE OR REPLACE VIEW statements

use crate::utils::quote_ident;
use anyhow::{Context, Result};
use tokio_postgres::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewRecord {
    pub schema: String,
    pub name: String,
    pub definition: String,
}

/// Script every view in `schema`
///
/// Views come out in creation (oid) order so a view built on another one
/// follows it.
pub async fn script_views(client: &Client, schema: &str) -> Result<String> {
    let rows = client
        .query(
            "SELECT c.relname::text, pg_get_viewdef(c.oid)
             FROM pg_catalog.pg_class c
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
             WHERE c.relkind = 'v' AND n.nspname = $1
             ORDER BY c.oid",
            &[&schema],
        )
        .await
        .with_context(|| format!("Failed to query views in schema '{}'", schema))?;

    Ok(rows
        .iter()
        .map(|row| {
            format_view(&ViewRecord {
                schema: schema.to_string(),
                name: row.get(0),
                definition: row.get(1),
            })
        })
        .collect())
}

pub fn format_view(record: &ViewRecord) -> String {
    let body = record.definition.trim().trim_end_matches(';').trim_end();
    format!(
        "CREATE OR REPLACE VIEW {}.{} AS\n{};\n",
        quote_ident(&record.schema),
        quote_ident(&record.name),
        body
    )
}
