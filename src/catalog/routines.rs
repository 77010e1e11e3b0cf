// ABOUTME: Function and procedure script generation for a whole schema
// ABOUTME: Emits pg_get_functiondef output for routines not owned by an extension

use anyhow::{Context, Result};
use tokio_postgres::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRecord {
    pub name: String,
    pub definition: String,
}

/// Script every plain function and procedure in `schema`
///
/// Aggregates and window functions are skipped since `pg_get_functiondef`
/// rejects them; so are routines that belong to an installed extension.
pub async fn script_routines(client: &Client, schema: &str) -> Result<String> {
    let rows = client
        .query(
            "SELECT p.proname::text, pg_get_functiondef(p.oid)
             FROM pg_catalog.pg_proc p
             JOIN pg_catalog.pg_namespace n ON n.oid = p.pronamespace
             WHERE n.nspname = $1
               AND p.prokind IN ('f', 'p')
               AND NOT EXISTS (
                   SELECT 1
                   FROM pg_catalog.pg_depend d
                   WHERE d.classid = 'pg_catalog.pg_proc'::regclass
                     AND d.objid = p.oid
                     AND d.deptype = 'e'
               )
             ORDER BY p.proname, p.oid",
            &[&schema],
        )
        .await
        .with_context(|| format!("Failed to query functions and procedures in schema '{}'", schema))?;

    Ok(rows
        .iter()
        .map(|row| {
            format_routine(&FunctionRecord {
                name: row.get(0),
                definition: row.get(1),
            })
        })
        .collect())
}

/// `pg_get_functiondef` output has no terminating semicolon
pub fn format_routine(record: &FunctionRecord) -> String {
    format!("{};\n\n", record.definition.trim_end())
}
