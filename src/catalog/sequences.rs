// ABOUTME: Sequence script generation for serial-style columns
// ABOUTME: Follows pg_depend ownership from sequences to table columns

use super::TableIdentifier;
use crate::utils::{quote_ident, quote_literal};
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// A sequence owned by one column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLink {
    pub sequence_schema: String,
    pub sequence_name: String,
    pub column: String,
}

/// Script the sequences owned by the columns of `table`
///
/// Emits a `CREATE SEQUENCE` and a matching `SET DEFAULT nextval(...)` per
/// linked column, in column order.
pub async fn script_sequences(client: &Client, table: &TableIdentifier) -> Result<String> {
    let rows = client
        .query(
            "SELECT n.nspname::text, c.relname::text, a.attname::text
             FROM pg_catalog.pg_class c
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
             JOIN pg_catalog.pg_depend d
                ON d.objid = c.oid
               AND d.deptype = 'a'
               AND d.classid = 'pg_catalog.pg_class'::regclass
             JOIN pg_catalog.pg_attrdef ad
                ON ad.adrelid = d.refobjid AND ad.adnum = d.refobjsubid
             JOIN pg_catalog.pg_attribute a
                ON a.attrelid = d.refobjid AND a.attnum = d.refobjsubid
             JOIN pg_catalog.pg_class t ON t.oid = d.refobjid AND t.relkind = 'r'
             JOIN pg_catalog.pg_namespace tn ON tn.oid = t.relnamespace
             WHERE c.relkind = 'S'
               AND tn.nspname = $1
               AND t.relname = $2
             ORDER BY a.attnum",
            &[&table.schema, &table.name],
        )
        .await
        .with_context(|| format!("Failed to query sequences for {}", table))?;

    let links: Vec<SequenceLink> = rows
        .iter()
        .map(|row| SequenceLink {
            sequence_schema: row.get(0),
            sequence_name: row.get(1),
            column: row.get(2),
        })
        .collect();

    Ok(links.iter().map(|link| format_sequence(table, link)).collect())
}

/// Render the statements recreating one sequence and its column default
pub fn format_sequence(table: &TableIdentifier, link: &SequenceLink) -> String {
    let sequence = format!(
        "{}.{}",
        quote_ident(&link.sequence_schema),
        quote_ident(&link.sequence_name)
    );
    format!(
        "CREATE SEQUENCE {seq};\n\
         ALTER TABLE {table} ALTER COLUMN {column} SET DEFAULT nextval({literal}::regclass);\n",
        seq = sequence,
        table = table,
        column = quote_ident(&link.column),
        literal = quote_literal(&sequence),
    )
}
