// ABOUTME: Constraint script generation from pg_constraint
// ABOUTME: Rebuilds primary, unique, check and foreign key constraints with pg_get_constraintdef

use super::TableIdentifier;
use crate::utils::quote_ident;
use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Constraint categories the dump reproduces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Primary,
    Unique,
    Check,
    Foreign,
}

impl ConstraintKind {
    /// Every kind, in script order
    pub const ALL: [ConstraintKind; 4] = [
        ConstraintKind::Primary,
        ConstraintKind::Unique,
        ConstraintKind::Check,
        ConstraintKind::Foreign,
    ];

    /// Kinds that only reference the table itself
    pub const LOCAL: [ConstraintKind; 3] = [
        ConstraintKind::Primary,
        ConstraintKind::Unique,
        ConstraintKind::Check,
    ];

    /// `pg_constraint.contype` code
    pub fn code(self) -> &'static str {
        match self {
            ConstraintKind::Primary => "p",
            ConstraintKind::Unique => "u",
            ConstraintKind::Check => "c",
            ConstraintKind::Foreign => "f",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "p" => Some(ConstraintKind::Primary),
            "u" => Some(ConstraintKind::Unique),
            "c" => Some(ConstraintKind::Check),
            "f" => Some(ConstraintKind::Foreign),
            _ => None,
        }
    }
}

/// One constraint row with its reconstructed definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRecord {
    pub name: String,
    pub kind: ConstraintKind,
    pub definition: String,
}

/// Script the constraints of `table` whose kind is in `kinds`
///
/// Output order is primary, unique, check, foreign, then constraint name.
pub async fn script_constraints(
    client: &Client,
    table: &TableIdentifier,
    kinds: &[ConstraintKind],
) -> Result<String> {
    if kinds.is_empty() {
        return Ok(String::new());
    }

    let codes: Vec<String> = kinds.iter().map(|k| k.code().to_string()).collect();
    let rows = client
        .query(
            "SELECT con.conname::text,
                    con.contype::text,
                    pg_get_constraintdef(con.oid)
             FROM pg_catalog.pg_constraint con
             JOIN pg_catalog.pg_class rel ON rel.oid = con.conrelid
             JOIN pg_catalog.pg_namespace nsp ON nsp.oid = rel.relnamespace
             WHERE nsp.nspname = $1
               AND rel.relname = $2
               AND con.contype::text = ANY($3)
             ORDER BY CASE con.contype
                        WHEN 'p' THEN 0
                        WHEN 'u' THEN 1
                        WHEN 'c' THEN 2
                        ELSE 3
                      END,
                      con.conname",
            &[&table.schema, &table.name, &codes],
        )
        .await
        .with_context(|| format!("Failed to query constraints for {}", table))?;

    let mut script = String::new();
    for row in &rows {
        let code: String = row.get(1);
        let Some(kind) = ConstraintKind::from_code(&code) else {
            continue;
        };
        let record = ConstraintRecord {
            name: row.get(0),
            kind,
            definition: row.get(2),
        };
        script.push_str(&format_constraint(table, &record));
    }

    Ok(script)
}

pub async fn script_primary_keys(client: &Client, table: &TableIdentifier) -> Result<String> {
    script_constraints(client, table, &[ConstraintKind::Primary]).await
}

pub async fn script_foreign_keys(client: &Client, table: &TableIdentifier) -> Result<String> {
    script_constraints(client, table, &[ConstraintKind::Foreign]).await
}

pub async fn script_unique_constraints(
    client: &Client,
    table: &TableIdentifier,
) -> Result<String> {
    script_constraints(client, table, &[ConstraintKind::Unique]).await
}

pub async fn script_check_constraints(
    client: &Client,
    table: &TableIdentifier,
) -> Result<String> {
    script_constraints(client, table, &[ConstraintKind::Check]).await
}

pub fn format_constraint(table: &TableIdentifier, record: &ConstraintRecord) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {};\n",
        table,
        quote_ident(&record.name),
        record.definition
    )
}
