// ABOUTME: Per-table script pipeline
// ABOUTME: Runs the catalog stages for one table in fixed order and assembles an all-or-nothing block

use crate::catalog::{Catalog, ConstraintKind, TableIdentifier};
use anyhow::{Context, Result};
use std::fmt;

/// One stage of a table script, also the kind of the fragment it produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Create,
    Sequences,
    Constraints,
    ForeignKeys,
    Indexes,
    Triggers,
    Data,
}

impl FragmentKind {
    /// Stages in script order
    pub fn stages(defer_foreign_keys: bool) -> &'static [FragmentKind] {
        use FragmentKind::*;
        if defer_foreign_keys {
            &[Create, Sequences, Constraints, ForeignKeys, Indexes, Triggers, Data]
        } else {
            &[Create, Sequences, Constraints, Indexes, Triggers, Data]
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FragmentKind::Create => "create statement",
            FragmentKind::Sequences => "sequences",
            FragmentKind::Constraints => "constraints",
            FragmentKind::ForeignKeys => "foreign keys",
            FragmentKind::Indexes => "indexes",
            FragmentKind::Triggers => "triggers",
            FragmentKind::Data => "data",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFragment {
    pub kind: FragmentKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Produce foreign keys as a separate fragment instead of with the other constraints
    pub defer_foreign_keys: bool,
}

/// Every fragment of one table, in script order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableScript {
    pub table: TableIdentifier,
    pub fragments: Vec<ScriptFragment>,
}

impl TableScript {
    /// The table block: each fragment followed by a blank line
    ///
    /// A deferred foreign-key fragment is not part of the block, see
    /// [`TableScript::foreign_keys`].
    pub fn body(&self) -> String {
        let mut out = String::new();
        for fragment in &self.fragments {
            if fragment.kind == FragmentKind::ForeignKeys {
                continue;
            }
            out.push_str(fragment.text.trim_end());
            out.push_str("\n\n");
        }
        out
    }

    pub fn foreign_keys(&self) -> Option<&str> {
        self.fragments
            .iter()
            .find(|f| f.kind == FragmentKind::ForeignKeys)
            .map(|f| f.text.as_str())
            .filter(|text| !text.trim().is_empty())
    }
}

/// Script one table
///
/// Stages run strictly in order; the first failing stage aborts the table and
/// nothing of it is returned.
pub async fn script_table<C>(
    catalog: &C,
    table: &TableIdentifier,
    options: &PipelineOptions,
) -> Result<TableScript>
where
    C: Catalog + ?Sized,
{
    let stages = FragmentKind::stages(options.defer_foreign_keys);
    let mut fragments = Vec::with_capacity(stages.len());

    for &kind in stages {
        let text = run_stage(catalog, table, kind, options)
            .await
            .with_context(|| format!("Failed to script {} for {}", kind, table))?;
        fragments.push(ScriptFragment { kind, text });
    }

    tracing::debug!("Scripted {}", table);
    Ok(TableScript {
        table: table.clone(),
        fragments,
    })
}

async fn run_stage<C>(
    catalog: &C,
    table: &TableIdentifier,
    kind: FragmentKind,
    options: &PipelineOptions,
) -> Result<String>
where
    C: Catalog + ?Sized,
{
    match kind {
        FragmentKind::Create => catalog.create_table(table).await,
        FragmentKind::Sequences => catalog.sequences(table).await,
        FragmentKind::Constraints if options.defer_foreign_keys => {
            catalog.constraints(table, &ConstraintKind::LOCAL).await
        }
        FragmentKind::Constraints => catalog.constraints(table, &ConstraintKind::ALL).await,
        FragmentKind::ForeignKeys => {
            catalog
                .constraints(table, &[ConstraintKind::Foreign])
                .await
        }
        FragmentKind::Indexes => catalog.indexes(table).await,
        FragmentKind::Triggers => catalog.triggers(table).await,
        FragmentKind::Data => catalog.data_copy(table).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(kind: FragmentKind, text: &str) -> ScriptFragment {
        ScriptFragment {
            kind,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_stage_order() {
        use FragmentKind::*;
        assert_eq!(
            FragmentKind::stages(false),
            &[Create, Sequences, Constraints, Indexes, Triggers, Data]
        );
        assert_eq!(
            FragmentKind::stages(true),
            &[Create, Sequences, Constraints, ForeignKeys, Indexes, Triggers, Data]
        );
    }

    #[test]
    fn test_body_separates_fragments_with_blank_lines() {
        let script = TableScript {
            table: TableIdentifier::new("public", "t"),
            fragments: vec![
                fragment(FragmentKind::Create, "CREATE TABLE public.t (\n    id integer\n);"),
                fragment(FragmentKind::Sequences, ""),
                fragment(FragmentKind::Constraints, "ALTER TABLE public.t ADD CONSTRAINT t_pkey PRIMARY KEY (id);\n"),
            ],
        };

        assert_eq!(
            script.body(),
            "CREATE TABLE public.t (\n    id integer\n);\n\n\
             \n\n\
             ALTER TABLE public.t ADD CONSTRAINT t_pkey PRIMARY KEY (id);\n\n"
        );
        assert_eq!(script.foreign_keys(), None);
    }

    #[test]
    fn test_deferred_foreign_keys_leave_the_body() {
        let script = TableScript {
            table: TableIdentifier::new("public", "orders"),
            fragments: vec![
                fragment(FragmentKind::Create, "CREATE TABLE public.orders ();"),
                fragment(
                    FragmentKind::ForeignKeys,
                    "ALTER TABLE public.orders ADD CONSTRAINT orders_customer_id_fkey FOREIGN KEY (customer_id) REFERENCES customers(id);\n",
                ),
            ],
        };

        assert!(!script.body().contains("FOREIGN KEY"));
        assert!(script.foreign_keys().unwrap().contains("orders_customer_id_fkey"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(FragmentKind::Create.to_string(), "create statement");
        assert_eq!(FragmentKind::ForeignKeys.to_string(), "foreign keys");
    }
}
