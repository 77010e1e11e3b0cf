// ABOUTME: Table discovery and CREATE TABLE reconstruction
// ABOUTME: Lists the schema's tables, applies include/exclude filters and rebuilds column definitions

use super::TableIdentifier;
use crate::utils::quote_ident;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tokio_postgres::Client;

/// Include/exclude rules applied to the table list
///
/// Names are matched exactly against the unqualified table name. An empty
/// `include` list selects every table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TableFilter {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl TableFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn matches(&self, table: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|t| t == table);
        included && !self.exclude.iter().any(|t| t == table)
    }

    /// Keep the matching names, preserving their order
    pub fn apply<I>(&self, schema: &str, names: I) -> Vec<TableIdentifier>
    where
        I: IntoIterator<Item = String>,
    {
        names
            .into_iter()
            .filter(|name| self.matches(name))
            .map(|name| TableIdentifier::new(schema, name))
            .collect()
    }
}

/// `pg_attribute.attidentity`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Always,
    ByDefault,
}

impl Identity {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(Identity::Always),
            "d" => Some(Identity::ByDefault),
            _ => None,
        }
    }

    fn clause(self) -> &'static str {
        match self {
            Identity::Always => "GENERATED ALWAYS AS IDENTITY",
            Identity::ByDefault => "GENERATED BY DEFAULT AS IDENTITY",
        }
    }
}

/// `pg_attribute.attgenerated`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generated {
    Stored,
    Virtual,
}

impl Generated {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(Generated::Stored),
            "v" => Some(Generated::Virtual),
            _ => None,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            Generated::Stored => "STORED",
            Generated::Virtual => "VIRTUAL",
        }
    }
}

/// One column as stored in pg_attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    /// Default expression, or the generation expression of a generated column
    pub default: Option<String>,
    pub identity: Option<Identity>,
    pub generated: Option<Generated>,
}

impl ColumnDefinition {
    /// Generated columns are computed on insert and rejected by `COPY`
    pub fn holds_data(&self) -> bool {
        self.generated.is_none()
    }
}

/// List the tables of `schema` that pass `filter`, ordered by name
pub async fn list_tables(
    client: &Client,
    schema: &str,
    filter: &TableFilter,
) -> Result<Vec<TableIdentifier>> {
    let rows = client
        .query(
            "SELECT tablename::text
             FROM pg_catalog.pg_tables
             WHERE schemaname = $1
             ORDER BY tablename",
            &[&schema],
        )
        .await
        .with_context(|| format!("Failed to list tables in schema '{}'", schema))?;

    let tables = filter.apply(schema, rows.iter().map(|row| row.get::<_, String>(0)));
    tracing::debug!(
        "Schema '{}': {} table(s) found, {} selected",
        schema,
        rows.len(),
        tables.len()
    );
    Ok(tables)
}

/// Version string reported by the server
pub async fn server_version(client: &Client) -> Result<String> {
    let row = client
        .query_one("SHOW server_version", &[])
        .await
        .context("Failed to query server version")?;
    Ok(row.get(0))
}

/// Live columns of a table in attribute order
pub(crate) async fn table_columns(
    client: &Client,
    table: &TableIdentifier,
) -> Result<Vec<ColumnDefinition>> {
    let rows = client
        .query(
            "SELECT a.attname::text,
                    format_type(a.atttypid, a.atttypmod),
                    a.attnotnull,
                    pg_get_expr(ad.adbin, ad.adrelid),
                    a.attidentity::text,
                    a.attgenerated::text
             FROM pg_catalog.pg_attribute a
             JOIN pg_catalog.pg_class c ON c.oid = a.attrelid
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
             LEFT JOIN pg_catalog.pg_attrdef ad
                ON ad.adrelid = a.attrelid AND ad.adnum = a.attnum
             WHERE n.nspname = $1
               AND c.relname = $2
               AND a.attnum > 0
               AND NOT a.attisdropped
             ORDER BY a.attnum",
            &[&table.schema, &table.name],
        )
        .await
        .with_context(|| format!("Failed to query columns for {}", table))?;

    if rows.is_empty() {
        bail!("Table {} has no columns or does not exist", table);
    }

    Ok(rows
        .iter()
        .map(|row| ColumnDefinition {
            name: row.get(0),
            data_type: row.get(1),
            not_null: row.get(2),
            default: row.get(3),
            identity: Identity::from_code(row.get(4)),
            generated: Generated::from_code(row.get(5)),
        })
        .collect())
}

/// Rebuild the `CREATE TABLE` statement of a table
pub async fn create_table_statement(client: &Client, table: &TableIdentifier) -> Result<String> {
    let columns = table_columns(client, table).await?;
    Ok(format_create_table(table, &columns))
}

/// Render a `CREATE TABLE` statement
///
/// Sequence-backed defaults (`nextval(...)`) are left out: the sequence does
/// not exist yet at this point of the script, the sequence fragment re-adds
/// them once it is created. Identity columns carry their own sequence.
pub fn format_create_table(table: &TableIdentifier, columns: &[ColumnDefinition]) -> String {
    let body = columns
        .iter()
        .map(|column| {
            let mut line = format!("    {} {}", quote_ident(&column.name), column.data_type);
            match (column.generated, column.identity, column.default.as_deref()) {
                (Some(generated), _, Some(expr)) => {
                    line.push_str(&format!(
                        " GENERATED ALWAYS AS ({}) {}",
                        expr,
                        generated.keyword()
                    ));
                }
                (None, Some(identity), _) => {
                    line.push(' ');
                    line.push_str(identity.clause());
                }
                (None, None, Some(default)) if !default.starts_with("nextval(") => {
                    line.push_str(" DEFAULT ");
                    line.push_str(default);
                }
                _ => {}
            }
            if column.not_null {
                line.push_str(" NOT NULL");
            }
            line
        })
        .collect::<Vec<_>>()
        .join(",\n");

    format!("CREATE TABLE {} (\n{}\n);", table, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, not_null: bool, default: Option<&str>) -> ColumnDefinition {
        ColumnDefinition {
            name: name.to_string(),
            data_type: data_type.to_string(),
            not_null,
            default: default.map(str::to_string),
            identity: None,
            generated: None,
        }
    }

    #[test]
    fn test_filter_matches() {
        let all = TableFilter::default();
        assert!(all.matches("customers"));

        let only = TableFilter::new(vec!["customers".to_string()], vec![]);
        assert!(only.matches("customers"));
        assert!(!only.matches("orders"));

        let without = TableFilter::new(vec![], vec!["audit_log".to_string()]);
        assert!(without.matches("customers"));
        assert!(!without.matches("audit_log"));

        let both = TableFilter::new(
            vec!["customers".to_string(), "orders".to_string()],
            vec!["orders".to_string()],
        );
        assert!(both.matches("customers"));
        assert!(!both.matches("orders"));
    }

    #[test]
    fn test_filter_apply_preserves_order() {
        let filter = TableFilter::new(vec![], vec!["b".to_string()]);
        let names = vec!["c".to_string(), "b".to_string(), "a".to_string()];
        let tables = filter.apply("public", names);
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
        assert!(tables.iter().all(|t| t.schema == "public"));
    }

    #[test]
    fn test_format_create_table() {
        let table = TableIdentifier::new("public", "customers");
        let columns = vec![
            column(
                "id",
                "integer",
                true,
                Some("nextval('customers_id_seq'::regclass)"),
            ),
            column("name", "text", false, None),
            column("created_at", "timestamp with time zone", true, Some("now()")),
        ];

        assert_eq!(
            format_create_table(&table, &columns),
            "CREATE TABLE public.customers (\n\
             \x20   id integer NOT NULL,\n\
             \x20   name text,\n\
             \x20   created_at timestamp with time zone DEFAULT now() NOT NULL\n\
             );"
        );
    }

    #[test]
    fn test_format_create_table_generated_and_identity() {
        let table = TableIdentifier::new("public", "gen");
        let mut id = column("id", "integer", true, None);
        id.identity = Some(Identity::Always);
        let mut code = column("code", "bigint", true, None);
        code.identity = Some(Identity::ByDefault);
        let x = column("x", "integer", false, None);
        let mut y = column("y", "integer", false, Some("(x * 2)"));
        y.generated = Some(Generated::Stored);

        assert_eq!(
            format_create_table(&table, &[id, code, x, y.clone()]),
            "CREATE TABLE public.gen (\n\
             \x20   id integer GENERATED ALWAYS AS IDENTITY NOT NULL,\n\
             \x20   code bigint GENERATED BY DEFAULT AS IDENTITY NOT NULL,\n\
             \x20   x integer,\n\
             \x20   y integer GENERATED ALWAYS AS ((x * 2)) STORED\n\
             );"
        );
        assert!(!y.holds_data());
    }

    #[test]
    fn test_column_codes() {
        assert_eq!(Identity::from_code("a"), Some(Identity::Always));
        assert_eq!(Identity::from_code("d"), Some(Identity::ByDefault));
        assert_eq!(Identity::from_code(""), None);
        assert_eq!(Generated::from_code("s"), Some(Generated::Stored));
        assert_eq!(Generated::from_code("v"), Some(Generated::Virtual));
        assert_eq!(Generated::from_code(""), None);
    }

    #[test]
    fn test_format_create_table_quotes_columns() {
        let table = TableIdentifier::new("public", "events");
        let columns = vec![column("order", "integer", false, None)];
        assert_eq!(
            format_create_table(&table, &columns),
            "CREATE TABLE public.events (\n    \"order\" integer\n);"
        );
    }
}
