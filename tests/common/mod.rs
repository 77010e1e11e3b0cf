// ABOUTME: In-memory catalog shared by the dump engine tests
// ABOUTME: Serves canned DDL per table with injectable failures, delays and call tracking
#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use pg_catalog_dump::catalog::{Catalog, ConstraintKind, TableFilter, TableIdentifier};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const VIEWS: &str = "CREATE OR REPLACE VIEW public.recent AS\n SELECT 1;\n";
pub const ROUTINES: &str = "CREATE FUNCTION public.answer() RETURNS integer LANGUAGE sql AS 'SELECT 42';\n\n";

pub struct FakeCatalog {
    schema: String,
    tables: Vec<String>,
    failures: HashSet<(String, String)>,
    foreign_keys: HashMap<String, String>,
    delay: Duration,
    table_delays: HashMap<String, Duration>,
    events: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeCatalog {
    pub fn new(tables: &[&str]) -> Self {
        Self {
            schema: "public".to_string(),
            tables: tables.iter().map(|t| t.to_string()).collect(),
            failures: HashSet::new(),
            foreign_keys: HashMap::new(),
            delay: Duration::ZERO,
            table_delays: HashMap::new(),
            events: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Make `stage` fail for `table`
    ///
    /// Stages: create, sequences, constraints, indexes, triggers, data, records
    pub fn fail(mut self, table: &str, stage: &str) -> Self {
        self.failures.insert((table.to_string(), stage.to_string()));
        self
    }

    pub fn with_foreign_key(mut self, table: &str, references: &str) -> Self {
        self.foreign_keys
            .insert(table.to_string(), references.to_string());
        self
    }

    /// Delay applied to every per-table call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_table_delay(mut self, table: &str, delay: Duration) -> Self {
        self.table_delays.insert(table.to_string(), delay);
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    async fn call(&self, table: &TableIdentifier, stage: &str) -> Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let delay = self
            .table_delays
            .get(&table.name)
            .copied()
            .unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self
            .failures
            .contains(&(table.name.clone(), stage.to_string()))
        {
            bail!("injected {} failure for {}", stage, table.name);
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn server_version(&self) -> Result<String> {
        Ok("16.2".to_string())
    }

    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableIdentifier>> {
        Ok(filter.apply(&self.schema, self.tables.clone()))
    }

    async fn create_table(&self, table: &TableIdentifier) -> Result<String> {
        self.record(format!("start:{}", table.name));
        self.call(table, "create").await?;
        Ok(format!("CREATE TABLE {} (id integer);\n", table))
    }

    async fn sequences(&self, table: &TableIdentifier) -> Result<String> {
        self.call(table, "sequences").await?;
        Ok(format!("CREATE SEQUENCE public.{}_id_seq;\n", table.name))
    }

    async fn constraints(
        &self,
        table: &TableIdentifier,
        kinds: &[ConstraintKind],
    ) -> Result<String> {
        self.call(table, "constraints").await?;

        let mut out = String::new();
        if kinds.contains(&ConstraintKind::Primary) {
            out.push_str(&format!(
                "ALTER TABLE {} ADD CONSTRAINT {}_pkey PRIMARY KEY (id);\n",
                table, table.name
            ));
        }
        if kinds.contains(&ConstraintKind::Foreign) {
            if let Some(target) = self.foreign_keys.get(&table.name) {
                out.push_str(&format!(
                    "ALTER TABLE {} ADD CONSTRAINT {}_{}_fkey FOREIGN KEY (id) REFERENCES public.{}(id);\n",
                    table, table.name, target, target
                ));
            }
        }
        Ok(out)
    }

    async fn indexes(&self, table: &TableIdentifier) -> Result<String> {
        self.call(table, "indexes").await?;
        Ok(format!(
            "CREATE INDEX {}_idx ON {} (id);\n",
            table.name, table
        ))
    }

    async fn triggers(&self, table: &TableIdentifier) -> Result<String> {
        self.call(table, "triggers").await?;
        Ok(String::new())
    }

    async fn data_copy(&self, table: &TableIdentifier) -> Result<String> {
        self.call(table, "data").await?;
        self.record(format!("done:{}", table.name));
        Ok(format!("COPY {} (id) FROM stdin;\n1\n\\.\n", table))
    }

    async fn views(&self) -> Result<String> {
        self.record("views".to_string());
        Ok(VIEWS.to_string())
    }

    async fn routines(&self) -> Result<String> {
        self.record("routines".to_string());
        Ok(ROUTINES.to_string())
    }

    async fn fetch_records(&self, table: &TableIdentifier) -> Result<Vec<Vec<String>>> {
        self.record(format!("records:{}", table.name));
        self.call(table, "records").await?;
        Ok(vec![
            vec!["id".to_string(), "name".to_string()],
            vec!["1".to_string(), table.name.clone()],
        ])
    }
}

/// The script block a table produces with default options
pub fn table_block(name: &str) -> String {
    format!(
        "CREATE TABLE public.{name} (id integer);\n\n\
         CREATE SEQUENCE public.{name}_id_seq;\n\n\
         ALTER TABLE public.{name} ADD CONSTRAINT {name}_pkey PRIMARY KEY (id);\n\n\
         CREATE INDEX {name}_idx ON public.{name} (id);\n\n\
         \n\n\
         COPY public.{name} (id) FROM stdin;\n1\n\\.\n\n"
    )
}
