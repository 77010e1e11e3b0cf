// ABOUTME: Catalog introspection module
// ABOUTME: Reconstructs DDL text from pg_catalog and defines the Catalog seam used by the dump engine

pub mod constraints;
pub mod data;
pub mod indexes;
pub mod routines;
pub mod sequences;
pub mod tables;
pub mod triggers;
pub mod views;

use crate::postgres::{self, Session};
use crate::utils::quote_ident;
use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::Pool;
use std::fmt;
use tokio_postgres::Client;

pub use constraints::{
    script_check_constraints, script_constraints, script_foreign_keys, script_primary_keys,
    script_unique_constraints, ConstraintKind, ConstraintRecord,
};
pub use data::{copy_column_list, data_copy_statement, fetch_records};
pub use indexes::{script_indexes, IndexRecord};
pub use routines::{script_routines, FunctionRecord};
pub use sequences::{script_sequences, SequenceLink};
pub use tables::{
    create_table_statement, list_tables, server_version, ColumnDefinition, Generated, Identity,
    TableFilter,
};
pub use triggers::{script_triggers, TriggerRecord};
pub use views::{script_views, ViewRecord};

/// A table resolved against the job's schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentifier {
    pub schema: String,
    pub name: String,
}

impl TableIdentifier {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

/// Every catalog query the dump engine issues
///
/// [`PgCatalog`] answers these from a live server. Each per-table method
/// returns ready-to-execute text for one category of objects; the engine
/// never interprets the text it receives.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Schema every query is resolved against
    fn schema(&self) -> &str;

    async fn server_version(&self) -> Result<String>;

    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableIdentifier>>;

    async fn create_table(&self, table: &TableIdentifier) -> Result<String>;

    async fn sequences(&self, table: &TableIdentifier) -> Result<String>;

    async fn constraints(
        &self,
        table: &TableIdentifier,
        kinds: &[ConstraintKind],
    ) -> Result<String>;

    async fn indexes(&self, table: &TableIdentifier) -> Result<String>;

    async fn triggers(&self, table: &TableIdentifier) -> Result<String>;

    /// `COPY ... FROM stdin` block carrying the table's rows
    async fn data_copy(&self, table: &TableIdentifier) -> Result<String>;

    async fn views(&self) -> Result<String>;

    async fn routines(&self) -> Result<String>;

    /// Column-name header followed by every row as text
    async fn fetch_records(&self, table: &TableIdentifier) -> Result<Vec<Vec<String>>>;
}

/// [`Catalog`] backed by a live PostgreSQL server
///
/// Every query runs on its own pooled session. With a snapshot, the
/// coordinating connection exports it and each session imports it into a
/// private repeatable-read transaction, so all workers read one consistent
/// state while a failing query only aborts the session that issued it.
pub struct PgCatalog {
    coordinator: Client,
    pool: Pool,
    schema: String,
    snapshot: Option<String>,
}

impl PgCatalog {
    /// Connect to `source` and prepare up to `sessions` worker sessions
    pub async fn open(
        source: &str,
        schema: impl Into<String>,
        sessions: usize,
        snapshot: bool,
    ) -> Result<Self> {
        let coordinator = postgres::connect_with_retry(source)
            .await
            .context("Failed to connect to source database")?;
        let snapshot = if snapshot {
            Some(postgres::export_snapshot(&coordinator).await?)
        } else {
            None
        };
        let pool = postgres::create_pool(source, sessions, snapshot.is_some())?;

        Ok(Self {
            coordinator,
            pool,
            schema: schema.into(),
            snapshot,
        })
    }

    /// Release the exported snapshot once no worker needs it
    pub async fn close(&self) -> Result<()> {
        self.pool.close();
        if self.snapshot.is_some() {
            postgres::end_snapshot(&self.coordinator).await?;
        }
        Ok(())
    }

    async fn session(&self) -> Result<Session> {
        Session::open(&self.pool, self.snapshot.as_deref()).await
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn server_version(&self) -> Result<String> {
        server_version(&self.coordinator).await
    }

    async fn list_tables(&self, filter: &TableFilter) -> Result<Vec<TableIdentifier>> {
        let session = self.session().await?;
        let result = list_tables(session.client(), &self.schema, filter).await;
        session.close(result).await
    }

    async fn create_table(&self, table: &TableIdentifier) -> Result<String> {
        let session = self.session().await?;
        let result = create_table_statement(session.client(), table).await;
        session.close(result).await
    }

    async fn sequences(&self, table: &TableIdentifier) -> Result<String> {
        let session = self.session().await?;
        let result = script_sequences(session.client(), table).await;
        session.close(result).await
    }

    async fn constraints(
        &self,
        table: &TableIdentifier,
        kinds: &[ConstraintKind],
    ) -> Result<String> {
        let session = self.session().await?;
        let result = script_constraints(session.client(), table, kinds).await;
        session.close(result).await
    }

    async fn indexes(&self, table: &TableIdentifier) -> Result<String> {
        let session = self.session().await?;
        let result = script_indexes(session.client(), table).await;
        session.close(result).await
    }

    async fn triggers(&self, table: &TableIdentifier) -> Result<String> {
        let session = self.session().await?;
        let result = script_triggers(session.client(), table).await;
        session.close(result).await
    }

    async fn data_copy(&self, table: &TableIdentifier) -> Result<String> {
        let session = self.session().await?;
        let result = data_copy_statement(session.client(), table).await;
        session.close(result).await
    }

    async fn views(&self) -> Result<String> {
        let session = self.session().await?;
        let result = script_views(session.client(), &self.schema).await;
        session.close(result).await
    }

    async fn routines(&self) -> Result<String> {
        let session = self.session().await?;
        let result = script_routines(session.client(), &self.schema).await;
        session.close(result).await
    }

    async fn fetch_records(&self, table: &TableIdentifier) -> Result<Vec<Vec<String>>> {
        let session = self.session().await?;
        let result = fetch_records(session.client(), table).await;
        session.close(result).await
    }
}
