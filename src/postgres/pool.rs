// ABOUTME: Pool of worker sessions for the dump engine
// ABOUTME: One pooled connection per concurrent catalog query, each optionally pinned to an exported snapshot

use super::connection::{parse_config, tls_connector};
use super::snapshot::import_snapshot;
use anyhow::{Context, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};

/// Build the worker session pool for `connection_string`
///
/// With `snapshot` set, sessions are rolled back when they return to the pool,
/// so a worker cancelled mid-transaction never hands an open transaction to
/// the next one.
pub fn create_pool(connection_string: &str, max_size: usize, snapshot: bool) -> Result<Pool> {
    let pg_config = parse_config(connection_string)?;

    let recycling_method = if snapshot {
        RecyclingMethod::Custom("ROLLBACK".to_string())
    } else {
        RecyclingMethod::Fast
    };
    let mgr = Manager::from_config(pg_config, tls_connector()?, ManagerConfig { recycling_method });

    Pool::builder(mgr)
        .max_size(max_size.max(1))
        .build()
        .context("Failed to build session pool")
}

/// A pooled session, inside its own snapshot transaction when one was requested
pub struct Session {
    client: Object,
    in_transaction: bool,
}

impl Session {
    /// Check a session out of `pool`, importing `snapshot` if given
    pub async fn open(pool: &Pool, snapshot: Option<&str>) -> Result<Self> {
        let client = pool
            .get()
            .await
            .context("Failed to get a session from the pool")?;

        if let Some(id) = snapshot {
            import_snapshot(&client, id).await?;
        }

        Ok(Self {
            client,
            in_transaction: snapshot.is_some(),
        })
    }

    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }

    /// End the session's transaction and pass `result` through
    ///
    /// A failed query aborts only this session's transaction; it is rolled
    /// back here and the session goes back to the pool clean.
    pub async fn close<T>(self, result: Result<T>) -> Result<T> {
        if !self.in_transaction {
            return result;
        }

        let end = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };
        if let Err(e) = self.client.batch_execute(end).await {
            match &result {
                Ok(_) => return Err(e).context("Failed to commit session transaction"),
                Err(_) => tracing::debug!("Rollback after failed query: {}", e),
            }
        }
        result
    }
}
