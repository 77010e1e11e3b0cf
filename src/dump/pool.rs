// ABOUTME: Bounded worker pool shared by the schema and CSV coordinators
// ABOUTME: Runs batches sequentially, items within a batch concurrently, under an explicit error policy

use super::chunk::chunk_tables;
use anyhow::{anyhow, Result};
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// What a batch does when one of its workers fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Record the failure and let every other worker finish
    Continue,
    /// Cancel the rest of the batch and stop before the next one
    Abort,
}

/// Result of a pool run under [`ErrorPolicy::Continue`]
#[derive(Debug)]
pub struct PoolOutcome<T> {
    pub completed: usize,
    /// Failed items with their submission index, in completion order
    pub failures: Vec<(usize, T, anyhow::Error)>,
}

enum TaskOutcome {
    Done,
    Failed(anyhow::Error),
    Cancelled,
}

/// Run `worker` over `items` in batches of `batch_size`
///
/// The worker receives the item's submission index and a clone of the item.
/// A batch is joined completely before the next one starts, so no more than
/// `batch_size` workers are ever live. Under [`ErrorPolicy::Abort`] the first
/// failure cancels the batch's remaining workers and is returned as the error;
/// later batches never start.
pub async fn run_batches<T, F, Fut>(
    items: &[T],
    batch_size: usize,
    policy: ErrorPolicy,
    worker: F,
) -> Result<PoolOutcome<T>>
where
    T: Clone + Send + 'static,
    F: Fn(usize, T) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let batch_size = isize::try_from(batch_size).unwrap_or(isize::MAX);
    let batches = chunk_tables(items, batch_size);
    let batch_count = batches.len();
    let mut outcome = PoolOutcome {
        completed: 0,
        failures: Vec::new(),
    };
    let mut offset = 0;

    for (batch_idx, batch) in batches.into_iter().enumerate() {
        tracing::debug!(
            "Starting batch {}/{} ({} item(s))",
            batch_idx + 1,
            batch_count,
            batch.len()
        );

        let cancel = CancellationToken::new();
        let mut set = JoinSet::new();

        for (pos, item) in batch.iter().enumerate() {
            let seq = offset + pos;
            let work = worker(seq, item.clone());
            let item = item.clone();
            let cancel = cancel.clone();

            set.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => TaskOutcome::Cancelled,
                    result = AssertUnwindSafe(work).catch_unwind() => match result {
                        Ok(Ok(())) => TaskOutcome::Done,
                        Ok(Err(e)) => TaskOutcome::Failed(e),
                        Err(_) => TaskOutcome::Failed(anyhow!("worker panicked")),
                    },
                };
                (seq, item, result)
            });
        }
        offset += batch.len();

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let (seq, item, result) = joined.map_err(|e| anyhow!("worker task failed: {}", e))?;
            match result {
                TaskOutcome::Done => outcome.completed += 1,
                TaskOutcome::Cancelled => {}
                TaskOutcome::Failed(e) => match policy {
                    ErrorPolicy::Continue => outcome.failures.push((seq, item, e)),
                    ErrorPolicy::Abort => {
                        if first_error.is_none() {
                            cancel.cancel();
                            first_error = Some(e);
                        }
                    }
                },
            }
        }

        if let Some(e) = first_error {
            tracing::debug!(
                "Batch {}/{} failed, skipping {} remaining batch(es)",
                batch_idx + 1,
                batch_count,
                batch_count - batch_idx - 1
            );
            return Err(e);
        }
    }

    Ok(outcome)
}
