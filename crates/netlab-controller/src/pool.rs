//! Bounded fan-out of per-node operations.
//!
//! [`BatchPool`] runs one task per item on the tokio runtime with at most
//! `concurrency` tasks in flight. A failing item never stops its siblings:
//! every item runs to completion and the first failure (in item order) is
//! reported once all are done.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::ControllerError;

pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// A fixed-ceiling worker pool.
#[derive(Debug, Clone, Copy)]
pub struct BatchPool {
    concurrency: usize,
}

impl BatchPool {
    pub fn new(concurrency: usize) -> Self {
        BatchPool {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Runs `op` over every item and waits for all of them.
    pub async fn run<T, F, Fut>(&self, items: Vec<T>, op: F) -> Result<(), ControllerError>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<(), ControllerError>> + Send + 'static,
    {
        let total = items.len();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, item) in items.into_iter().enumerate() {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| ControllerError::InternalError(err.to_string()))?;
            let work = op(item);
            tasks.spawn(async move {
                let result = work.await;
                drop(permit);
                (index, result)
            });
        }

        let mut failures: Vec<(usize, ControllerError)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((index, Err(err))) => {
                    tracing::warn!("Batch item {} failed: {}", index, err);
                    failures.push((index, err));
                }
                Err(err) => {
                    tracing::warn!("Batch task aborted: {}", err);
                    failures.push((total, ControllerError::InternalError(err.to_string())));
                }
            }
        }

        failures.sort_by_key(|(index, _)| *index);
        match failures.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for BatchPool {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_CONCURRENCY)
    }
}
