//! Bounded-concurrency executor
//!
//! Runs one async job per item with at most `limit` jobs in flight. The
//! first error stops the batch: no further jobs are started and jobs still in
//! flight are dropped.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};

/// Fixed cap on simultaneously in-flight jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedExecutor {
    limit: usize,
}

impl BoundedExecutor {
    /// Create an executor; a limit of 0 is treated as 1
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    /// Effective concurrency limit
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run `job` for every item, collecting results in completion order
    pub async fn run<I, F, Fut, R, E>(&self, items: I, job: F) -> Result<Vec<R>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        stream::iter(items)
            .map(job)
            .buffer_unordered(self.limit)
            .try_collect()
            .await
    }

    /// Run `job` for every item, collecting results in input order
    pub async fn run_ordered<I, F, Fut, R, E>(&self, items: I, job: F) -> Result<Vec<R>, E>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        stream::iter(items)
            .map(job)
            .buffered(self.limit)
            .try_collect()
            .await
    }
}
