//! Bounded retry with exponential backoff for store calls.
//!
//! [`RetryPolicy`] decides how many times a call is attempted and how long to wait in
//! between. [`ResilientConnection`] applies a policy to every primitive of a wrapped
//! [`StoreConnection`], so both repository facades share the same fault handling.
//!
//! Only [`RepositoryError::Transient`] faults are retried. Anything else is returned on
//! the first occurrence.

use async_trait::async_trait;
use bson::Bson;
use rand::Rng;
use std::{future::Future, time::Duration};
use tracing::{debug, warn};

use crate::{
    backend::StoreConnection,
    config::RetryConfig,
    entity::PartitionKey,
    error::{RepositoryError, RepositoryResult},
    page::Page,
    query::Statement,
};

/// How often and how patiently a store call is retried.
///
/// `max_attempts` counts the first call, so a policy of 3 tolerates two transient faults.
/// The wait before attempt `n + 1` is `base_delay * 2^(n - 1)`, capped at `max_delay`,
/// plus a random jitter of up to half that delay when jitter is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default delays and the given attempt bound (minimum 1).
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1), ..Self::default() }
    }

    /// A policy that calls once and never retries.
    pub fn never() -> Self {
        Self::new(1)
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the un-jittered wait after the `attempt`-th failed call (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);

        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    fn delay(&self, attempt: u32) -> Duration {
        let backoff = self.backoff(attempt);
        let spread = (backoff / 2).as_millis() as u64;

        if self.jitter && spread > 0 {
            backoff + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
        } else {
            backoff
        }
    }

    /// Runs `call` until it succeeds, fails with a non-transient error, or the attempt
    /// bound is reached.
    ///
    /// `operation` names the call in log events.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> RepositoryResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RepositoryResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let err = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Store call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            if attempt >= self.max_attempts {
                warn!(
                    operation,
                    attempts = attempt,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(RepositoryError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                });
            }

            let delay = self.delay(attempt);
            warn!(
                operation,
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Transient store fault, will retry"
            );

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts)
            .with_base_delay(Duration::from_millis(config.base_delay_ms))
            .with_max_delay(Duration::from_millis(config.max_delay_ms))
            .with_jitter(config.jitter)
    }
}

/// A [`StoreConnection`] that retries every call of the wrapped connection under a
/// [`RetryPolicy`].
///
/// Streaming queries inherit the behavior page by page: each page fetch is retried
/// independently, and elements already yielded are never re-fetched.
#[derive(Debug)]
pub struct ResilientConnection<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: StoreConnection> ResilientConnection<C> {
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: StoreConnection> StoreConnection for ResilientConnection<C> {
    async fn point_read(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> RepositoryResult<Option<Bson>> {
        self.policy
            .run("point_read", move || {
                self.inner.point_read(container, id, partition_key)
            })
            .await
    }

    async fn upsert(
        &self,
        container: &str,
        id: &str,
        partition_key: &PartitionKey,
        document: Bson,
    ) -> RepositoryResult<Bson> {
        self.policy
            .run("upsert", move || {
                self.inner
                    .upsert(container, id, partition_key, document.clone())
            })
            .await
    }

    async fn delete_all(&self, container: &str) -> RepositoryResult<u64> {
        self.policy
            .run("delete_all", move || self.inner.delete_all(container))
            .await
    }

    async fn execute_query(
        &self,
        container: &str,
        statement: &Statement,
    ) -> RepositoryResult<Vec<Bson>> {
        self.policy
            .run("execute_query", move || {
                self.inner.execute_query(container, statement)
            })
            .await
    }

    async fn query_page(
        &self,
        container: &str,
        statement: &Statement,
        continuation: Option<String>,
        max_items: usize,
    ) -> RepositoryResult<Page<Bson>> {
        self.policy
            .run("query_page", move || {
                self.inner
                    .query_page(container, statement, continuation.clone(), max_items)
            })
            .await
    }

    async fn shutdown(&self) -> RepositoryResult<()> {
        self.inner.shutdown().await
    }
}
