/*
 * Copyright 2025 Flamewire
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::IndexerError;
use tracing::warn;

pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Stops calls to an endpoint for `cooldown` after `threshold` consecutive
/// failures.
pub struct CircuitBreaker {
    endpoint: String,
    failures: AtomicUsize,
    threshold: usize,
    cooldown: Duration,
    open_until: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, threshold: usize, cooldown: Duration) -> Self {
        Self {
            endpoint: endpoint.into(),
            failures: AtomicUsize::new(0),
            threshold: threshold.max(1),
            cooldown,
            open_until: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        let open_until = self.open_until.lock().unwrap_or_else(PoisonError::into_inner);
        matches!(*open_until, Some(until) if Instant::now() < until)
    }

    pub fn open_error(&self) -> IndexerError {
        IndexerError::CircuitOpen {
            endpoint: self.endpoint.clone(),
        }
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
        *self.open_until.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.threshold {
            *self.open_until.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(Instant::now() + self.cooldown);
            self.failures.store(0, Ordering::Relaxed);
            warn!(
                target: "indexer",
                endpoint = %self.endpoint,
                cooldown = ?self.cooldown,
                "circuit opened"
            );
        }
    }

    /// Run `op` once unless the circuit is open, recording the outcome.
    pub async fn call<Fut, T>(&self, op: Fut) -> Result<T, IndexerError>
    where
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        if self.is_open() {
            return Err(self.open_error());
        }
        let res = op.await;
        match &res {
            Ok(_) => self.record_success(),
            Err(e) if is_retryable_error(e) => self.record_failure(),
            Err(_) => {}
        }
        res
    }
}

fn is_retryable_subxt_error(err: &subxt::Error) -> bool {
    if err.is_rpc_limit_reached() {
        return false;
    }
    if let subxt::Error::Rpc(subxt::error::RpcError::ClientError(_)) = err {
        return false;
    }
    true
}

/// Whether another attempt at the same call could succeed.
pub fn is_retryable_error(err: &IndexerError) -> bool {
    match err {
        IndexerError::BlockNotFound { .. }
        | IndexerError::InvalidConfig { .. }
        | IndexerError::ChainMismatch { .. }
        | IndexerError::TxDecodeFailed { .. }
        | IndexerError::TxRejected { .. }
        | IndexerError::CircuitOpen { .. }
        | IndexerError::PruneRetriesExhausted { .. }
        | IndexerError::SerdeJson(_) => false,
        IndexerError::Subxt(e) => is_retryable_subxt_error(e.as_ref()),
        IndexerError::ConnectionFailed { source, .. }
        | IndexerError::ChainRequest { source, .. } => source
            .downcast_ref::<subxt::Error>()
            .map_or(true, is_retryable_subxt_error),
        _ => true,
    }
}

/// Retry `op` with exponential backoff while its errors are retryable and
/// the circuit stays closed.
pub async fn retry_with_backoff<F, Fut, T>(
    mut op: F,
    config: &RetryConfig,
    circuit_breaker: &CircuitBreaker,
) -> Result<T, IndexerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IndexerError>>,
{
    let attempts = config.max_retries.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match circuit_breaker.call(op()).await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if !is_retryable_error(&e) || attempt >= attempts {
                    return Err(e);
                }
                warn!(
                    target: "indexer",
                    attempt,
                    error = %e,
                    "retrying in {:?}",
                    delay
                );
                sleep(delay).await;
                let next = (delay.as_millis() as f32 * config.backoff_multiplier) as u64;
                delay = Duration::from_millis(next).min(config.max_delay);
            }
        }
    }
}
