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

use crate::backfill::{Backfill, CycleOutcome};
use crate::chain::{BlockStream, Blockchain};
use crate::config::IndexerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::IndexerError;
use crate::handler::HandlerRegistry;
use crate::processor::BlockProcessor;
use crate::retry::{retry_with_backoff, CircuitBreaker, RetryConfig};
use crate::safe_checkpoint::SafeCheckpoint;
use crate::storage::CheckpointStore;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Live tail plus periodic backfill over one chain.
pub struct Indexer<B: Blockchain> {
    config: IndexerConfig,
    retry_config: RetryConfig,
    circuit_breaker: Arc<CircuitBreaker>,
    chain: Arc<B>,
    store: Arc<dyn CheckpointStore>,
    checkpoint: Arc<SafeCheckpoint>,
    processor: Arc<BlockProcessor<B>>,
    backfill: Arc<Backfill<B>>,
}

impl<B: Blockchain> Indexer<B> {
    /// Resolve the chain id and load its checkpoint, adding a record for
    /// every registered kind the stored document does not track yet.
    pub async fn new(
        chain: B,
        store: Box<dyn CheckpointStore>,
        registry: HandlerRegistry,
        config: IndexerConfig,
    ) -> Result<Self, IndexerError> {
        config.validate()?;
        let retry_config = RetryConfig::default();
        let circuit_breaker = Arc::new(CircuitBreaker::new(
            config.node_url.clone(),
            3,
            Duration::from_secs(60),
        ));
        let chain = Arc::new(chain);
        let store: Arc<dyn CheckpointStore> = Arc::from(store);

        let chain_id =
            retry_with_backoff(|| chain.chain_id(), &retry_config, &circuit_breaker).await?;
        // Store failures must not trip the node breaker.
        let store_breaker = CircuitBreaker::new(
            "checkpoint-store",
            retry_config.max_retries,
            Duration::from_secs(60),
        );
        let mut checkpoint =
            retry_with_backoff(|| store.get_checkpoint(&chain_id), &retry_config, &store_breaker)
                .await?;
        if checkpoint.chain_id.is_empty() {
            checkpoint.chain_id = chain_id.clone();
        } else if checkpoint.chain_id != chain_id {
            return Err(IndexerError::ChainMismatch {
                expected: chain_id,
                actual: checkpoint.chain_id,
                block: checkpoint.last_block_height_received,
            });
        }
        checkpoint.merge_with_defaults(registry.kinds());
        info!(
            target: "indexer",
            chain_id = %checkpoint.chain_id,
            last_received = checkpoint.last_block_height_received,
            kinds = checkpoint.tracked_kinds.len(),
            "checkpoint loaded"
        );

        let checkpoint = Arc::new(SafeCheckpoint::new(checkpoint));
        let dispatcher = Dispatcher::new(
            Arc::clone(&checkpoint),
            Arc::clone(&store),
            Arc::clone(&chain),
            registry,
            config.validate_txs,
        );
        let processor = Arc::new(BlockProcessor::new(dispatcher));
        // Backfill fetch failures must not trip the breaker guarding the
        // live subscription.
        let backfill_breaker = Arc::new(CircuitBreaker::new(
            format!("{} (backfill)", config.node_url),
            3,
            Duration::from_secs(60),
        ));
        let backfill = Arc::new(Backfill::new(
            Arc::clone(&processor),
            &config,
            backfill_breaker,
        ));

        Ok(Self {
            config,
            retry_config,
            circuit_breaker,
            chain,
            store,
            checkpoint,
            processor,
            backfill,
        })
    }

    pub fn checkpoint(&self) -> &Arc<SafeCheckpoint> {
        &self.checkpoint
    }

    pub fn processor(&self) -> &Arc<BlockProcessor<B>> {
        &self.processor
    }

    pub fn backfill(&self) -> &Arc<Backfill<B>> {
        &self.backfill
    }

    async fn subscribe(&self) -> Result<BlockStream<B::Tx>, IndexerError> {
        retry_with_backoff(
            || self.chain.subscribe_new_blocks(),
            &self.retry_config,
            &self.circuit_breaker,
        )
        .await
    }

    /// Subscribe again after the stream ended. Returns `None` on cancel.
    async fn resubscribe(&self, cancel: &CancellationToken) -> Option<BlockStream<B::Tx>> {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return None,
                res = self.subscribe() => match res {
                    Ok(stream) => return Some(stream),
                    Err(e) => error!(target: "indexer", error = %e, "resubscribe failed"),
                },
            }
            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.retry_config.max_delay) => {}
            }
        }
    }

    /// Run until `cancel` fires, then drain and close the chain and store.
    ///
    /// Only startup and close errors are returned; errors for single
    /// blocks or backfill cycles are logged.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), IndexerError> {
        let mut blocks = self.subscribe().await?;
        let mut ticker = tokio::time::interval(self.config.backfill_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut backfill: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = blocks.next() => match next {
                    Some(Ok(block)) => {
                        if let Err(e) = self.processor.handle_new_block(&block).await {
                            warn!(
                                target: "indexer",
                                height = block.height,
                                error = %e,
                                "live block not indexed"
                            );
                        }
                    }
                    Some(Err(e)) => warn!(target: "indexer", error = %e, "block stream error"),
                    None => {
                        warn!(target: "indexer", "block stream ended, resubscribing");
                        match self.resubscribe(&cancel).await {
                            Some(stream) => blocks = stream,
                            None => break,
                        }
                    }
                },
                _ = ticker.tick() => {
                    if backfill.as_ref().is_some_and(|h| !h.is_finished()) {
                        debug!(target: "indexer", "previous backfill still running");
                    } else {
                        backfill = Some(self.spawn_backfill());
                    }
                }
            }
        }

        info!(target: "indexer", "shutting down");
        if let Some(handle) = backfill.take() {
            if let Err(e) = handle.await {
                warn!(target: "indexer", error = %e, "backfill task ended abnormally");
            }
        }
        self.close().await
    }

    fn spawn_backfill(&self) -> JoinHandle<()> {
        let backfill = Arc::clone(&self.backfill);
        tokio::spawn(async move {
            match backfill.run_cycle().await {
                Ok(CycleOutcome::Completed { from, failed, .. }) if !failed.is_empty() => {
                    warn!(target: "indexer", from, ?failed, "backfill left heights behind");
                }
                Ok(outcome) => debug!(target: "indexer", ?outcome, "backfill cycle"),
                Err(e) => warn!(target: "indexer", error = %e, "backfill cycle failed"),
            }
        })
    }

    /// Close the chain and the store. Both are attempted; the first error
    /// is returned.
    pub async fn close(&self) -> Result<(), IndexerError> {
        let (chain, store) = futures::future::join(self.chain.close(), self.store.close()).await;
        if let Err(e) = &chain {
            error!(target: "indexer", error = %e, "closing chain failed");
        }
        if let Err(e) = &store {
            error!(target: "indexer", error = %e, "closing store failed");
        }
        chain.and(store)
    }
}
