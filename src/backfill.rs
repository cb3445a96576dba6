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

//! Periodic catch-up over historical gaps.
//!
//! A cycle plans from a checkpoint snapshot, fetches one window of blocks
//! concurrently and applies them one by one in ascending height order.
//!
//! Windows sweep upwards from a cursor, so a height that keeps failing does
//! not hold back the heights above it. Once the sweep reaches the received
//! head the cursor returns to the floor and failed heights are retried.

use crate::chain::Blockchain;
use crate::checkpoint::{lowest_unindexed, needs_indexing};
use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::processor::BlockProcessor;
use crate::retry::CircuitBreaker;
use crate::types::{Block, BlockNumber, FetchedBlock};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// How a backfill cycle ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The window reaches past the last received height.
    Waiting {
        lowest: BlockNumber,
        last_received: BlockNumber,
    },
    CircuitOpen,
    Completed {
        from: BlockNumber,
        /// Heights applied, in application order.
        processed: Vec<BlockNumber>,
        /// Heights that could not be fetched or applied.
        failed: Vec<BlockNumber>,
    },
}

pub struct Backfill<B: Blockchain> {
    processor: Arc<BlockProcessor<B>>,
    chain: Arc<B>,
    /// Lowest height the node is known to retain.
    floor: AtomicU64,
    /// Where the next window starts looking.
    cursor: AtomicU64,
    batch_size: u64,
    concurrency: usize,
    max_prune_retries: usize,
    breaker: Arc<CircuitBreaker>,
}

impl<B: Blockchain> Backfill<B> {
    pub fn new(
        processor: Arc<BlockProcessor<B>>,
        config: &IndexerConfig,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        let chain = Arc::clone(processor.dispatcher().chain());
        Self {
            processor,
            chain,
            floor: AtomicU64::new(config.min_block_height.max(1)),
            cursor: AtomicU64::new(0),
            batch_size: config.backfill_batch_size.max(1),
            concurrency: config.fetch_concurrency.max(1),
            max_prune_retries: config.max_prune_retries.max(1),
            breaker,
        }
    }

    pub fn floor(&self) -> BlockNumber {
        self.floor.load(Ordering::SeqCst)
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Lowest height the next window may start at.
    fn start(&self) -> BlockNumber {
        self.floor().max(self.cursor.load(Ordering::SeqCst))
    }

    /// Run one cycle.
    ///
    /// A fetch error for the first height of the window ends the cycle with
    /// that error; later heights that fail are reported in
    /// [`CycleOutcome::Completed`]. Either way the height is retried on the
    /// next sweep from the floor.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, IndexerError> {
        let checkpoint = self.processor.dispatcher().checkpoint();
        let (kinds, last_received) = checkpoint.snapshot();

        let mut prune_hits = 0;
        let (lowest, first) = loop {
            let mut lowest = lowest_unindexed(&kinds, self.start());
            if lowest.saturating_add(self.batch_size) > last_received
                && self.cursor.load(Ordering::SeqCst) > self.floor()
            {
                // Sweep reached the head; start over from the floor.
                self.cursor.store(0, Ordering::SeqCst);
                lowest = lowest_unindexed(&kinds, self.floor());
            }
            if lowest.saturating_add(self.batch_size) > last_received {
                debug!(
                    target: "indexer",
                    lowest,
                    last_received,
                    "backfill window not produced yet"
                );
                return Ok(CycleOutcome::Waiting {
                    lowest,
                    last_received,
                });
            }
            if self.breaker.is_open() {
                return Ok(CycleOutcome::CircuitOpen);
            }

            match self.breaker.call(self.chain.fetch_block(lowest)).await {
                Ok(FetchedBlock::Block(block)) => break (lowest, block),
                Err(e) => {
                    // The next cycle moves on; the sweep comes back to it.
                    self.cursor.fetch_max(lowest.saturating_add(1), Ordering::SeqCst);
                    return Err(e);
                }
                Ok(FetchedBlock::Pruned { lowest_available }) => {
                    prune_hits += 1;
                    let raised = lowest_available.max(lowest + 1);
                    self.floor.fetch_max(raised, Ordering::SeqCst);
                    info!(
                        target: "indexer",
                        requested = lowest,
                        floor = self.floor(),
                        "node pruned below requested height, raising floor"
                    );
                    if prune_hits >= self.max_prune_retries {
                        return Err(IndexerError::PruneRetriesExhausted {
                            floor: self.floor(),
                            attempts: prune_hits,
                        });
                    }
                }
            }
        };

        let mut processed = Vec::new();
        let mut failed = Vec::new();
        self.apply(first, &mut processed, &mut failed).await;

        let end = lowest.saturating_add(self.batch_size);
        self.cursor.fetch_max(end, Ordering::SeqCst);
        let heights: Vec<BlockNumber> = (lowest + 1..end)
            .filter(|h| needs_indexing(&kinds, *h))
            .collect();
        let mut fetched = self.fetch_all(&heights, &mut failed).await;

        for height in heights {
            if let Some(block) = fetched.remove(&height) {
                self.apply(block, &mut processed, &mut failed).await;
            }
        }

        info!(
            target: "indexer",
            from = lowest,
            processed = processed.len(),
            failed = failed.len(),
            "backfill cycle finished"
        );
        Ok(CycleOutcome::Completed {
            from: lowest,
            processed,
            failed,
        })
    }

    /// Fetch `heights` with bounded fan-out, keyed by height.
    async fn fetch_all(
        &self,
        heights: &[BlockNumber],
        failed: &mut Vec<BlockNumber>,
    ) -> BTreeMap<BlockNumber, Block<B::Tx>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        for &height in heights {
            let chain = Arc::clone(&self.chain);
            let breaker = Arc::clone(&self.breaker);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let fetch = async {
                    match semaphore.acquire_owned().await {
                        Ok(_permit) => breaker.call(chain.fetch_block(height)).await,
                        Err(e) => Err(IndexerError::chain_request("fetch_block", e)),
                    }
                };
                let fetched = match AssertUnwindSafe(fetch).catch_unwind().await {
                    Ok(fetched) => fetched,
                    Err(_) => Err(IndexerError::chain_request(
                        "fetch_block",
                        std::io::Error::other("fetch task panicked"),
                    )),
                };
                (height, fetched)
            });
        }

        let mut blocks = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((height, Ok(FetchedBlock::Block(block)))) => {
                    blocks.insert(height, block);
                }
                Ok((height, Ok(FetchedBlock::Pruned { lowest_available }))) => {
                    warn!(
                        target: "indexer",
                        height,
                        lowest_available,
                        "block pruned during backfill"
                    );
                    self.floor.fetch_max(lowest_available, Ordering::SeqCst);
                    failed.push(height);
                }
                Ok((height, Err(e))) => {
                    warn!(target: "indexer", height, error = %e, "backfill fetch failed");
                    failed.push(height);
                }
                Err(e) => warn!(target: "indexer", error = %e, "backfill fetch task failed"),
            }
        }
        blocks
    }

    async fn apply(
        &self,
        block: Block<B::Tx>,
        processed: &mut Vec<BlockNumber>,
        failed: &mut Vec<BlockNumber>,
    ) {
        let height = block.height;
        match self.processor.process_block(&block).await {
            Ok(_) => processed.push(height),
            Err(e) => {
                warn!(target: "indexer", height, error = %e, "backfill block failed");
                failed.push(height);
            }
        }
    }
}
