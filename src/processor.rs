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

use crate::chain::Blockchain;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::error::IndexerError;
use crate::handler::MessageHandler;
use crate::safe_checkpoint::ClaimOutcome;
use crate::types::{Block, BlockNumber, Message};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// What happened to one block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub height: BlockNumber,
    /// Effect records written.
    pub persisted: usize,
    /// Transactions skipped because they could not be decoded.
    pub undecodable_txs: usize,
    /// Kind units left unindexed after an error.
    pub failed_kinds: usize,
}

type KindUnit<'a, T> = (Arc<dyn MessageHandler>, Vec<(&'a T, Message)>);

/// Block-level logic shared by the live tail and backfill.
pub struct BlockProcessor<B: Blockchain> {
    dispatcher: Dispatcher<B>,
}

impl<B: Blockchain> BlockProcessor<B> {
    pub fn new(dispatcher: Dispatcher<B>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher<B> {
        &self.dispatcher
    }

    /// Live-tail entry point: record the header, then index the block.
    pub async fn handle_new_block(
        &self,
        block: &Block<B::Tx>,
    ) -> Result<BlockReport, IndexerError> {
        self.dispatcher.checkpoint().update_from_block(block)?;
        self.process_block(block).await
    }

    /// Index every recognised message of `block`, then mark the kinds that
    /// had nothing in it and write the checkpoint once. Inactive kinds are
    /// not marked when any transaction failed to decode.
    ///
    /// Failures of single transactions or kinds are logged and leave those
    /// kinds unmarked for the height. Only a failure to write the closing
    /// checkpoint is returned.
    pub async fn process_block(&self, block: &Block<B::Tx>) -> Result<BlockReport, IndexerError> {
        let checkpoint = self.dispatcher.checkpoint();
        let expected = checkpoint.chain_id();
        if !expected.is_empty() && expected != block.chain_id {
            return Err(IndexerError::ChainMismatch {
                expected,
                actual: block.chain_id.clone(),
                block: block.height,
            });
        }

        let height = block.height;
        let mut report = BlockReport {
            height,
            ..BlockReport::default()
        };
        let units = self.group_by_kind(block, &mut report);

        for (key, (handler, items)) in &units {
            match self.dispatcher.dispatch_kind(block, handler, items).await {
                Ok(DispatchOutcome::Persisted(n)) => report.persisted += n,
                Ok(_) => {}
                Err(e @ IndexerError::TxRejected { .. }) => {
                    report.failed_kinds += 1;
                    warn!(
                        target: "indexer",
                        chain_id = %block.chain_id,
                        height,
                        kind = %key,
                        error = %e,
                        "rejected transaction, kind left for retry"
                    );
                }
                Err(e) => {
                    report.failed_kinds += 1;
                    error!(
                        target: "indexer",
                        chain_id = %block.chain_id,
                        height,
                        kind = %key,
                        error = %e,
                        "failed to index kind"
                    );
                }
            }
        }

        // Kinds with no activity in this block are done with it, unless a
        // transaction could not be decoded: its kinds are unknown, so the
        // height stays open for every kind without a unit.
        let (tracked, _) = checkpoint.snapshot();
        let mut claims = Vec::new();
        if report.undecodable_txs == 0 {
            for tracked in &tracked {
                if units.contains_key(&tracked.kind.to_ascii_lowercase()) {
                    continue;
                }
                if let ClaimOutcome::Claimed(claim) = checkpoint.claim(&tracked.kind, height) {
                    claims.push((tracked.kind.as_str(), claim));
                }
            }
        } else {
            warn!(
                target: "indexer",
                chain_id = %block.chain_id,
                height,
                undecodable = report.undecodable_txs,
                "block left open for inactive kinds"
            );
        }
        self.dispatcher
            .commit(&[], |cp| {
                claims
                    .iter()
                    .fold(false, |changed, (kind, _)| cp.mark_indexed_kind(kind, height) | changed)
            })
            .await?;
        drop(claims);

        debug!(
            target: "indexer",
            chain_id = %block.chain_id,
            height,
            persisted = report.persisted,
            "block processed"
        );
        Ok(report)
    }

    fn group_by_kind<'a>(
        &self,
        block: &'a Block<B::Tx>,
        report: &mut BlockReport,
    ) -> BTreeMap<String, KindUnit<'a, B::Tx>> {
        let chain = self.dispatcher.chain();
        let registry = self.dispatcher.registry();
        let mut units: BTreeMap<String, KindUnit<'a, B::Tx>> = BTreeMap::new();

        for tx in &block.txs {
            let messages = match chain.decode_tx(tx, block.height) {
                Ok(messages) => messages,
                Err(e) => {
                    report.undecodable_txs += 1;
                    warn!(
                        target: "indexer",
                        chain_id = %block.chain_id,
                        height = block.height,
                        tx_hash = %chain.tx_hash(tx),
                        error = %e,
                        "skipping undecodable transaction"
                    );
                    continue;
                }
            };
            for msg in messages {
                let Some(handler) = registry.get(&msg.kind) else {
                    continue;
                };
                units
                    .entry(handler.kind().to_ascii_lowercase())
                    .or_insert_with(|| (Arc::clone(handler), Vec::new()))
                    .1
                    .push((tx, msg));
            }
        }
        units
    }
}
