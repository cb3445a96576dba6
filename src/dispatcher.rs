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

//! Exactly-once application of message effects.
//!
//! The unit of work is one message kind at one height. A unit is claimed
//! inside the checkpoint critical section, optionally re-validated against
//! the chain, written to the store together with the checkpoint, and only
//! then marked in memory.

use crate::chain::Blockchain;
use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::handler::{HandlerRegistry, MessageHandler, MsgContext};
use crate::safe_checkpoint::{ClaimOutcome, SafeCheckpoint};
use crate::storage::CheckpointStore;
use crate::types::{Block, EffectRecord, Message, TxStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Effects written and the kind marked for the height.
    Persisted(usize),
    AlreadyIndexed,
    /// Another task holds the unit.
    InFlight,
    /// No handler is registered for the kind.
    Unrecognized,
}

pub struct Dispatcher<B: Blockchain> {
    checkpoint: Arc<SafeCheckpoint>,
    store: Arc<dyn CheckpointStore>,
    chain: Arc<B>,
    registry: HandlerRegistry,
    validate_txs: bool,
    write_lane: Mutex<()>,
}

impl<B: Blockchain> Dispatcher<B> {
    pub fn new(
        checkpoint: Arc<SafeCheckpoint>,
        store: Arc<dyn CheckpointStore>,
        chain: Arc<B>,
        registry: HandlerRegistry,
        validate_txs: bool,
    ) -> Self {
        Self {
            checkpoint,
            store,
            chain,
            registry,
            validate_txs,
            write_lane: Mutex::new(()),
        }
    }

    pub fn checkpoint(&self) -> &Arc<SafeCheckpoint> {
        &self.checkpoint
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    pub fn chain(&self) -> &Arc<B> {
        &self.chain
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Dispatch a single message of `block`.
    pub async fn dispatch_message(
        &self,
        block: &Block<B::Tx>,
        tx: &B::Tx,
        msg: Message,
    ) -> Result<DispatchOutcome, IndexerError> {
        let Some(handler) = self.registry.get(&msg.kind).cloned() else {
            return Ok(DispatchOutcome::Unrecognized);
        };
        self.dispatch_kind(block, &handler, &[(tx, msg)]).await
    }

    /// Index every message of one kind found in `block` as a single unit.
    pub async fn dispatch_kind(
        &self,
        block: &Block<B::Tx>,
        handler: &Arc<dyn MessageHandler>,
        items: &[(&B::Tx, Message)],
    ) -> Result<DispatchOutcome, IndexerError> {
        let kind = handler.kind();
        let height = block.height;

        let claim = match self.checkpoint.claim(kind, height) {
            ClaimOutcome::Claimed(claim) => claim,
            ClaimOutcome::AlreadyIndexed => return Ok(DispatchOutcome::AlreadyIndexed),
            ClaimOutcome::InFlight => {
                debug!(target: "indexer", height, kind, "unit already in flight");
                return Ok(DispatchOutcome::InFlight);
            }
        };

        let mut effects = Vec::with_capacity(items.len());
        let mut validated = HashSet::new();
        for (tx, msg) in items {
            let ctx = MsgContext {
                chain_id: block.chain_id.clone(),
                block_height: height,
                block_time: block.time,
                tx_hash: self.chain.tx_hash(tx),
            };
            let effect = match self.prepare(handler, tx, msg, &ctx, &mut validated).await {
                Ok(effect) => effect,
                Err(e) => {
                    handler.handle_error(&e, &ctx).await;
                    return Err(e);
                }
            };
            effects.push(effect);
        }

        self.commit(&effects, |cp| cp.mark_indexed_kind(kind, height))
            .await?;
        drop(claim);

        debug!(
            target: "indexer",
            chain_id = %block.chain_id,
            height,
            kind,
            effects = effects.len(),
            "unit indexed"
        );
        Ok(DispatchOutcome::Persisted(effects.len()))
    }

    async fn prepare(
        &self,
        handler: &Arc<dyn MessageHandler>,
        tx: &B::Tx,
        msg: &Message,
        ctx: &MsgContext,
        validated: &mut HashSet<String>,
    ) -> Result<EffectRecord, IndexerError> {
        if self.validate_txs && validated.insert(ctx.tx_hash.clone()) {
            match self.chain.validate_tx(tx, ctx.block_height).await? {
                TxStatus::Confirmed => {}
                TxStatus::Rejected { reason } => {
                    return Err(IndexerError::TxRejected {
                        tx_hash: ctx.tx_hash.clone(),
                        block: ctx.block_height,
                        reason,
                    })
                }
            }
        }

        let payload = handler.payload(msg, ctx)?;
        Ok(EffectRecord {
            tx_hash: ctx.tx_hash.clone(),
            kind: handler.kind().to_string(),
            block_height: ctx.block_height,
            block_time: ctx.block_time,
            payload,
        })
    }

    /// Apply `mutate` durably, then in memory.
    ///
    /// Runs in the write lane: the live checkpoint is copied, `mutate` is
    /// applied to the copy, the copy is written with `effects` in one store
    /// call, and only after that succeeds is `mutate` applied to the live
    /// checkpoint. Returns what `mutate` reported for the live checkpoint.
    pub async fn commit<F>(&self, effects: &[EffectRecord], mutate: F) -> Result<bool, IndexerError>
    where
        F: Fn(&mut Checkpoint) -> bool,
    {
        let _lane = self.write_lane.lock().await;
        let mut next = self.checkpoint.to_checkpoint();
        mutate(&mut next);

        let written = if effects.is_empty() {
            self.store.upsert_checkpoint(&next).await
        } else {
            self.store.persist_effects(effects, &next).await
        };
        if let Err(e) = written {
            warn!(
                target: "indexer",
                chain_id = %next.chain_id,
                error = %e,
                "checkpoint write failed"
            );
            return Err(e);
        }

        Ok(self.checkpoint.execute(&mutate))
    }
}
