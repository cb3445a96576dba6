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

pub mod init;
#[cfg(feature = "json-storage")]
pub mod json;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::types::EffectRecord;
use async_trait::async_trait;

/// Durable home of checkpoints and indexed effects.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Stored checkpoint for `chain_id`, or an empty one for a new chain.
    async fn get_checkpoint(&self, chain_id: &str) -> Result<Checkpoint, IndexerError>;

    /// Replace the whole checkpoint document.
    async fn upsert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), IndexerError>;

    /// Write `effects` and `checkpoint` as one atomic unit: either both are
    /// durable afterwards or neither is.
    async fn persist_effects(
        &self,
        effects: &[EffectRecord],
        checkpoint: &Checkpoint,
    ) -> Result<(), IndexerError>;

    /// Drop the checkpoint and every effect recorded for `chain_id`.
    async fn delete_chain_data(&self, chain_id: &str) -> Result<(), IndexerError>;

    async fn close(&self) -> Result<(), IndexerError> {
        Ok(())
    }
}
