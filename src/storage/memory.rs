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

use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::storage::CheckpointStore;
use crate::types::EffectRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct ChainData {
    checkpoint: Option<Checkpoint>,
    effects: Vec<EffectRecord>,
}

/// In-process store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    chains: Mutex<HashMap<String, ChainData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn chains(&self) -> MutexGuard<'_, HashMap<String, ChainData>> {
        self.chains.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn effects(&self, chain_id: &str) -> Vec<EffectRecord> {
        self.chains()
            .get(chain_id)
            .map(|data| data.effects.clone())
            .unwrap_or_default()
    }

    pub fn effects_by_kind(&self, chain_id: &str, kind: &str) -> Vec<EffectRecord> {
        self.effects(chain_id)
            .into_iter()
            .filter(|e| e.kind.eq_ignore_ascii_case(kind))
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get_checkpoint(&self, chain_id: &str) -> Result<Checkpoint, IndexerError> {
        Ok(self
            .chains()
            .get(chain_id)
            .and_then(|data| data.checkpoint.clone())
            .unwrap_or_else(|| Checkpoint::new(chain_id)))
    }

    async fn upsert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        self.chains()
            .entry(checkpoint.chain_id.clone())
            .or_default()
            .checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    async fn persist_effects(
        &self,
        effects: &[EffectRecord],
        checkpoint: &Checkpoint,
    ) -> Result<(), IndexerError> {
        let mut chains = self.chains();
        let data = chains.entry(checkpoint.chain_id.clone()).or_default();
        data.effects.extend_from_slice(effects);
        data.checkpoint = Some(checkpoint.clone());
        Ok(())
    }

    async fn delete_chain_data(&self, chain_id: &str) -> Result<(), IndexerError> {
        self.chains().remove(chain_id);
        Ok(())
    }
}
