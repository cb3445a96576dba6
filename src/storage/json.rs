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

//! File-backed store.
//!
//! Checkpoints live in one small JSON document that is replaced through a
//! synced temp file and a rename. Effect records are appended to a JSON
//! lines log next to it. The document records how many log bytes are
//! committed; bytes past that mark belong to a write that never finished
//! and are cut off by the next append. A write costs one append of the new
//! records plus one rewrite of the checkpoint document, independent of how
//! many effects were stored before.

use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::storage::CheckpointStore;
use crate::types::EffectRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Default, Serialize, Deserialize)]
struct JsonDocument {
    chains: BTreeMap<String, Checkpoint>,
    /// Committed length of the effects log in bytes.
    effects_len: u64,
}

#[derive(Serialize)]
struct LogLine<'a> {
    chain_id: &'a str,
    effect: &'a EffectRecord,
}

#[derive(Deserialize)]
struct OwnedLogLine {
    chain_id: String,
    effect: EffectRecord,
}

pub struct JsonStore {
    path: PathBuf,
    log_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(
                    target: "indexer",
                    dir = %parent.display(),
                    error = %e,
                    "could not create storage directory"
                );
            }
        }
        Self {
            log_path: path.with_extension("effects.jsonl"),
            path,
            write_lock: Mutex::new(()),
        }
    }

    /// The JSON lines file holding effect records.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn error(operation: &str, source: std::io::Error) -> IndexerError {
        IndexerError::checkpoint(operation, "json", source)
    }

    async fn read_doc(&self, operation: &str) -> Result<JsonDocument, IndexerError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(JsonDocument::default()),
            Err(e) => Err(Self::error(operation, e)),
        }
    }

    /// Write `bytes` to `target` through a synced temp file and a rename.
    async fn replace(&self, operation: &str, target: &Path, bytes: &[u8]) -> Result<(), IndexerError> {
        let tmp = target.with_extension("tmp");
        let io = async {
            let mut file = File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, target).await
        };
        io.await.map_err(|e| Self::error(operation, e))
    }

    async fn write_doc(&self, operation: &str, doc: &JsonDocument) -> Result<(), IndexerError> {
        let json = serde_json::to_vec_pretty(doc)?;
        self.replace(operation, &self.path, &json).await
    }

    /// Append `effects` after the committed part of the log and return the
    /// new committed length.
    async fn append(
        &self,
        operation: &str,
        committed: u64,
        chain_id: &str,
        effects: &[EffectRecord],
    ) -> Result<u64, IndexerError> {
        let mut buf = Vec::new();
        for effect in effects {
            serde_json::to_writer(&mut buf, &LogLine { chain_id, effect })?;
            buf.push(b'\n');
        }
        let io = async {
            let mut file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&self.log_path)
                .await?;
            let start = committed.min(file.metadata().await?.len());
            file.set_len(start).await?;
            file.seek(SeekFrom::Start(start)).await?;
            file.write_all(&buf).await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(start + buf.len() as u64)
        };
        io.await.map_err(|e| Self::error(operation, e))
    }

    async fn read_log(
        &self,
        operation: &str,
        committed: u64,
    ) -> Result<Vec<OwnedLogLine>, IndexerError> {
        let mut bytes = match tokio::fs::read(&self.log_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::error(operation, e)),
        };
        bytes.truncate(usize::try_from(committed).unwrap_or(usize::MAX));
        bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_slice(line).map_err(IndexerError::from))
            .collect()
    }

    pub async fn effects(&self, chain_id: &str) -> Result<Vec<EffectRecord>, IndexerError> {
        let doc = self.read_doc("effects").await?;
        Ok(self
            .read_log("effects", doc.effects_len)
            .await?
            .into_iter()
            .filter(|line| line.chain_id == chain_id)
            .map(|line| line.effect)
            .collect())
    }
}

#[async_trait]
impl CheckpointStore for JsonStore {
    async fn get_checkpoint(&self, chain_id: &str) -> Result<Checkpoint, IndexerError> {
        let mut doc = self.read_doc("get_checkpoint").await?;
        Ok(doc
            .chains
            .remove(chain_id)
            .unwrap_or_else(|| Checkpoint::new(chain_id)))
    }

    async fn upsert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_doc("upsert_checkpoint").await?;
        doc.chains
            .insert(checkpoint.chain_id.clone(), checkpoint.clone());
        self.write_doc("upsert_checkpoint", &doc).await
    }

    async fn persist_effects(
        &self,
        effects: &[EffectRecord],
        checkpoint: &Checkpoint,
    ) -> Result<(), IndexerError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_doc("persist_effects").await?;
        doc.effects_len = self
            .append("persist_effects", doc.effects_len, &checkpoint.chain_id, effects)
            .await?;
        doc.chains
            .insert(checkpoint.chain_id.clone(), checkpoint.clone());
        self.write_doc("persist_effects", &doc).await
    }

    async fn delete_chain_data(&self, chain_id: &str) -> Result<(), IndexerError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_doc("delete_chain_data").await?;
        let mut kept = Vec::new();
        for line in self.read_log("delete_chain_data", doc.effects_len).await? {
            if line.chain_id != chain_id {
                serde_json::to_writer(
                    &mut kept,
                    &LogLine {
                        chain_id: &line.chain_id,
                        effect: &line.effect,
                    },
                )?;
                kept.push(b'\n');
            }
        }
        self.replace("delete_chain_data", &self.log_path, &kept)
            .await?;
        doc.effects_len = kept.len() as u64;
        doc.chains.remove(chain_id);
        self.write_doc("delete_chain_data", &doc).await
    }
}
