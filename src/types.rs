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

use serde::{Deserialize, Serialize};

pub type BlockNumber = u64;

/// A block as delivered by a [`Blockchain`](crate::chain::Blockchain),
/// carrying the transport's own transaction type.
#[derive(Clone, Debug)]
pub struct Block<T> {
    pub chain_id: String,
    pub height: BlockNumber,
    /// Unix seconds.
    pub time: i64,
    pub txs: Vec<T>,
}

/// Result of fetching a historical block.
#[derive(Clone, Debug)]
pub enum FetchedBlock<T> {
    Block(Block<T>),
    /// The node no longer retains the requested height.
    Pruned { lowest_available: BlockNumber },
}

/// One decoded message out of a transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub kind: String,
    pub payload: serde_json::Value,
}

impl Message {
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// On-chain outcome of a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed,
    Rejected { reason: String },
}

/// Persisted record of one indexed message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub tx_hash: String,
    pub kind: String,
    pub block_height: BlockNumber,
    pub block_time: i64,
    pub payload: serde_json::Value,
}
