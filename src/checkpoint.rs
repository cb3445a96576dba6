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

//! Per-chain indexing progress.
//!
//! A [`Checkpoint`] keeps one [`IntervalSet`] per tracked message kind. A
//! height is fully indexed once every kind covers it.

use crate::error::IndexerError;
use crate::interval::IntervalSet;
use crate::types::BlockNumber;
use serde::{Deserialize, Serialize};

/// Progress for one message kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedKind {
    pub kind: String,
    #[serde(default)]
    pub blocks_indexed: IntervalSet,
}

impl TrackedKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            blocks_indexed: IntervalSet::new(),
        }
    }

    pub fn with_intervals(kind: impl Into<String>, blocks_indexed: IntervalSet) -> Self {
        Self {
            kind: kind.into(),
            blocks_indexed,
        }
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }
}

/// Durable document describing how far a chain has been indexed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Checkpoint {
    pub chain_id: String,
    pub last_block_height_received: BlockNumber,
    /// Unix seconds.
    pub last_block_time_received: i64,
    pub tracked_kinds: Vec<TrackedKind>,
}

impl Checkpoint {
    /// Empty checkpoint for a chain seen for the first time.
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            ..Self::default()
        }
    }

    pub fn with_kinds<I, S>(chain_id: impl Into<String>, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut checkpoint = Self::new(chain_id);
        checkpoint.merge_with_defaults(kinds);
        checkpoint
    }

    pub fn tracked(&self, kind: &str) -> Option<&TrackedKind> {
        self.tracked_kinds.iter().find(|t| t.is(kind))
    }

    /// Add an empty record for every registered kind not tracked yet.
    pub fn merge_with_defaults<I, S>(&mut self, kinds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for kind in kinds {
            let kind = kind.into();
            if self.tracked(&kind).is_none() {
                self.tracked_kinds.push(TrackedKind::new(kind));
            }
        }
    }

    pub fn needs_indexing(&self, height: BlockNumber) -> bool {
        needs_indexing(&self.tracked_kinds, height)
    }

    pub fn needs_indexing_kind(&self, kind: &str, height: BlockNumber) -> bool {
        needs_indexing_kind(&self.tracked_kinds, kind, height)
    }

    /// Mark `height` for every tracked kind. Returns whether anything changed.
    pub fn mark_indexed(&mut self, height: BlockNumber) -> bool {
        let mut changed = false;
        for tracked in &mut self.tracked_kinds {
            changed |= tracked.blocks_indexed.insert(height);
        }
        changed
    }

    /// Mark `height` for one kind. Returns whether anything changed; an
    /// untracked kind is left alone.
    pub fn mark_indexed_kind(&mut self, kind: &str, height: BlockNumber) -> bool {
        self.tracked_kinds
            .iter_mut()
            .find(|t| t.is(kind))
            .is_some_and(|t| t.blocks_indexed.insert(height))
    }

    pub fn lowest_unindexed(&self, floor: BlockNumber) -> BlockNumber {
        lowest_unindexed(&self.tracked_kinds, floor)
    }

    /// Record the header of a newly received block.
    ///
    /// The chain id is fixed once set and the received height never moves
    /// backwards. Returns whether the header fields changed.
    pub fn apply_header(
        &mut self,
        chain_id: &str,
        height: BlockNumber,
        time: i64,
    ) -> Result<bool, IndexerError> {
        if self.chain_id.is_empty() {
            self.chain_id = chain_id.to_string();
        } else if self.chain_id != chain_id {
            return Err(IndexerError::ChainMismatch {
                expected: self.chain_id.clone(),
                actual: chain_id.to_string(),
                block: height,
            });
        }

        if height <= self.last_block_height_received {
            return Ok(false);
        }
        self.last_block_height_received = height;
        self.last_block_time_received = time;
        Ok(true)
    }
}

/// True if any kind still lacks `height`.
pub fn needs_indexing(kinds: &[TrackedKind], height: BlockNumber) -> bool {
    kinds.iter().any(|t| !t.blocks_indexed.covers(height))
}

/// True if `kind` is tracked and lacks `height`.
pub fn needs_indexing_kind(kinds: &[TrackedKind], kind: &str, height: BlockNumber) -> bool {
    kinds
        .iter()
        .find(|t| t.is(kind))
        .is_some_and(|t| !t.blocks_indexed.covers(height))
}

/// Lowest height at or above `floor` that some kind still needs.
pub fn lowest_unindexed(kinds: &[TrackedKind], floor: BlockNumber) -> BlockNumber {
    kinds
        .iter()
        .map(|t| t.blocks_indexed.lowest_unindexed(floor))
        .min()
        .unwrap_or_else(|| floor.max(1))
}
