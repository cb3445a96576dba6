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

use crate::checkpoint::{Checkpoint, TrackedKind};
use crate::error::IndexerError;
use crate::types::{Block, BlockNumber};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct State {
    checkpoint: Checkpoint,
    claims: HashSet<(String, BlockNumber)>,
}

/// Single owner of the live [`Checkpoint`].
///
/// Every read that feeds a decision and the write recording its outcome go
/// through one critical section. The lock is never held across an await.
pub struct SafeCheckpoint {
    state: Mutex<State>,
}

/// Result of trying to take a (kind, height) unit.
pub enum ClaimOutcome<'a> {
    Claimed(Claim<'a>),
    AlreadyIndexed,
    InFlight,
}

/// Exclusive right to index one kind at one height. Released on drop.
pub struct Claim<'a> {
    owner: &'a SafeCheckpoint,
    key: (String, BlockNumber),
}

impl Claim<'_> {
    pub fn height(&self) -> BlockNumber {
        self.key.1
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.owner.lock().claims.remove(&self.key);
    }
}

fn claim_key(kind: &str, height: BlockNumber) -> (String, BlockNumber) {
    (kind.to_ascii_lowercase(), height)
}

impl SafeCheckpoint {
    pub fn new(checkpoint: Checkpoint) -> Self {
        Self {
            state: Mutex::new(State {
                checkpoint,
                claims: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the live checkpoint.
    pub fn execute<R>(&self, f: impl FnOnce(&mut Checkpoint) -> R) -> R {
        f(&mut self.lock().checkpoint)
    }

    /// Copy of the tracked kinds and last received height, for planning
    /// without holding the lock.
    pub fn snapshot(&self) -> (Vec<TrackedKind>, BlockNumber) {
        self.execute(|cp| (cp.tracked_kinds.clone(), cp.last_block_height_received))
    }

    /// Full copy of the checkpoint document.
    pub fn to_checkpoint(&self) -> Checkpoint {
        self.execute(|cp| cp.clone())
    }

    pub fn chain_id(&self) -> String {
        self.execute(|cp| cp.chain_id.clone())
    }

    pub fn update_from_block<T>(&self, block: &Block<T>) -> Result<bool, IndexerError> {
        self.execute(|cp| cp.apply_header(&block.chain_id, block.height, block.time))
    }

    /// Take the (kind, height) unit if the kind still needs that height and
    /// nobody else is working on it.
    pub fn claim(&self, kind: &str, height: BlockNumber) -> ClaimOutcome<'_> {
        let mut state = self.lock();
        if !state.checkpoint.needs_indexing_kind(kind, height) {
            return ClaimOutcome::AlreadyIndexed;
        }
        let key = claim_key(kind, height);
        if !state.claims.insert(key.clone()) {
            return ClaimOutcome::InFlight;
        }
        ClaimOutcome::Claimed(Claim { owner: self, key })
    }

    pub fn is_claimed(&self, kind: &str, height: BlockNumber) -> bool {
        self.lock().claims.contains(&claim_key(kind, height))
    }
}
