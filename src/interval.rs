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

//! Merged sets of indexed block heights.

use crate::types::BlockNumber;
use serde::{Deserialize, Serialize};

/// Inclusive range of block heights, `from <= to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub from: BlockNumber,
    pub to: BlockNumber,
}

impl Interval {
    pub fn new(from: BlockNumber, to: BlockNumber) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, height: BlockNumber) -> bool {
        self.from <= height && height <= self.to
    }
}

/// Sorted, disjoint, non-adjacent intervals.
///
/// Loading from a stored list goes through [`IntervalSet::from_intervals`],
/// so documents written by older or buggy versions are normalised on read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Interval>", into = "Vec<Interval>")]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary intervals, sorting and merging overlaps and
    /// neighbours. Reversed intervals are flipped.
    pub fn from_intervals(intervals: impl IntoIterator<Item = Interval>) -> Self {
        let mut raw: Vec<Interval> = intervals
            .into_iter()
            .map(|iv| Interval::new(iv.from.min(iv.to), iv.from.max(iv.to)))
            .collect();
        raw.sort_by_key(|iv| iv.from);

        let mut merged: Vec<Interval> = Vec::with_capacity(raw.len());
        for iv in raw {
            match merged.last_mut() {
                Some(last) if iv.from <= last.to.saturating_add(1) => {
                    last.to = last.to.max(iv.to);
                }
                _ => merged.push(iv),
            }
        }
        Self { intervals: merged }
    }

    pub fn as_slice(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Record `height`. Returns `false` when it was already covered.
    pub fn insert(&mut self, height: BlockNumber) -> bool {
        // First interval that could contain `height` or be extended up to it.
        // Everything before it ends at least two below `height`.
        let idx = self
            .intervals
            .partition_point(|iv| iv.to.saturating_add(1) < height);

        let Some(current) = self.intervals.get(idx).copied() else {
            self.intervals.push(Interval::new(height, height));
            return true;
        };

        if current.contains(height) {
            return false;
        }

        if current.to.checked_add(1) == Some(height) {
            match self.intervals.get(idx + 1).copied() {
                Some(next) if height.checked_add(1) == Some(next.from) => {
                    self.intervals[idx].to = next.to;
                    self.intervals.remove(idx + 1);
                }
                _ => self.intervals[idx].to = height,
            }
            return true;
        }

        if height.checked_add(1) == Some(current.from) {
            self.intervals[idx].from = height;
            return true;
        }

        self.intervals.insert(idx, Interval::new(height, height));
        true
    }

    pub fn covers(&self, height: BlockNumber) -> bool {
        self.intervals.iter().any(|iv| iv.contains(height))
    }

    /// Smallest height `>= floor` (floor clamped to 1) not covered by the set.
    pub fn lowest_unindexed(&self, floor: BlockNumber) -> BlockNumber {
        let mut candidate = floor.max(1);
        for iv in &self.intervals {
            if iv.to < candidate {
                continue;
            }
            if iv.from > candidate {
                break;
            }
            candidate = iv.to.saturating_add(1);
        }
        candidate
    }
}

impl From<Vec<Interval>> for IntervalSet {
    fn from(intervals: Vec<Interval>) -> Self {
        Self::from_intervals(intervals)
    }
}

impl From<IntervalSet> for Vec<Interval> {
    fn from(set: IntervalSet) -> Self {
        set.intervals
    }
}
