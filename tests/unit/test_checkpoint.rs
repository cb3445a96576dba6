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

use flamewire_msg_indexer::checkpoint::{lowest_unindexed, Checkpoint, TrackedKind};
use flamewire_msg_indexer::interval::{Interval, IntervalSet};
use flamewire_msg_indexer::IndexerError;

fn kind(name: &str, ranges: &[(u64, u64)]) -> TrackedKind {
    TrackedKind::with_intervals(
        name,
        IntervalSet::from_intervals(ranges.iter().map(|&(f, t)| Interval::new(f, t))),
    )
}

#[test]
fn lowest_unindexed_is_minimum_across_kinds() {
    let kinds = vec![
        kind("Transfer", &[(15, 167), (200, 215)]),
        kind("Deposit", &[(10, 50), (88, 102)]),
    ];
    assert_eq!(lowest_unindexed(&kinds, 100), 103);

    let kinds = vec![
        kind("Transfer", &[(8713586, 8739758), (10149582, 10153387)]),
        kind("Deposit", &[(8713586, 9063673), (10149582, 10153387)]),
    ];
    assert_eq!(lowest_unindexed(&kinds, 9063670), 9063670);
}

#[test]
fn lowest_unindexed_without_kinds_clamps_floor() {
    assert_eq!(lowest_unindexed(&[], 0), 1);
    assert_eq!(lowest_unindexed(&[], 42), 42);
}

#[test]
fn needs_indexing_any_and_per_kind() {
    let mut cp = Checkpoint::with_kinds("c", ["Transfer", "Deposit"]);
    assert!(cp.needs_indexing(5));
    assert!(cp.mark_indexed_kind("Transfer", 5));
    assert!(!cp.needs_indexing_kind("Transfer", 5));
    assert!(cp.needs_indexing_kind("Deposit", 5));
    assert!(cp.needs_indexing(5));

    assert!(cp.mark_indexed_kind("deposit", 5));
    assert!(!cp.needs_indexing(5));
    assert!(!cp.needs_indexing_kind("Unknown", 5));
}

#[test]
fn mark_indexed_reports_change() {
    let mut cp = Checkpoint::with_kinds("c", ["Transfer", "Deposit"]);
    assert!(cp.mark_indexed(9));
    assert!(!cp.mark_indexed(9));
    assert!(!cp.mark_indexed_kind("Transfer", 9));
    assert!(!cp.mark_indexed_kind("Unknown", 10));
}

#[test]
fn merge_with_defaults_keeps_existing_progress() {
    let mut cp = Checkpoint::new("c");
    cp.tracked_kinds.push(kind("transfer", &[(1, 10)]));
    cp.merge_with_defaults(["Transfer", "Deposit"]);

    assert_eq!(cp.tracked_kinds.len(), 2);
    assert_eq!(
        cp.tracked("Transfer").map(|t| t.blocks_indexed.len()),
        Some(1)
    );
    assert!(cp.tracked("Deposit").is_some_and(|t| t.blocks_indexed.is_empty()));
    assert_eq!(cp.lowest_unindexed(1), 1);
}

#[test]
fn header_only_moves_forward() {
    let mut cp = Checkpoint::new("");
    assert!(cp.apply_header("c", 10, 100).unwrap());
    assert_eq!(cp.chain_id, "c");
    assert!(!cp.apply_header("c", 9, 90).unwrap());
    assert_eq!(cp.last_block_height_received, 10);
    assert_eq!(cp.last_block_time_received, 100);
    assert!(cp.apply_header("c", 11, 110).unwrap());
    assert_eq!(cp.last_block_height_received, 11);
}

#[test]
fn header_from_other_chain_is_refused() {
    let mut cp = Checkpoint::new("c");
    let err = cp.apply_header("other", 10, 100).unwrap_err();
    match err {
        IndexerError::ChainMismatch {
            expected, actual, ..
        } => {
            assert_eq!(expected, "c");
            assert_eq!(actual, "other");
        }
        _ => panic!("wrong error: {err:?}"),
    }
    assert_eq!(cp.last_block_height_received, 0);
}

#[test]
fn stored_document_loads_with_missing_fields() {
    let json = r#"{
        "chain_id": "c",
        "tracked_kinds": [
            {"kind": "Transfer", "blocks_indexed": [{"from": 4, "to": 10}, {"from": 1, "to": 3}]},
            {"kind": "Deposit"}
        ]
    }"#;
    let cp: Checkpoint = serde_json::from_str(json).unwrap();
    assert_eq!(cp.last_block_height_received, 0);
    assert_eq!(
        cp.tracked("Transfer").unwrap().blocks_indexed.as_slice(),
        &[Interval::new(1, 10)]
    );
    assert!(cp.tracked("Deposit").unwrap().blocks_indexed.is_empty());
    assert_eq!(cp.lowest_unindexed(0), 1);
}
