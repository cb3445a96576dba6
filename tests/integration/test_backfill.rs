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

#[path = "../common/mod.rs"]
mod common;
use common::*;
use flamewire_msg_indexer::handler::{HandlerRegistry, PassthroughHandler};
use flamewire_msg_indexer::{
    Backfill, BlockProcessor, Checkpoint, CircuitBreaker, CycleOutcome, Dispatcher,
    IndexerConfig, IndexerError, SafeCheckpoint,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    processor: Arc<BlockProcessor<MockChain>>,
    backfill: Backfill<MockChain>,
    breaker: Arc<CircuitBreaker>,
}

fn harness(chain: &MockChain, store: &TestStore, config: IndexerConfig) -> Harness {
    let mut registry = HandlerRegistry::new();
    registry.register(PassthroughHandler::new(TRANSFER));
    registry.register(PassthroughHandler::new(DEPOSIT));
    let checkpoint = Arc::new(SafeCheckpoint::new(Checkpoint::with_kinds(
        CHAIN,
        registry.kinds(),
    )));
    let dispatcher = Dispatcher::new(
        checkpoint,
        Arc::new(store.clone()),
        Arc::new(chain.clone()),
        registry,
        true,
    );
    let processor = Arc::new(BlockProcessor::new(dispatcher));
    let breaker = Arc::new(CircuitBreaker::new(
        config.node_url.clone(),
        3,
        Duration::from_secs(60),
    ));
    let backfill = Backfill::new(Arc::clone(&processor), &config, Arc::clone(&breaker));
    Harness {
        processor,
        backfill,
        breaker,
    }
}

impl Harness {
    fn receive_up_to(&self, height: u64) {
        self.processor
            .dispatcher()
            .checkpoint()
            .execute(|cp| cp.last_block_height_received = height);
    }

    fn needs(&self, height: u64) -> bool {
        self.processor
            .dispatcher()
            .checkpoint()
            .execute(|cp| cp.needs_indexing(height))
    }
}

/// Chain with one transfer at every height in `1..=top`.
fn transfer_chain(top: u64) -> MockChain {
    let chain = MockChain::new();
    for h in 1..=top {
        chain.add_block(block(h, vec![transfer(&format!("0x{h:02x}"), h)]));
    }
    chain
}

fn sorted(mut heights: Vec<u64>) -> Vec<u64> {
    heights.sort_unstable();
    heights
}

#[tokio::test]
async fn blocks_apply_in_height_order() {
    let chain = transfer_chain(30);
    // Later heights come back first.
    chain.delay(2, Duration::from_millis(80));
    chain.delay(3, Duration::from_millis(50));
    chain.delay(4, Duration::from_millis(20));
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            from: 1,
            processed: vec![1, 2, 3, 4, 5],
            failed: vec![],
        }
    );
    assert_eq!(chain.decoded(), vec![1, 2, 3, 4, 5]);
    let heights: Vec<u64> = store.effects().iter().map(|e| e.block_height).collect();
    assert_eq!(heights, vec![1, 2, 3, 4, 5]);
    for height in 1..=5 {
        assert!(!h.needs(height));
    }
    assert!(h.needs(6));
}

#[tokio::test]
async fn waits_until_window_is_received() {
    let chain = transfer_chain(30);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(4);

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Waiting {
            lowest: 1,
            last_received: 4,
        }
    );
    assert!(chain.fetched().is_empty());
}

#[tokio::test]
async fn covered_heights_are_not_fetched() {
    let chain = transfer_chain(30);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);
    h.processor
        .process_block(&block(2, vec![transfer("0x02", 2)]))
        .await
        .unwrap();
    h.processor
        .process_block(&block(3, vec![transfer("0x03", 3)]))
        .await
        .unwrap();

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            from: 1,
            processed: vec![1, 4, 5],
            failed: vec![],
        }
    );
    assert_eq!(sorted(chain.fetched()), vec![1, 4, 5]);
    assert_eq!(store.effects().len(), 5);

    let next = h.backfill.run_cycle().await.unwrap();
    assert!(matches!(next, CycleOutcome::Completed { from: 6, .. }));
}

#[tokio::test]
async fn partially_indexed_height_is_still_fetched() {
    let chain = transfer_chain(30);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);
    h.processor
        .dispatcher()
        .checkpoint()
        .execute(|cp| cp.mark_indexed_kind(TRANSFER, 3));

    h.backfill.run_cycle().await.unwrap();

    assert!(chain.fetched().contains(&3));
    assert!(!h.needs(3));
    // Only the deposit side was left to mark at 3.
    assert!(store.effects().iter().all(|e| e.block_height != 3));
}

#[tokio::test]
async fn pruned_node_raises_floor() {
    let chain = transfer_chain(30);
    chain.prune_below(10);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            from: 10,
            processed: vec![10, 11, 12, 13, 14],
            failed: vec![],
        }
    );
    assert_eq!(h.backfill.floor(), 10);
    let below: Vec<u64> = chain.fetched().into_iter().filter(|h| *h < 10).collect();
    assert_eq!(below, vec![1]);

    h.backfill.run_cycle().await.unwrap();
    let below: Vec<u64> = chain.fetched().into_iter().filter(|h| *h < 10).collect();
    assert_eq!(below, vec![1]);
    assert_eq!(h.backfill.floor(), 10);
}

#[tokio::test]
async fn prune_retries_are_bounded() {
    let chain = transfer_chain(100);
    chain.prune_below(50);
    chain.hide_prune_floor();
    let store = TestStore::new();
    let config = IndexerConfig::builder()
        .node_url("ws://127.0.0.1:9944")
        .backfill_batch_size(5)
        .max_prune_retries(3)
        .build()
        .unwrap();
    let h = harness(&chain, &store, config);
    h.receive_up_to(100);

    let err = h.backfill.run_cycle().await.unwrap_err();

    assert!(matches!(
        err,
        IndexerError::PruneRetriesExhausted {
            floor: 4,
            attempts: 3
        }
    ));
    // Each retry asked for a strictly higher height.
    assert_eq!(chain.fetched(), vec![1, 2, 3]);
    assert_eq!(h.backfill.floor(), 4);
}

#[tokio::test]
async fn failed_fetch_is_reported_and_left_for_later() {
    let chain = transfer_chain(30);
    chain.fail_fetch(3);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            from: 1,
            processed: vec![1, 2, 4, 5],
            failed: vec![3],
        }
    );
    assert!(h.needs(3));
    assert!(!h.needs(4));
    assert!(!h.breaker.is_open());
}

#[tokio::test]
async fn open_circuit_skips_cycle() {
    let chain = transfer_chain(30);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);
    for _ in 0..3 {
        h.breaker.record_failure();
    }

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::CircuitOpen);
    assert!(chain.fetched().is_empty());
}

#[tokio::test]
async fn starts_at_configured_floor() {
    let chain = transfer_chain(40);
    let store = TestStore::new();
    let config = IndexerConfig::builder()
        .node_url("ws://127.0.0.1:9944")
        .backfill_batch_size(5)
        .min_block_height(20)
        .build()
        .unwrap();
    let h = harness(&chain, &store, config);
    h.receive_up_to(40);

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed { from: 20, .. }));
    assert!(chain.fetched().iter().all(|h| *h >= 20));
}

#[tokio::test]
async fn fetches_stay_within_batch() {
    let chain = transfer_chain(30);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    h.backfill.run_cycle().await.unwrap();
    h.backfill.run_cycle().await.unwrap();

    assert_eq!(sorted(chain.fetched()), (1..=10).collect::<Vec<_>>());
}

#[tokio::test]
async fn stuck_height_does_not_hold_back_later_windows() {
    let chain = transfer_chain(30);
    chain.add_block(block(2, vec![transfer("0x02", 2).rejected("BadOrigin")]));
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    let mut starts = Vec::new();
    for _ in 0..6 {
        match h.backfill.run_cycle().await.unwrap() {
            CycleOutcome::Completed { from, .. } => starts.push(from),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    // Five windows sweep up to the head, then the sweep returns to 2.
    assert_eq!(starts, vec![1, 6, 11, 16, 21, 2]);
    assert!(h.needs(2));
    for height in 3..=25 {
        assert!(!h.needs(height), "height {height} left behind");
    }
}

#[tokio::test]
async fn failing_first_height_is_stepped_over() {
    let chain = transfer_chain(30);
    chain.fail_fetch(1);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    assert!(h.backfill.run_cycle().await.is_err());
    let outcome = h.backfill.run_cycle().await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Completed { from: 2, .. }));
    assert!(h.needs(1));
}

#[tokio::test]
async fn panicking_fetch_is_reported_as_failed() {
    let chain = transfer_chain(30);
    chain.panic_on_fetch(3);
    let store = TestStore::new();
    let h = harness(&chain, &store, test_config());
    h.receive_up_to(30);

    let outcome = h.backfill.run_cycle().await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Completed {
            from: 1,
            processed: vec![1, 2, 4, 5],
            failed: vec![3],
        }
    );
    assert!(h.needs(3));
}
