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

use flamewire_msg_indexer::config::IndexerConfig;
use flamewire_msg_indexer::validated_types::{SqliteUrl, WebSocketUrl};
use flamewire_msg_indexer::IndexerError;
use std::time::Duration;

fn invalid_field(result: Result<IndexerConfig, IndexerError>) -> String {
    match result {
        Err(IndexerError::InvalidConfig { field, .. }) => field,
        other => panic!("wrong result: {other:?}"),
    }
}

#[test]
fn builder_valid() {
    let cfg = IndexerConfig::builder()
        .node_url("wss://node")
        .with_sqlite("sqlite://indexer.db")
        .min_block_height(10)
        .backfill_batch_size(20)
        .fetch_concurrency(3)
        .validate_txs(false)
        .build()
        .expect("should build");
    assert_eq!(cfg.node_url, "wss://node");
    assert_eq!(cfg.database_url.as_deref(), Some("sqlite://indexer.db"));
    assert_eq!(cfg.min_block_height, 10);
    assert_eq!(cfg.backfill_batch_size, 20);
    assert_eq!(cfg.fetch_concurrency, 3);
    assert!(!cfg.validate_txs);
}

#[test]
fn builder_defaults() {
    let cfg = IndexerConfig::builder()
        .node_url("ws://node")
        .build()
        .expect("should build");
    assert_eq!(cfg.database_url, None);
    assert_eq!(cfg.min_block_height, 1);
    assert_eq!(cfg.backfill_interval, Duration::from_secs(60));
    assert_eq!(cfg.backfill_batch_size, 50);
    assert_eq!(cfg.fetch_concurrency, 10);
    assert_eq!(cfg.max_prune_retries, 8);
    assert!(cfg.validate_txs);
}

#[test]
fn builder_empty_node_url() {
    let result = IndexerConfig::builder().node_url("").build();
    assert_eq!(invalid_field(result), "node_url");
}

#[test]
fn builder_wrong_format() {
    let result = IndexerConfig::builder()
        .node_url("http://localhost")
        .build();
    let err = result.err().unwrap();
    assert!(format!("{err}").contains("must start"));
}

#[test]
fn builder_empty_db_url() {
    let result = IndexerConfig::builder()
        .node_url("ws://node")
        .with_postgres("")
        .build();
    assert_eq!(invalid_field(result), "database_url");
}

#[test]
fn builder_bad_postgres_scheme() {
    let result = IndexerConfig::builder()
        .node_url("ws://node")
        .with_postgres("postgresx://db")
        .build();
    assert_eq!(invalid_field(result), "database_url");
}

#[test]
fn builder_rejects_zero_values() {
    let base = || IndexerConfig::builder().node_url("ws://node");
    assert_eq!(invalid_field(base().min_block_height(0).build()), "min_block_height");
    assert_eq!(
        invalid_field(base().backfill_interval(Duration::ZERO).build()),
        "backfill_interval"
    );
    assert_eq!(
        invalid_field(base().backfill_batch_size(0).build()),
        "backfill_batch_size"
    );
    assert_eq!(invalid_field(base().fetch_concurrency(0).build()), "fetch_concurrency");
    assert_eq!(invalid_field(base().max_prune_retries(0).build()), "max_prune_retries");
}

#[test]
fn websocket_url_parsing() {
    let url: WebSocketUrl = "wss://archive.node:443".parse().unwrap();
    assert_eq!(url.host(), Some("archive.node"));
    assert!(WebSocketUrl::parse("https://archive.node").is_err());
    assert!(WebSocketUrl::parse("not a url").is_err());
}

#[test]
fn sqlite_url_parsing() {
    assert_eq!(
        SqliteUrl::parse("sqlite::memory:").unwrap().as_str(),
        "sqlite::memory:"
    );
    assert!(SqliteUrl::parse("sqlite://data/indexer.db").is_ok());
    assert!(SqliteUrl::parse("sqlite://").is_err());
    assert!(SqliteUrl::parse("file://indexer.db").is_err());
}
