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

use crate::error::IndexerError;
use crate::types::BlockNumber;
use crate::validated_types::{PostgresUrl, SqliteUrl, WebSocketUrl};
use std::time::Duration;

pub const DEFAULT_MIN_BLOCK_HEIGHT: BlockNumber = 1;
pub const DEFAULT_BACKFILL_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_BACKFILL_BATCH_SIZE: u64 = 50;
pub const DEFAULT_FETCH_CONCURRENCY: usize = 10;
pub const DEFAULT_MAX_PRUNE_RETRIES: usize = 8;

/// Configuration for the [`Indexer`](crate::indexer::Indexer).
#[derive(Clone, Debug)]
pub struct IndexerConfig {
    pub node_url: String,
    pub database_url: Option<String>,
    /// Lowest height backfill will ever ask for.
    pub min_block_height: BlockNumber,
    pub backfill_interval: Duration,
    /// Heights per backfill window.
    pub backfill_batch_size: u64,
    /// Concurrent block fetches within one window.
    pub fetch_concurrency: usize,
    /// Re-check each transaction's on-chain outcome before persisting.
    pub validate_txs: bool,
    /// Pruned responses tolerated in one backfill cycle.
    pub max_prune_retries: usize,
}

impl IndexerConfig {
    /// Create a new [`IndexerConfigBuilder`].
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::new()
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.node_url.trim().is_empty() {
            return Err(IndexerError::invalid_config("node_url", "cannot be empty"));
        }
        WebSocketUrl::parse(&self.node_url)?;

        if let Some(db) = &self.database_url {
            if db.trim().is_empty() {
                return Err(IndexerError::invalid_config(
                    "database_url",
                    "cannot be empty",
                ));
            }
            if db.starts_with("postgres") {
                PostgresUrl::parse(db)?;
            } else if db.starts_with("sqlite") {
                SqliteUrl::parse(db)?;
            }
        }

        if self.min_block_height == 0 {
            return Err(IndexerError::invalid_config(
                "min_block_height",
                "must be at least 1",
            ));
        }
        if self.backfill_interval.is_zero() {
            return Err(IndexerError::invalid_config(
                "backfill_interval",
                "must be greater than zero",
            ));
        }
        if self.backfill_batch_size == 0 {
            return Err(IndexerError::invalid_config(
                "backfill_batch_size",
                "must be at least 1",
            ));
        }
        if self.fetch_concurrency == 0 {
            return Err(IndexerError::invalid_config(
                "fetch_concurrency",
                "must be at least 1",
            ));
        }
        if self.max_prune_retries == 0 {
            return Err(IndexerError::invalid_config(
                "max_prune_retries",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

/// Builder pattern for [`IndexerConfig`].
pub struct IndexerConfigBuilder {
    config: IndexerConfig,
}

impl Default for IndexerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: IndexerConfig {
                node_url: String::new(),
                database_url: None,
                min_block_height: DEFAULT_MIN_BLOCK_HEIGHT,
                backfill_interval: DEFAULT_BACKFILL_INTERVAL,
                backfill_batch_size: DEFAULT_BACKFILL_BATCH_SIZE,
                fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
                validate_txs: true,
                max_prune_retries: DEFAULT_MAX_PRUNE_RETRIES,
            },
        }
    }

    /// Set the node URL.
    pub fn node_url(mut self, url: impl Into<String>) -> Self {
        self.config.node_url = url.into();
        self
    }

    /// Store data in the backend named by `url`.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    /// Configure a PostgreSQL backend.
    pub fn with_postgres(self, url: impl Into<String>) -> Self {
        self.database_url(url)
    }

    /// Configure a SQLite backend.
    pub fn with_sqlite(self, url: impl Into<String>) -> Self {
        self.database_url(url)
    }

    /// Never backfill below `height`.
    pub fn min_block_height(mut self, height: BlockNumber) -> Self {
        self.config.min_block_height = height;
        self
    }

    pub fn backfill_interval(mut self, interval: Duration) -> Self {
        self.config.backfill_interval = interval;
        self
    }

    pub fn backfill_batch_size(mut self, size: u64) -> Self {
        self.config.backfill_batch_size = size;
        self
    }

    pub fn fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.config.fetch_concurrency = concurrency;
        self
    }

    pub fn validate_txs(mut self, enabled: bool) -> Self {
        self.config.validate_txs = enabled;
        self
    }

    pub fn max_prune_retries(mut self, retries: usize) -> Self {
        self.config.max_prune_retries = retries;
        self
    }

    /// Build the configuration and validate it.
    pub fn build(self) -> Result<IndexerConfig, IndexerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
