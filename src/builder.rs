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

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use subxt::Config;

use crate::chain::substrate::SubstrateChain;
use crate::config::{IndexerConfig, IndexerConfigBuilder};
use crate::error::IndexerError;
use crate::handler::{HandlerRegistry, MessageHandler, PassthroughHandler};
use crate::indexer::Indexer;
use crate::storage::init::init_store;
use crate::types::BlockNumber;
use crate::validated_types::WebSocketUrl;

/// Convenient builder for an [`Indexer`] over a Substrate node.
pub struct IndexerBuilder<C: Config> {
    node_url: Option<WebSocketUrl>,
    config: IndexerConfigBuilder,
    registry: HandlerRegistry,
    _marker: PhantomData<C>,
}

impl<C> Default for IndexerBuilder<C>
where
    C: Config + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> IndexerBuilder<C>
where
    C: Config + Send + Sync + 'static,
{
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self {
            node_url: None,
            config: IndexerConfig::builder(),
            registry: HandlerRegistry::new(),
            _marker: PhantomData,
        }
    }

    /// Connect to the given websocket URL.
    pub fn connect(mut self, url: WebSocketUrl) -> Self {
        self.config = self.config.node_url(url.as_str());
        self.node_url = Some(url);
        self
    }

    /// Store progress and effects in the backend named by `url`.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config = self.config.database_url(url);
        self
    }

    /// Never backfill below `height`.
    pub fn min_block_height(mut self, height: BlockNumber) -> Self {
        self.config = self.config.min_block_height(height);
        self
    }

    pub fn backfill_interval(mut self, interval: Duration) -> Self {
        self.config = self.config.backfill_interval(interval);
        self
    }

    pub fn backfill_batch_size(mut self, size: u64) -> Self {
        self.config = self.config.backfill_batch_size(size);
        self
    }

    pub fn fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.config = self.config.fetch_concurrency(concurrency);
        self
    }

    pub fn validate_txs(mut self, enabled: bool) -> Self {
        self.config = self.config.validate_txs(enabled);
        self
    }

    /// Add a handler to the indexer.
    pub fn add_handler(mut self, handler: impl MessageHandler + 'static) -> Self {
        self.registry.register(handler);
        self
    }

    pub fn add_dyn_handler(mut self, handler: Arc<dyn MessageHandler>) -> Self {
        self.registry.register_arc(handler);
        self
    }

    /// Index `kind` storing its payload unchanged.
    pub fn track_kind(self, kind: impl Into<String>) -> Self {
        self.add_handler(PassthroughHandler::new(kind))
    }

    /// Connect to the node, open the store and load the checkpoint.
    pub async fn build(self) -> Result<Indexer<SubstrateChain<C>>, IndexerError> {
        let node_url = self
            .node_url
            .ok_or_else(|| IndexerError::invalid_config("node_url", "missing"))?;
        if self.registry.is_empty() {
            return Err(IndexerError::invalid_config(
                "handlers",
                "at least one message kind must be registered",
            ));
        }
        let config = self.config.build()?;

        let chain = SubstrateChain::<C>::connect(&node_url).await?;
        let store = init_store(config.database_url.clone()).await?;
        Indexer::new(chain, store, self.registry, config).await
    }
}
