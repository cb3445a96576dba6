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

pub use crate::builder::IndexerBuilder;
pub use crate::chain::substrate::{Extrinsic, SubstrateChain};
pub use crate::chain::Blockchain;
pub use crate::checkpoint::Checkpoint;
pub use crate::config::IndexerConfig;
pub use crate::error::IndexerError;
pub use crate::handler::{HandlerRegistry, MessageHandler, MsgContext, PassthroughHandler};
pub use crate::indexer::Indexer;
pub use crate::storage::init::init_store;
pub use crate::storage::CheckpointStore;
pub use crate::types::{Block, BlockNumber, EffectRecord, Message};
pub use crate::validated_types::WebSocketUrl;

pub use async_trait::async_trait;
pub use subxt::config::{PolkadotConfig, SubstrateConfig};
pub use tokio_util::sync::CancellationToken;
