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

pub mod backfill;
pub mod builder;
pub mod chain;
pub mod checkpoint;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod indexer;
pub mod interval;
pub mod prelude;
pub mod processor;
pub mod retry;
pub mod safe_checkpoint;
pub mod storage;
pub mod types;
pub mod validated_types;

pub use crate::backfill::{Backfill, CycleOutcome};
pub use crate::builder::IndexerBuilder;
pub use crate::chain::{BlockStream, Blockchain};
pub use crate::checkpoint::{Checkpoint, TrackedKind};
pub use crate::config::IndexerConfig;
pub use crate::dispatcher::{DispatchOutcome, Dispatcher};
pub use crate::error::IndexerError;
pub use crate::handler::{HandlerRegistry, MessageHandler, MsgContext, PassthroughHandler};
pub use crate::indexer::Indexer;
pub use crate::interval::{Interval, IntervalSet};
pub use crate::processor::{BlockProcessor, BlockReport};
pub use crate::retry::{retry_with_backoff, CircuitBreaker, RetryConfig};
pub use crate::safe_checkpoint::{Claim, ClaimOutcome, SafeCheckpoint};
pub use crate::storage::CheckpointStore;
pub use crate::types::{Block, BlockNumber, EffectRecord, FetchedBlock, Message, TxStatus};
pub use crate::validated_types::{PostgresUrl, SqliteUrl, WebSocketUrl};
