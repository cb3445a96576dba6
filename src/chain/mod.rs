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

pub mod substrate;

use crate::error::IndexerError;
use crate::types::{Block, BlockNumber, FetchedBlock, Message, TxStatus};
use async_trait::async_trait;
use futures::stream::BoxStream;

pub type BlockStream<T> = BoxStream<'static, Result<Block<T>, IndexerError>>;

/// Node access the indexer needs. Any transport providing these calls can
/// drive the indexer.
#[allow(unused_variables)]
#[async_trait]
pub trait Blockchain: Send + Sync + 'static {
    type Tx: Send + Sync + 'static;

    async fn chain_id(&self) -> Result<String, IndexerError>;

    /// Newly produced blocks. The stream may end when the connection drops;
    /// callers subscribe again.
    async fn subscribe_new_blocks(&self) -> Result<BlockStream<Self::Tx>, IndexerError>;

    async fn fetch_block(
        &self,
        height: BlockNumber,
    ) -> Result<FetchedBlock<Self::Tx>, IndexerError>;

    fn decode_tx(&self, tx: &Self::Tx, height: BlockNumber) -> Result<Vec<Message>, IndexerError>;

    fn tx_hash(&self, tx: &Self::Tx) -> String;

    /// Confirm the transaction was not rejected on-chain.
    async fn validate_tx(
        &self,
        tx: &Self::Tx,
        height: BlockNumber,
    ) -> Result<TxStatus, IndexerError> {
        Ok(TxStatus::Confirmed)
    }

    async fn close(&self) -> Result<(), IndexerError>;
}
