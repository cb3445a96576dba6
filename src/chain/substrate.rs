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

//! Substrate node access over subxt.
//!
//! An extrinsic plays the part of a transaction: its messages are the
//! events emitted while it was applied, keyed `Pallet.Variant`.

use crate::chain::{BlockStream, Blockchain};
use crate::error::IndexerError;
use crate::types::{Block, BlockNumber, FetchedBlock, Message, TxStatus};
use crate::validated_types::WebSocketUrl;
use async_trait::async_trait;
use futures::StreamExt;
use scale_value::Composite;
use std::collections::BTreeMap;
use subxt::backend::{legacy::LegacyRpcMethods, rpc::RpcClient};
use subxt::config::{HashFor, Header};
use subxt::events::{Events, Phase};
use subxt::{Config, OnlineClient};
use tracing::{debug, warn};

/// Events of one extrinsic within a block.
///
/// A failed extrinsic keeps the events it really emitted (fees, refunds),
/// so they are indexed like any other.
#[derive(Clone, Debug)]
pub struct Extrinsic {
    pub id: String,
    pub index: u32,
    /// Hash of the block the extrinsic was read from.
    block_hash: Vec<u8>,
    messages: Vec<Message>,
    decode_error: Option<String>,
}

impl Extrinsic {
    fn new(height: BlockNumber, block_hash: &[u8], index: u32) -> Self {
        Self {
            id: format!("{height}-{index}"),
            index,
            block_hash: block_hash.to_vec(),
            messages: Vec::new(),
            decode_error: None,
        }
    }

    /// Stand-in for the extrinsics whose events follow an undecodable one.
    fn remainder(height: BlockNumber, block_hash: &[u8], error: String) -> Self {
        Self {
            id: format!("{height}-undecodable"),
            index: u32::MAX,
            block_hash: block_hash.to_vec(),
            messages: Vec::new(),
            decode_error: Some(error),
        }
    }
}

pub struct SubstrateChain<C: Config> {
    url: String,
    chain_id: String,
    client: OnlineClient<C>,
    rpc: LegacyRpcMethods<C>,
}

impl<C: Config> Clone for SubstrateChain<C> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            chain_id: self.chain_id.clone(),
            client: self.client.clone(),
            rpc: self.rpc.clone(),
        }
    }
}

impl<C> SubstrateChain<C>
where
    C: Config + Send + Sync + 'static,
{
    pub async fn connect(url: &WebSocketUrl) -> Result<Self, IndexerError> {
        let connection_failed = |e: subxt::Error| IndexerError::ConnectionFailed {
            url: url.to_string(),
            source: Box::new(e),
        };
        let client = OnlineClient::<C>::from_insecure_url(url.as_str())
            .await
            .map_err(connection_failed)?;
        let rpc_client = RpcClient::from_insecure_url(url.as_str())
            .await
            .map_err(|e| connection_failed(subxt::Error::from(e)))?;
        let rpc = LegacyRpcMethods::<C>::new(rpc_client);
        let chain_id = rpc
            .system_chain()
            .await
            .map_err(|e| IndexerError::chain_request("system_chain", subxt::Error::from(e)))?;

        Ok(Self {
            url: url.to_string(),
            chain_id,
            client,
            rpc,
        })
    }

    async fn assemble(
        &self,
        block: subxt::blocks::Block<C, OnlineClient<C>>,
    ) -> Result<Block<Extrinsic>, IndexerError> {
        let height: BlockNumber = block.header().number().into();
        let hash = block.hash();
        let events = block.events().await?;
        let time = self.block_time(hash).await;
        Ok(Block {
            chain_id: self.chain_id.clone(),
            height,
            time,
            txs: group_by_extrinsic(height, hash.as_ref(), &events),
        })
    }

    /// `Timestamp.Now` in seconds, or 0 when the runtime has no such entry.
    async fn block_time(&self, hash: HashFor<C>) -> i64 {
        let address = subxt::dynamic::storage("Timestamp", "Now", ());
        let millis = match self.client.storage().at(hash).fetch(&address).await {
            Ok(Some(value)) => value.to_value().ok().and_then(|v| v.as_u128()),
            Ok(None) => None,
            Err(e) => {
                debug!(target: "indexer", error = %e, "timestamp lookup failed");
                None
            }
        };
        millis.map(|ms| (ms / 1000) as i64).unwrap_or_default()
    }

    async fn load(&self, height: BlockNumber) -> Result<Option<Block<Extrinsic>>, IndexerError> {
        let hash = self
            .rpc
            .chain_get_block_hash(Some(height.into()))
            .await
            .map_err(|e| IndexerError::from(subxt::Error::from(e)))?;
        let Some(hash) = hash else {
            return Ok(None);
        };
        let block = self.client.blocks().at(hash).await?;
        self.assemble(block).await.map(Some)
    }

    async fn finalized_height(&self) -> Result<BlockNumber, IndexerError> {
        let hash = self
            .rpc
            .chain_get_finalized_head()
            .await
            .map_err(|e| IndexerError::from(subxt::Error::from(e)))?;
        let header = self
            .rpc
            .chain_get_header(Some(hash))
            .await
            .map_err(|e| IndexerError::from(subxt::Error::from(e)))?
            .ok_or(IndexerError::BlockNotFound { block: 0 })?;
        Ok(header.number().into())
    }

    /// Binary search for the first height above `missing` whose state the
    /// node still serves.
    async fn lowest_retained(&self, missing: BlockNumber) -> Result<BlockNumber, IndexerError> {
        let finalized = self.finalized_height().await?;
        let mut lo = missing + 1;
        let mut hi = finalized.max(lo);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if matches!(self.load(mid).await, Ok(Some(_))) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(hi)
    }
}

fn is_pruned_error(err: &IndexerError) -> bool {
    let msg = err.to_string().to_ascii_lowercase();
    msg.contains("state already discarded")
        || msg.contains("is not available")
        || msg.contains("pruned")
}

fn fields_to_json(fields: &Composite<u32>) -> Result<serde_json::Value, IndexerError> {
    Ok(serde_json::to_value(fields)?)
}

fn group_by_extrinsic<C: Config>(
    height: BlockNumber,
    block_hash: &[u8],
    events: &Events<C>,
) -> Vec<Extrinsic> {
    let mut txs: BTreeMap<u32, Extrinsic> = BTreeMap::new();
    let mut current: Option<u32> = None;
    for evt in events.iter() {
        let evt = match evt {
            Ok(evt) => evt,
            Err(e) => {
                // Event boundaries are lost from here on. The extrinsic in
                // progress may have more events, and everything after it
                // is unknown.
                let error = e.to_string();
                if let Some(tx) = current.and_then(|index| txs.get_mut(&index)) {
                    tx.decode_error = Some(error.clone());
                }
                let mut out: Vec<Extrinsic> = txs.into_values().collect();
                out.push(Extrinsic::remainder(height, block_hash, error));
                return out;
            }
        };
        let Phase::ApplyExtrinsic(index) = evt.phase() else {
            current = None;
            continue;
        };
        current = Some(index);
        let tx = txs
            .entry(index)
            .or_insert_with(|| Extrinsic::new(height, block_hash, index));

        match (evt.pallet_name(), evt.variant_name()) {
            ("System", "ExtrinsicSuccess") | ("System", "ExtrinsicFailed") => continue,
            _ => {}
        }

        let kind = format!("{}.{}", evt.pallet_name(), evt.variant_name());
        let payload = evt
            .field_values()
            .map_err(IndexerError::from)
            .and_then(|fields| fields_to_json(&fields));
        match payload {
            Ok(payload) => tx.messages.push(Message::new(kind, payload)),
            Err(e) => tx.decode_error = Some(format!("{kind}: {e}")),
        }
    }
    txs.into_values().collect()
}

#[async_trait]
impl<C> Blockchain for SubstrateChain<C>
where
    C: Config + Send + Sync + 'static,
{
    type Tx = Extrinsic;

    async fn chain_id(&self) -> Result<String, IndexerError> {
        Ok(self.chain_id.clone())
    }

    async fn subscribe_new_blocks(&self) -> Result<BlockStream<Extrinsic>, IndexerError> {
        let sub = self.client.blocks().subscribe_finalized().await?;
        let this = self.clone();
        let stream = sub.then(move |res| {
            let this = this.clone();
            async move { this.assemble(res?).await }
        });
        Ok(stream.boxed())
    }

    async fn fetch_block(
        &self,
        height: BlockNumber,
    ) -> Result<FetchedBlock<Extrinsic>, IndexerError> {
        match self.load(height).await {
            Ok(Some(block)) => Ok(FetchedBlock::Block(block)),
            Ok(None) => Err(IndexerError::BlockNotFound { block: height }),
            Err(e) if is_pruned_error(&e) => {
                let lowest_available = self.lowest_retained(height).await?;
                warn!(
                    target: "indexer",
                    height,
                    lowest_available,
                    "node no longer retains block"
                );
                Ok(FetchedBlock::Pruned { lowest_available })
            }
            Err(e) => Err(e),
        }
    }

    fn decode_tx(&self, tx: &Extrinsic, height: BlockNumber) -> Result<Vec<Message>, IndexerError> {
        match &tx.decode_error {
            Some(error) => Err(IndexerError::TxDecodeFailed {
                tx_hash: tx.id.clone(),
                block: height,
                source: error.clone().into(),
            }),
            None => Ok(tx.messages.clone()),
        }
    }

    fn tx_hash(&self, tx: &Extrinsic) -> String {
        tx.id.clone()
    }

    /// Confirm the block the extrinsic came from is still the canonical
    /// block at its height.
    async fn validate_tx(
        &self,
        tx: &Extrinsic,
        height: BlockNumber,
    ) -> Result<TxStatus, IndexerError> {
        let canonical = self
            .rpc
            .chain_get_block_hash(Some(height.into()))
            .await
            .map_err(|e| IndexerError::chain_request("chain_getBlockHash", subxt::Error::from(e)))?;
        Ok(match canonical {
            Some(hash) if hash.as_ref() == tx.block_hash.as_slice() => TxStatus::Confirmed,
            Some(_) => TxStatus::Rejected {
                reason: format!("block {height} was replaced on the canonical chain"),
            },
            None => return Err(IndexerError::BlockNotFound { block: height }),
        })
    }

    async fn close(&self) -> Result<(), IndexerError> {
        debug!(target: "indexer", url = %self.url, "closing substrate connection");
        Ok(())
    }
}
