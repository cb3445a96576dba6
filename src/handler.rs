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
use crate::types::{BlockNumber, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Where a message came from.
#[derive(Clone, Debug)]
pub struct MsgContext {
    pub chain_id: String,
    pub block_height: BlockNumber,
    pub block_time: i64,
    pub tx_hash: String,
}

/// Turns one recognised message kind into the payload stored with its
/// effect record.
#[allow(unused_variables)]
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Kind identifier this handler is registered under.
    fn kind(&self) -> &str;

    fn payload(
        &self,
        msg: &Message,
        ctx: &MsgContext,
    ) -> Result<serde_json::Value, IndexerError> {
        Ok(msg.payload.clone())
    }

    async fn handle_error(&self, error: &IndexerError, ctx: &MsgContext) {}
}

/// Stores the decoded payload unchanged.
pub struct PassthroughHandler {
    kind: String,
}

impl PassthroughHandler {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into() }
    }
}

impl MessageHandler for PassthroughHandler {
    fn kind(&self) -> &str {
        &self.kind
    }
}

/// Statically registered handlers, looked up by kind ignoring ASCII case.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any handler of the same kind.
    pub fn register(&mut self, handler: impl MessageHandler + 'static) {
        self.register_arc(Arc::new(handler));
    }

    pub fn register_arc(&mut self, handler: Arc<dyn MessageHandler>) {
        self.handlers
            .retain(|h| !h.kind().eq_ignore_ascii_case(handler.kind()));
        self.handlers.push(handler);
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers
            .iter()
            .find(|h| h.kind().eq_ignore_ascii_case(kind))
    }

    pub fn kinds(&self) -> Vec<String> {
        self.handlers.iter().map(|h| h.kind().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
