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

use crate::checkpoint::Checkpoint;
use crate::error::IndexerError;
use crate::storage::CheckpointStore;
use crate::types::EffectRecord;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

const BACKEND: &str = "postgres";

fn db_error(operation: &str) -> impl FnOnce(sqlx::Error) -> IndexerError + '_ {
    move |e| IndexerError::checkpoint(operation, BACKEND, e)
}

pub struct PostgreSQLStore {
    pool: PgPool,
}

impl PostgreSQLStore {
    pub async fn new(database_url: &str) -> Result<Self, IndexerError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(db_error("connect"))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS indexer_chain_info (
                chain_id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(db_error("init"))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS indexed_effects (
                id BIGSERIAL PRIMARY KEY,
                chain_id TEXT NOT NULL,
                tx_hash TEXT NOT NULL,
                kind TEXT NOT NULL,
                block_height BIGINT NOT NULL,
                block_time BIGINT NOT NULL,
                payload TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(db_error("init"))?;

        Ok(Self { pool })
    }

    /// Effects recorded for `chain_id`, in insertion order.
    pub async fn effects(&self, chain_id: &str) -> Result<Vec<EffectRecord>, IndexerError> {
        let rows: Vec<(String, String, i64, i64, String)> = sqlx::query_as(
            "SELECT tx_hash, kind, block_height, block_time, payload
             FROM indexed_effects WHERE chain_id = $1 ORDER BY id",
        )
        .bind(chain_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("effects"))?;

        rows.into_iter()
            .map(|(tx_hash, kind, height, time, payload)| {
                Ok(EffectRecord {
                    tx_hash,
                    kind,
                    block_height: height as u64,
                    block_time: time,
                    payload: serde_json::from_str(&payload)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for PostgreSQLStore {
    async fn get_checkpoint(&self, chain_id: &str) -> Result<Checkpoint, IndexerError> {
        let row: Option<String> =
            sqlx::query_scalar("SELECT document FROM indexer_chain_info WHERE chain_id = $1")
                .bind(chain_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get_checkpoint"))?;

        match row {
            Some(document) => Ok(serde_json::from_str(&document)?),
            None => Ok(Checkpoint::new(chain_id)),
        }
    }

    async fn upsert_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), IndexerError> {
        let document = serde_json::to_string(checkpoint)?;
        sqlx::query(
            "INSERT INTO indexer_chain_info (chain_id, document)
             VALUES ($1, $2)
             ON CONFLICT (chain_id) DO UPDATE SET document = EXCLUDED.document",
        )
        .bind(&checkpoint.chain_id)
        .bind(document)
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert_checkpoint"))?;

        Ok(())
    }

    async fn persist_effects(
        &self,
        effects: &[EffectRecord],
        checkpoint: &Checkpoint,
    ) -> Result<(), IndexerError> {
        let document = serde_json::to_string(checkpoint)?;
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("persist_effects"))?;

        for effect in effects {
            sqlx::query(
                "INSERT INTO indexed_effects
                 (chain_id, tx_hash, kind, block_height, block_time, payload)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(&checkpoint.chain_id)
            .bind(&effect.tx_hash)
            .bind(&effect.kind)
            .bind(effect.block_height as i64)
            .bind(effect.block_time)
            .bind(effect.payload.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error("persist_effects"))?;
        }

        sqlx::query(
            "INSERT INTO indexer_chain_info (chain_id, document)
             VALUES ($1, $2)
             ON CONFLICT (chain_id) DO UPDATE SET document = EXCLUDED.document",
        )
        .bind(&checkpoint.chain_id)
        .bind(document)
        .execute(&mut *tx)
        .await
        .map_err(db_error("persist_effects"))?;

        tx.commit().await.map_err(db_error("persist_effects"))
    }

    async fn delete_chain_data(&self, chain_id: &str) -> Result<(), IndexerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("delete_chain_data"))?;
        sqlx::query("DELETE FROM indexed_effects WHERE chain_id = $1")
            .bind(chain_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_chain_data"))?;
        sqlx::query("DELETE FROM indexer_chain_info WHERE chain_id = $1")
            .bind(chain_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete_chain_data"))?;
        tx.commit().await.map_err(db_error("delete_chain_data"))
    }

    async fn close(&self) -> Result<(), IndexerError> {
        self.pool.close().await;
        Ok(())
    }
}
