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
#[cfg(feature = "json-storage")]
use crate::storage::json::JsonStore;
#[cfg(not(feature = "json-storage"))]
use crate::storage::memory::MemoryStore;
#[cfg(feature = "postgres")]
use crate::storage::postgres::PostgreSQLStore;
#[cfg(feature = "sqlite")]
use crate::storage::sqlite::SQLiteStore;
use crate::storage::CheckpointStore;
#[cfg(feature = "json-storage")]
use std::path::Path;

/// Default document written by the JSON backend when no URL is configured.
pub const DEFAULT_JSON_PATH: &str = "database/indexer.json";

/// Pick a backend from the URL scheme: `postgres://`, `sqlite:` or a
/// `file://` / `.json` path. Without a URL the JSON store at
/// [`DEFAULT_JSON_PATH`] is used.
pub async fn init_store(
    database_url: Option<String>,
) -> Result<Box<dyn CheckpointStore>, IndexerError> {
    if let Some(url) = database_url {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            #[cfg(feature = "postgres")]
            {
                let store = PostgreSQLStore::new(&url).await?;
                return Ok(Box::new(store));
            }
            #[cfg(not(feature = "postgres"))]
            {
                return Err(IndexerError::invalid_config(
                    "database_url",
                    "postgres feature disabled",
                ));
            }
        } else if url.starts_with("sqlite:") {
            #[cfg(feature = "sqlite")]
            {
                let store = SQLiteStore::new(&url).await?;
                return Ok(Box::new(store));
            }
            #[cfg(not(feature = "sqlite"))]
            {
                return Err(IndexerError::invalid_config(
                    "database_url",
                    "sqlite feature disabled",
                ));
            }
        } else if url.starts_with("file://") || url.ends_with(".json") {
            #[cfg(feature = "json-storage")]
            {
                let path = url.trim_start_matches("file://");
                return Ok(Box::new(JsonStore::new(path)));
            }
            #[cfg(not(feature = "json-storage"))]
            {
                return Err(IndexerError::invalid_config(
                    "database_url",
                    "json-storage feature disabled",
                ));
            }
        } else {
            return Err(IndexerError::invalid_config(
                "database_url",
                "Unsupported database URL",
            ));
        }
    }

    #[cfg(feature = "json-storage")]
    {
        let path = Path::new(DEFAULT_JSON_PATH);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(Box::new(JsonStore::new(path)))
    }

    #[cfg(not(feature = "json-storage"))]
    {
        tracing::warn!(
            target: "indexer",
            "no durable storage backend enabled, progress will not survive restarts"
        );
        Ok(Box::new(MemoryStore::new()))
    }
}
