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
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Node endpoint, `ws://` or `wss://`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebSocketUrl(Url);

impl WebSocketUrl {
    pub fn parse(input: &str) -> Result<Self, IndexerError> {
        let url = Url::parse(input)
            .map_err(|e| IndexerError::invalid_config("node_url", format!("invalid URL: {e}")))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self(url)),
            _ => Err(IndexerError::invalid_config(
                "node_url",
                "must start with ws:// or wss://",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn host(&self) -> Option<&str> {
        self.0.host_str()
    }
}

impl FromStr for WebSocketUrl {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for WebSocketUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated PostgreSQL database URL
#[derive(Clone, Debug)]
pub struct PostgresUrl(Url);

impl PostgresUrl {
    pub fn parse(input: &str) -> Result<Self, IndexerError> {
        let url = Url::parse(input)
            .map_err(|_| IndexerError::invalid_config("database_url", "invalid URL"))?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(Self(url)),
            _ => Err(IndexerError::invalid_config(
                "database_url",
                "must start with postgres:// or postgresql://",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for PostgresUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// SQLite location: `sqlite://path` or `sqlite::memory:`.
#[derive(Clone, Debug)]
pub struct SqliteUrl(String);

impl SqliteUrl {
    pub fn parse(input: &str) -> Result<Self, IndexerError> {
        if input == "sqlite::memory:" {
            return Ok(Self(input.to_string()));
        }
        match input.strip_prefix("sqlite://") {
            Some(path) if !path.is_empty() => Ok(Self(input.to_string())),
            Some(_) => Err(IndexerError::invalid_config(
                "database_url",
                "sqlite URL needs a path",
            )),
            None => Err(IndexerError::invalid_config(
                "database_url",
                "must start with sqlite://",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SqliteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
