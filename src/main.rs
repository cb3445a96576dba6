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

use clap::{Parser, Subcommand};
use flamewire_msg_indexer::prelude::{
    init_store, CancellationToken, IndexerBuilder, SubstrateConfig, WebSocketUrl,
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Storage backend: postgres://, sqlite://, or a .json file [default: database/indexer.json]
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the chain: live tail plus periodic backfill
    Start {
        /// Lowest block height to backfill from
        #[arg(long, default_value_t = 1)]
        block: u64,

        /// Node websocket endpoint
        #[arg(long, env = "CHAIN_RPC", default_value = "ws://127.0.0.1:9944")]
        node_url: WebSocketUrl,

        /// Message kinds to index, as Pallet.Event
        #[arg(long = "kind", default_value = "Balances.Transfer")]
        kinds: Vec<String>,

        /// Seconds between backfill cycles
        #[arg(long, default_value_t = 60)]
        backfill_interval: u64,

        /// Heights per backfill window
        #[arg(long, default_value_t = 50)]
        batch_size: u64,

        /// Concurrent block fetches per window
        #[arg(long, default_value_t = 10)]
        concurrency: usize,

        /// Skip re-checking extrinsic outcomes before persisting
        #[arg(long)]
        no_validate: bool,
    },

    /// Delete the checkpoint and every indexed effect of a chain
    Delete {
        chain_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Start {
            block,
            node_url,
            kinds,
            backfill_interval,
            batch_size,
            concurrency,
            no_validate,
        } => {
            let mut builder = IndexerBuilder::<SubstrateConfig>::new()
                .connect(node_url)
                .min_block_height(block)
                .backfill_interval(Duration::from_secs(backfill_interval))
                .backfill_batch_size(batch_size)
                .fetch_concurrency(concurrency)
                .validate_txs(!no_validate);
            if let Some(url) = cli.database_url {
                builder = builder.database_url(url);
            }
            for kind in kinds {
                builder = builder.track_kind(kind);
            }
            let indexer = builder.build().await?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received");
                }
                on_signal.cancel();
            });

            indexer.run(cancel).await?;
        }
        Command::Delete { chain_id } => {
            let store = init_store(cli.database_url).await?;
            store.delete_chain_data(&chain_id).await?;
            store.close().await?;
            info!(chain_id = %chain_id, "chain data deleted");
        }
    }
    Ok(())
}
