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

use flamewire_msg_indexer::error::IndexerError;
use subxt::Error as SubxtError;

#[test]
fn construct_errors() {
    let e = IndexerError::BlockNotFound { block: 1 };
    assert_eq!(format!("{e}"), "Block 1 not found");

    let e = IndexerError::ConnectionFailed {
        url: "wss://node".into(),
        source: Box::new(SubxtError::Other("conn".into())),
    };
    assert!(format!("{e}").contains("Connection to wss://node failed"));

    let e = IndexerError::invalid_config("field", "bad");
    assert!(format!("{e}").contains("Invalid config"));

    let e = IndexerError::HandlerFailed {
        handler: "h".into(),
        block: 1,
        source: Box::new(std::io::Error::other("oops")),
    };
    assert!(format!("{e}").contains("Handler h failed"));

    let e = IndexerError::checkpoint("get_checkpoint", "json", std::io::Error::other("fail"));
    assert!(format!("{e}").contains("Checkpoint get_checkpoint failed using json"));

    let e = IndexerError::chain_request("fetch_block", SubxtError::Other("reset".into()));
    assert!(format!("{e}").contains("Chain call fetch_block failed"));
}

#[test]
fn indexing_errors_carry_context() {
    let e = IndexerError::ChainMismatch {
        expected: "polkadot".into(),
        actual: "kusama".into(),
        block: 7,
    };
    assert_eq!(
        format!("{e}"),
        "Block 7 belongs to chain kusama, expected polkadot"
    );

    let e = IndexerError::TxRejected {
        tx_hash: "7-1".into(),
        block: 7,
        reason: "BadOrigin".into(),
    };
    assert!(format!("{e}").contains("Tx 7-1 in block 7 was rejected"));

    let e = IndexerError::TxDecodeFailed {
        tx_hash: "7-2".into(),
        block: 7,
        source: "truncated".into(),
    };
    assert!(format!("{e}").contains("Failed to decode tx 7-2"));

    let e = IndexerError::PruneRetriesExhausted {
        floor: 500,
        attempts: 8,
    };
    assert!(format!("{e}").contains("below height 500 after 8 attempts"));

    let e = IndexerError::CircuitOpen {
        endpoint: "ws://node".into(),
    };
    assert_eq!(format!("{e}"), "Circuit open for ws://node");
}

#[test]
fn conversions() {
    let e: IndexerError = SubxtError::Other("x".into()).into();
    assert!(matches!(e, IndexerError::Subxt(_)));

    let e: IndexerError = std::io::Error::other("disk").into();
    assert!(matches!(e, IndexerError::Io(_)));

    let e: IndexerError = serde_json::from_str::<u64>("nope").unwrap_err().into();
    assert!(matches!(e, IndexerError::SerdeJson(_)));
}
