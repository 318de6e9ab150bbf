//! # Gasless relay client
//!
//! Finds a relay willing to forward a meta-transaction and signs the request
//! the relay hub contract verifies on-chain.
//!
//! ## Flow
//! 1. [`registry`]: read `RelayAdded` / `RelayRemoved` events from the hub.
//! 2. [`selector`]: fold, filter and rank candidates, pushing recently
//!    failed relays (tracked in [`FailureRecord`]) to the back.
//! 3. [`pinger`]: probe `GET <url>/getaddr` in concurrent batches of three.
//! 4. [`client`]: build the digest, sign it, `POST <url>/relay`.

pub mod client;
pub mod config;
mod error;
pub mod failures;
pub mod http;
pub mod metrics;
pub mod pinger;
pub mod probe;
pub mod registry;
pub mod rpc;
pub mod selector;
pub mod signer;

pub use client::{RelayClient, RelayReceipt, RelayRequest};
pub use config::Config;
pub use error::Error;
pub use failures::FailureRecord;
pub use http::{HttpTransport, ReqwestTransport};
pub use pinger::{ActiveRelayPinger, PingedRelay, PING_BATCH_SIZE};
pub use probe::{PingResponse, ProbeOutcome};
pub use registry::{
    RegistryEvent, RegistryEventKind, RegistryReader, RelayAdded, RelayRecord, RpcRegistryReader,
};
pub use rpc::EthRpcClient;
pub use selector::{DefaultStrategy, RelaySelector, RelayStrategy, ScoredRelay, SelectionConfig};
pub use signer::TransactionSigner;
