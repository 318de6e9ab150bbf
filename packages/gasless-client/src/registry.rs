//! Relay hub registry: event model, chronological fold, and the
//! JSON-RPC backed reader.

use alloy_primitives::keccak256;
use gasless_types::{decode_hex, Address, B256, U256};
use linked_hash_map::LinkedHashMap;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::rpc::{parse_quantity, EthRpcClient, LogEntry};

pub const RELAY_ADDED_EVENT: &str =
    "RelayAdded(address,address,uint256,uint256,uint256,string)";
pub const RELAY_REMOVED_EVENT: &str = "RelayRemoved(address,uint256)";
const GET_NONCE_SIGNATURE: &str = "getNonce(address)";

/// Payload of a `RelayAdded` event, as emitted by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayAdded {
    pub relay: Address,
    pub owner: Address,
    pub transaction_fee: U256,
    pub stake: U256,
    pub unstake_delay: U256,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEventKind {
    Added(RelayAdded),
    Removed { relay: Address },
}

/// One registry log, positioned on chain by `(block_number, log_index)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEvent {
    pub block_number: u64,
    pub log_index: u64,
    pub kind: RegistryEventKind,
}

impl RegistryEvent {
    pub fn relay(&self) -> Address {
        match &self.kind {
            RegistryEventKind::Added(added) => added.relay,
            RegistryEventKind::Removed { relay } => *relay,
        }
    }
}

/// A validated relay advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRecord {
    pub address: Address,
    pub owner: Address,
    pub url: String,
    /// Fee as a percentage of the gas cost.
    pub transaction_fee: u64,
    pub stake: U256,
    /// Seconds.
    pub unstake_delay: u64,
}

impl TryFrom<RelayAdded> for RelayRecord {
    type Error = String;

    fn try_from(added: RelayAdded) -> Result<Self, Self::Error> {
        let url = added.url.trim();
        if url.is_empty() {
            return Err("empty url".into());
        }
        Ok(Self {
            address: added.relay,
            owner: added.owner,
            url: url.to_string(),
            transaction_fee: to_u64(added.transaction_fee, "transaction fee")?,
            stake: added.stake,
            unstake_delay: to_u64(added.unstake_delay, "unstake delay")?,
        })
    }
}

fn to_u64(value: U256, field: &str) -> Result<u64, String> {
    if value > U256::from(u64::MAX) {
        return Err(format!("{field} {value} exceeds u64"));
    }
    Ok(value.as_limbs()[0])
}

/// Fold registry events into the latest advertisement per relay.
///
/// Events are applied in `(block_number, log_index)` order; equal positions
/// keep their input order. A later `RelayAdded` replaces the payload but
/// keeps the relay's first-seen position; `RelayRemoved` drops it, so a
/// re-add after removal is appended at the end.
pub fn fold_events(mut events: Vec<RegistryEvent>) -> Vec<RelayAdded> {
    events.sort_by_key(|e| (e.block_number, e.log_index));

    let mut latest: LinkedHashMap<Address, RelayAdded> = LinkedHashMap::new();
    for event in events {
        match event.kind {
            RegistryEventKind::Added(added) => match latest.get_mut(&added.relay) {
                Some(slot) => *slot = added,
                None => {
                    latest.insert(added.relay, added);
                }
            },
            RegistryEventKind::Removed { relay } => {
                latest.remove(&relay);
            }
        }
    }
    latest.into_iter().map(|(_, added)| added).collect()
}

/// Read side of the relay hub contract.
pub trait RegistryReader: Send + Sync {
    /// Every `RelayAdded` / `RelayRemoved` event in the query window.
    fn relay_events(&self) -> impl Future<Output = Result<Vec<RegistryEvent>, crate::Error>> + Send;

    /// The hub's replay-protection nonce for `from`.
    fn nonce(&self, from: Address) -> impl Future<Output = Result<U256, crate::Error>> + Send;

    /// Pending transaction count of an externally owned account.
    fn transaction_count(
        &self,
        account: Address,
    ) -> impl Future<Output = Result<u64, crate::Error>> + Send;
}

/// [`RegistryReader`] over Ethereum JSON-RPC.
pub struct RpcRegistryReader {
    rpc: Arc<EthRpcClient>,
    hub_address: Address,
    from_block: u64,
    added_topic: B256,
    removed_topic: B256,
}

impl RpcRegistryReader {
    pub fn new(rpc: Arc<EthRpcClient>, hub_address: Address, from_block: u64) -> Self {
        Self {
            rpc,
            hub_address,
            from_block,
            added_topic: keccak256(RELAY_ADDED_EVENT),
            removed_topic: keccak256(RELAY_REMOVED_EVENT),
        }
    }

    pub fn hub_address(&self) -> Address {
        self.hub_address
    }

    fn decode_log(&self, log: &LogEntry) -> Result<RegistryEvent, String> {
        let topic0 = log.topics.first().ok_or("log has no topics")?;
        let data = decode_hex(&log.data).map_err(|e| e.to_string())?;
        let kind = if *topic0 == self.added_topic {
            RegistryEventKind::Added(decode_relay_added(&log.topics, &data)?)
        } else if *topic0 == self.removed_topic {
            let relay = log.topics.get(1).ok_or("RelayRemoved: missing relay topic")?;
            RegistryEventKind::Removed {
                relay: Address::from_word(*relay),
            }
        } else {
            return Err(format!("unexpected topic {topic0}"));
        };
        Ok(RegistryEvent {
            block_number: parse_quantity(log.block_number.as_deref())?,
            log_index: parse_quantity(log.log_index.as_deref())?,
            kind,
        })
    }
}

impl RegistryReader for RpcRegistryReader {
    async fn relay_events(&self) -> Result<Vec<RegistryEvent>, crate::Error> {
        let topics = json!([[self.added_topic, self.removed_topic]]);
        let logs = self
            .rpc
            .get_logs(self.hub_address, self.from_block, topics)
            .await?;

        let total = logs.len();
        let events: Vec<RegistryEvent> = logs
            .iter()
            .filter(|log| !log.removed)
            .filter_map(|log| match self.decode_log(log) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable registry log");
                    None
                }
            })
            .collect();
        info!(
            hub = %self.hub_address,
            logs = total,
            events = events.len(),
            "Fetched registry events"
        );
        Ok(events)
    }

    async fn nonce(&self, from: Address) -> Result<U256, crate::Error> {
        let mut calldata = keccak256(GET_NONCE_SIGNATURE)[..4].to_vec();
        calldata.extend_from_slice(from.into_word().as_slice());
        let out = self.rpc.eth_call(self.hub_address, &calldata).await?;
        if out.len() < 32 {
            return Err(crate::Error::Registry(format!(
                "getNonce returned {} bytes",
                out.len()
            )));
        }
        let nonce = U256::from_be_slice(&out[..32]);
        debug!(from = %from, nonce = %nonce, "Fetched hub nonce");
        Ok(nonce)
    }

    async fn transaction_count(&self, account: Address) -> Result<u64, crate::Error> {
        self.rpc.transaction_count(account).await
    }
}

// --- ABI decoding ---

fn word(data: &[u8], index: usize) -> Result<&[u8], String> {
    let start = index * 32;
    data.get(start..start + 32)
        .ok_or_else(|| format!("data too short for word {index}"))
}

fn decode_relay_added(topics: &[B256], data: &[u8]) -> Result<RelayAdded, String> {
    if topics.len() < 3 {
        return Err(format!("RelayAdded: expected 3 topics, got {}", topics.len()));
    }
    let offset = usize::try_from(U256::from_be_slice(word(data, 3)?))
        .map_err(|_| "RelayAdded: url offset out of range".to_string())?;
    let len_word = data
        .get(offset..offset.saturating_add(32))
        .ok_or("RelayAdded: url length out of bounds")?;
    let len = usize::try_from(U256::from_be_slice(len_word))
        .map_err(|_| "RelayAdded: url length out of range".to_string())?;
    let body_start = offset + 32;
    let body = data
        .get(body_start..body_start.saturating_add(len))
        .ok_or("RelayAdded: url body out of bounds")?;
    let url = String::from_utf8(body.to_vec()).map_err(|e| format!("RelayAdded: url: {e}"))?;

    Ok(RelayAdded {
        relay: Address::from_word(topics[1]),
        owner: Address::from_word(topics[2]),
        transaction_fee: U256::from_be_slice(word(data, 0)?),
        stake: U256::from_be_slice(word(data, 1)?),
        unstake_delay: U256::from_be_slice(word(data, 2)?),
        url,
    })
}
