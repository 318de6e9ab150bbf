//! In-process fakes for the two network boundaries: a relay server
//! (`/getaddr`, `/relay`) and an Ethereum JSON-RPC node.

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use gasless_types::{
    address_of, decode_hex, sign_digest, signing_key_from_bytes, Address, DigestConvention, B256,
    U256,
};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// web3.js documentation key; address 0x2c7536e3605d9c16a7a3d7b1898e529396a65c23.
pub const SENDER_SECRET: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

pub const RELAY_ADDED_TOPIC: &str =
    "0x85b3ae3aae9d3fcb31142fbd8c3b4722d57825b8edd6e1366e69204afa5a0dfa";
pub const RELAY_REMOVED_TOPIC: &str =
    "0x5490afc1d818789c8b3d5d63bce3d2a3327d0bba4efb5a7751f783dc977d7d11";

/// A url nothing listens on.
pub const DEAD_URL: &str = "http://127.0.0.1:1";

pub fn sender_address() -> Address {
    let key = signing_key_from_bytes(&decode_hex(SENDER_SECRET).unwrap()).unwrap();
    address_of(key.verifying_key())
}

pub fn hub_address() -> Address {
    Address::repeat_byte(0x33)
}

/// Bind an ephemeral local port and serve `router` in the background.
pub async fn serve(router: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    Ok(format!("http://{addr}"))
}

// ── Fake relay ──────────────────────────────────────────────────────

pub struct FakeRelay {
    pub ping: Value,
    pub ping_delay: Duration,
    pub relay_status: StatusCode,
    pub relay_response: Value,
    pub pings: AtomicUsize,
    pub submissions: Mutex<Vec<Value>>,
}

impl FakeRelay {
    pub fn ready(server_address: Address) -> Self {
        Self {
            ping: json!({
                "RelayServerAddress": server_address,
                "MinGasPrice": 1_000_000_000u64,
                "Ready": true,
            }),
            ping_delay: Duration::ZERO,
            relay_status: StatusCode::OK,
            relay_response: json!({ "signedTx": "0xf86b8085" }),
            pings: AtomicUsize::new(0),
            submissions: Mutex::new(Vec::new()),
        }
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }
}

async fn getaddr(State(relay): State<Arc<FakeRelay>>) -> Json<Value> {
    relay.pings.fetch_add(1, Ordering::SeqCst);
    if !relay.ping_delay.is_zero() {
        tokio::time::sleep(relay.ping_delay).await;
    }
    Json(relay.ping.clone())
}

async fn relay_tx(
    State(relay): State<Arc<FakeRelay>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    relay.submissions.lock().unwrap().push(body);
    (relay.relay_status, Json(relay.relay_response.clone()))
}

pub async fn spawn_fake_relay(relay: FakeRelay) -> Result<(String, Arc<FakeRelay>)> {
    let relay = Arc::new(relay);
    let router = Router::new()
        .route("/getaddr", get(getaddr))
        .route("/relay", post(relay_tx))
        .with_state(relay.clone());
    Ok((serve(router).await?, relay))
}

// ── Fake JSON-RPC node ──────────────────────────────────────────────

pub struct FakeNode {
    pub logs: Vec<Value>,
    pub nonce: U256,
    pub tx_count: u64,
    pub gas_price: u64,
    /// Account unlocked for `personal_sign` / `eth_sign`.
    pub signer_secret: Vec<u8>,
    pub personal_sign_supported: bool,
    /// Return `v` as 0/1 instead of 27/28.
    pub raw_parity: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeNode {
    pub fn new(logs: Vec<Value>) -> Self {
        Self {
            logs,
            nonce: U256::from(7u64),
            tx_count: 40,
            gas_price: 10_000_000_000,
            signer_secret: decode_hex(SENDER_SECRET).unwrap(),
            personal_sign_supported: true,
            raw_parity: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn sign(&self, digest: &Value) -> Value {
        let digest = B256::from_str(digest.as_str().unwrap_or_default()).unwrap_or_default();
        let key = signing_key_from_bytes(&self.signer_secret).unwrap();
        let mut sig = sign_digest(&key, &digest, DigestConvention::Personal).unwrap();
        if self.raw_parity {
            sig.v -= 27;
        }
        json!(sig.to_hex())
    }

    fn answer(&self, method: &str, params: &Value) -> std::result::Result<Value, (i64, String)> {
        match method {
            "eth_getLogs" => Ok(Value::Array(self.logs.clone())),
            "eth_call" => {
                let data = params[0]["data"].as_str().unwrap_or_default();
                if data.starts_with("0x2d0335ab") {
                    Ok(json!(format!("0x{}", hex::encode(self.nonce.to_be_bytes::<32>()))))
                } else {
                    Err((-32000, "execution reverted".into()))
                }
            }
            "eth_getTransactionCount" => Ok(json!(format!("0x{:x}", self.tx_count))),
            "eth_gasPrice" => Ok(json!(format!("0x{:x}", self.gas_price))),
            "personal_sign" if self.personal_sign_supported => Ok(self.sign(&params[0])),
            "eth_sign" => Ok(self.sign(&params[1])),
            other => Err((-32601, format!("the method {other} does not exist"))),
        }
    }
}

async fn rpc(State(node): State<Arc<FakeNode>>, Json(req): Json<Value>) -> Json<Value> {
    let method = req["method"].as_str().unwrap_or_default().to_string();
    node.calls.lock().unwrap().push(method.clone());
    let id = req["id"].clone();
    Json(match node.answer(&method, &req["params"]) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => {
            json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
        }
    })
}

pub async fn spawn_fake_node(node: FakeNode) -> Result<(String, Arc<FakeNode>)> {
    let node = Arc::new(node);
    let router = Router::new().route("/", post(rpc)).with_state(node.clone());
    Ok((serve(router).await?, node))
}

// ── Registry log encoding ───────────────────────────────────────────

fn topic(address: Address) -> String {
    format!("0x{}", hex::encode(address.into_word()))
}

fn word(value: U256) -> String {
    hex::encode(value.to_be_bytes::<32>())
}

pub fn relay_added_log(
    block: u64,
    index: u64,
    relay: Address,
    fee: u64,
    stake: U256,
    delay: u64,
    url: &str,
) -> Value {
    let mut url_bytes = url.as_bytes().to_vec();
    url_bytes.resize(url.len().div_ceil(32).max(1) * 32, 0);
    let data = format!(
        "0x{}{}{}{}{}{}",
        word(U256::from(fee)),
        word(stake),
        word(U256::from(delay)),
        word(U256::from(0x80u64)),
        word(U256::from(url.len())),
        hex::encode(url_bytes),
    );
    json!({
        "address": hub_address(),
        "topics": [RELAY_ADDED_TOPIC, topic(relay), topic(Address::repeat_byte(0xee))],
        "data": data,
        "blockNumber": format!("0x{block:x}"),
        "logIndex": format!("0x{index:x}"),
        "removed": false,
    })
}

pub fn relay_removed_log(block: u64, index: u64, relay: Address) -> Value {
    json!({
        "address": hub_address(),
        "topics": [RELAY_REMOVED_TOPIC, topic(relay)],
        "data": format!("0x{}", word(U256::from(1_700_000_000u64))),
        "blockNumber": format!("0x{block:x}"),
        "logIndex": format!("0x{index:x}"),
        "removed": false,
    })
}

pub fn eth(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000_000u64)
}
