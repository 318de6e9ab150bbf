//! Ethereum JSON-RPC client with primary → fallback failover and circuit breaker.

use gasless_types::{decode_hex, parse_uint256, strip_hex_prefix, Address, B256, U256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::metrics::{Metrics, METRICS};

/// Consecutive failures before the circuit breaker opens.
const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
/// How long (ms) before a tripped breaker retries the primary.
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// A log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub topics: Vec<B256>,
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    #[serde(default)]
    pub log_index: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

/// JSON-RPC client with primary → fallback failover.
pub struct EthRpcClient {
    http: reqwest::Client,
    primary_url: String,
    fallback_url: String,
    circuit: Mutex<CircuitState>,
    total_failovers: AtomicU64,
    next_id: AtomicU64,
}

impl EthRpcClient {
    pub fn new(primary_url: &str, fallback_url: &str, timeout: Duration) -> Result<Self, crate::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))?;
        info!(
            primary = primary_url,
            fallback = fallback_url,
            "RPC client initialized with failover"
        );
        Ok(Self {
            http,
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            total_failovers: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        })
    }

    /// The primary RPC URL.
    pub fn primary_url(&self) -> &str {
        &self.primary_url
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    // --- Calls ---

    /// Issue a JSON-RPC call. Transport failures fail over; a node-level
    /// `error` object is a definitive answer and is returned as-is.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, crate::Error> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let on_primary = !self.is_circuit_open();
        let active = if on_primary {
            &self.primary_url
        } else {
            &self.fallback_url
        };

        let envelope = match self.post(active, &body).await {
            Ok(v) => {
                if on_primary {
                    self.record_success();
                }
                v
            }
            // Circuit open: the fallback was the only candidate.
            Err(e) if !on_primary => {
                Metrics::incr(&METRICS.rpc_errors);
                return Err(crate::Error::Rpc(format!(
                    "{method} failed on fallback RPC (circuit open): {e}"
                )));
            }
            Err(e) => {
                // Counted once, by record_failure.
                self.record_failure();
                warn!(method, error = %e, "RPC call failed, trying fallback");
                self.post(&self.fallback_url, &body).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "{method} failed on both RPCs: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };
        into_result(method, envelope)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, String> {
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }
        resp.json::<Value>().await.map_err(|e| e.to_string())
    }

    pub async fn get_logs(
        &self,
        address: Address,
        from_block: u64,
        topics: Value,
    ) -> Result<Vec<LogEntry>, crate::Error> {
        let filter = json!({
            "address": address,
            "fromBlock": format!("0x{from_block:x}"),
            "toBlock": "latest",
            "topics": topics,
        });
        let result = self.call("eth_getLogs", json!([filter])).await?;
        serde_json::from_value(result)
            .map_err(|e| crate::Error::Rpc(format!("eth_getLogs: malformed result: {e}")))
    }

    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, crate::Error> {
        let tx = json!({ "to": to, "data": format!("0x{}", hex::encode(data)) });
        let result = self.call("eth_call", json!([tx, "latest"])).await?;
        let encoded = result
            .as_str()
            .ok_or_else(|| crate::Error::Rpc("eth_call: result is not a string".into()))?;
        Ok(decode_hex(encoded)?)
    }

    pub async fn gas_price(&self) -> Result<U256, crate::Error> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| crate::Error::Rpc("eth_gasPrice: result is not a string".into()))?;
        Ok(parse_uint256(quantity)?)
    }

    pub async fn transaction_count(&self, account: Address) -> Result<u64, crate::Error> {
        let result = self
            .call("eth_getTransactionCount", json!([account, "pending"]))
            .await?;
        parse_quantity(result.as_str())
            .map_err(|e| crate::Error::Rpc(format!("eth_getTransactionCount: {e}")))
    }

    /// `personal_sign(digest, account)`: the node applies the message prefix.
    pub async fn personal_sign(&self, digest: &B256, account: Address) -> Result<String, crate::Error> {
        let result = self
            .call("personal_sign", json!([digest, account]))
            .await?;
        signature_string("personal_sign", result)
    }

    /// `eth_sign(account, digest)`: legacy method, also prefixed.
    pub async fn eth_sign(&self, account: Address, digest: &B256) -> Result<String, crate::Error> {
        let result = self.call("eth_sign", json!([account, digest])).await?;
        signature_string("eth_sign", result)
    }

    // --- Failover / circuit breaker ---

    fn record_success(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary RPC recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        Metrics::incr(&METRICS.rpc_errors);
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = crate::failures::now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            self.total_failovers.fetch_add(1, Ordering::Relaxed);
            Metrics::incr(&METRICS.rpc_failovers);
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened, routing to fallback"
            );
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        // Half-open: retry primary after window
        if crate::failures::now_ms().saturating_sub(circuit.last_failure_ms)
            > CIRCUIT_BREAKER_WINDOW_MS
        {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    pub fn failover_count(&self) -> u64 {
        self.total_failovers.load(Ordering::Relaxed)
    }

    /// Currently active RPC URL.
    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

/// Unwrap a JSON-RPC response envelope.
fn into_result(method: &str, mut envelope: Value) -> Result<Value, crate::Error> {
    if let Some(err) = envelope.get("error").filter(|e| !e.is_null()) {
        let code = err.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        debug!(method, code, message, "RPC returned error");
        return Err(crate::Error::Rpc(format!("{method}: {message} (code {code})")));
    }
    match envelope.get_mut("result") {
        Some(result) => Ok(result.take()),
        None => Err(crate::Error::Rpc(format!("{method}: response has no result"))),
    }
}

fn signature_string(method: &str, result: Value) -> Result<String, crate::Error> {
    result
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| crate::Error::Rpc(format!("{method}: result is not a string")))
}

/// Parse a `0x`-prefixed hex quantity.
pub(crate) fn parse_quantity(value: Option<&str>) -> Result<u64, String> {
    let value = value.ok_or("missing quantity")?;
    u64::from_str_radix(strip_hex_prefix(value), 16)
        .map_err(|e| format!("invalid quantity '{value}': {e}"))
}
