//! Single relay health check: `GET <url>/getaddr`.

use gasless_types::{parse_uint256, Address, U256};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::http::HttpTransport;
use crate::metrics::{Metrics, METRICS};
use crate::registry::RelayRecord;

/// What a relay reports about itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PingResponse {
    /// The relay's signing address; may differ from its registry entry.
    #[serde(rename = "RelayServerAddress", default)]
    pub relay_server_address: Option<Address>,
    #[serde(rename = "MinGasPrice", deserialize_with = "lenient_uint")]
    pub min_gas_price: U256,
    #[serde(rename = "Ready")]
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Eligible(PingResponse),
    Ineligible(String),
}

impl ProbeOutcome {
    pub fn is_eligible(&self) -> bool {
        matches!(self, ProbeOutcome::Eligible(_))
    }
}

pub(crate) fn relay_endpoint(url: &str, path: &str) -> String {
    format!("{}/{path}", url.trim_end_matches('/'))
}

/// Probe one relay. Never fails: transport errors, timeouts and
/// malformed payloads all classify as [`ProbeOutcome::Ineligible`].
pub async fn probe_relay<T: HttpTransport>(
    transport: &T,
    relay: &RelayRecord,
    timeout: Duration,
    max_gas_price: U256,
) -> ProbeOutcome {
    Metrics::incr(&METRICS.probes_total);
    let url = relay_endpoint(&relay.url, "getaddr");
    let outcome = match tokio::time::timeout(timeout, transport.get_json(&url)).await {
        Err(_) => ProbeOutcome::Ineligible(format!("timed out after {}ms", timeout.as_millis())),
        Ok(Err(e)) => ProbeOutcome::Ineligible(e.to_string()),
        Ok(Ok(body)) => classify(body, max_gas_price),
    };
    match &outcome {
        ProbeOutcome::Eligible(info) => {
            debug!(url = %relay.url, min_gas_price = %info.min_gas_price, "Relay eligible");
        }
        ProbeOutcome::Ineligible(reason) => {
            Metrics::incr(&METRICS.probes_ineligible);
            debug!(url = %relay.url, reason = %reason, "Relay ineligible");
        }
    }
    outcome
}

fn classify(body: Value, max_gas_price: U256) -> ProbeOutcome {
    let info: PingResponse = match serde_json::from_value(body) {
        Ok(info) => info,
        Err(e) => return ProbeOutcome::Ineligible(format!("malformed ping response: {e}")),
    };
    if !info.ready {
        return ProbeOutcome::Ineligible("not ready".into());
    }
    if info.min_gas_price > max_gas_price {
        return ProbeOutcome::Ineligible(format!(
            "min gas price {} above {max_gas_price}",
            info.min_gas_price
        ));
    }
    ProbeOutcome::Eligible(info)
}

/// Relays serialize big integers as JSON numbers (possibly beyond `u64`)
/// or decimal strings.
fn lenient_uint<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    use serde::de::Error;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(U256::from(v));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => {
                    U256::from_str_radix(&format!("{f:.0}"), 10).map_err(D::Error::custom)
                }
                _ => Err(D::Error::custom(format!("invalid gas price {n}"))),
            }
        }
        Value::String(s) => parse_uint256(&s).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("invalid gas price {other}"))),
    }
}
