//! Relay client configuration.

use crate::selector::SelectionConfig;
use gasless_types::{parse_uint256, Address, U256};
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the relay client.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    #[serde(default = "defaults::relay_hub_address")]
    pub relay_hub_address: String,

    /// First block scanned for registry events.
    #[serde(default)]
    pub from_block: u64,

    /// Minimum relay stake in wei (decimal). `"0"` disables the filter.
    #[serde(default = "defaults::min_stake")]
    pub min_stake: String,

    /// Minimum unstake delay in seconds. `0` disables the filter.
    #[serde(default)]
    pub min_delay_secs: u64,

    /// How long a failed relay stays at the back of the ranking.
    #[serde(default = "defaults::failure_window_secs")]
    pub failure_window_secs: u64,

    /// Per-probe timeout for `GET /getaddr`.
    #[serde(default = "defaults::ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Timeout for relay submission and JSON-RPC calls.
    #[serde(default = "defaults::http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Markup over the node's gas price offered to relays.
    #[serde(default = "defaults::gas_price_percent")]
    pub gas_price_percent: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            relay_hub_address: defaults::relay_hub_address(),
            from_block: 0,
            min_stake: defaults::min_stake(),
            min_delay_secs: 0,
            failure_window_secs: defaults::failure_window_secs(),
            ping_timeout_ms: defaults::ping_timeout_ms(),
            http_timeout_ms: defaults::http_timeout_ms(),
            gas_price_percent: defaults::gas_price_percent(),
        }
    }
}

impl Config {
    /// Load from an optional `gasless.*` file overlaid with `GASLESS_*`
    /// environment variables. Unset keys take their defaults; a value that
    /// is present but malformed is an error.
    pub fn load() -> Result<Self, crate::Error> {
        Self::from_builder(
            ::config::Config::builder()
                .add_source(::config::File::with_name("gasless").required(false))
                .add_source(::config::Environment::with_prefix("GASLESS")),
        )
    }

    pub fn from_builder(
        builder: ::config::ConfigBuilder<::config::builder::DefaultState>,
    ) -> Result<Self, crate::Error> {
        builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(e.to_string()))
    }

    pub fn hub_address(&self) -> Result<Address, crate::Error> {
        Address::from_str(&self.relay_hub_address).map_err(|e| {
            crate::Error::Config(format!(
                "Invalid relay hub address '{}': {e}",
                self.relay_hub_address
            ))
        })
    }

    pub fn selection_config(&self) -> Result<SelectionConfig, crate::Error> {
        let min_stake = parse_uint256(&self.min_stake)
            .map_err(|e| crate::Error::Config(format!("Invalid min_stake: {e}")))?;
        Ok(SelectionConfig {
            min_stake,
            min_delay: self.min_delay_secs,
            failure_window: Duration::from_secs(self.failure_window_secs),
        })
    }

    /// Highest gas price offered to relays: `network_price` marked up by
    /// `gas_price_percent`, saturating at `U256::MAX`.
    pub fn max_gas_price(&self, network_price: U256) -> U256 {
        let factor = U256::from(100u64).saturating_add(U256::from(self.gas_price_percent));
        network_price.saturating_mul(factor) / U256::from(100u64)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

mod defaults {
    pub fn rpc_url() -> String {
        // Priority: GASLESS_RPC_URL > local node
        match std::env::var("GASLESS_RPC_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => "http://localhost:8545".into(),
        }
    }

    pub fn fallback_rpc_url() -> String {
        match std::env::var("GASLESS_FALLBACK_RPC_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => rpc_url(),
        }
    }

    pub fn relay_hub_address() -> String {
        "0x0000000000000000000000000000000000000000".into()
    }

    pub fn min_stake() -> String {
        "0".into()
    }

    pub fn failure_window_secs() -> u64 {
        60
    }

    pub fn ping_timeout_ms() -> u64 {
        3_000
    }

    pub fn http_timeout_ms() -> u64 {
        10_000
    }

    pub fn gas_price_percent() -> u64 {
        20
    }
}
