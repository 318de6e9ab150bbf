//! Gasless relay discovery: ranks the hub's relays and pings for a live one.

use gasless_client::metrics::METRICS;
use gasless_client::{
    Config, EthRpcClient, FailureRecord, RelayClient, ReqwestTransport, RpcRegistryReader,
};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting gasless relay client");

    let config = Config::load()?;

    info!(hub = %config.relay_hub_address, rpc = %config.rpc_url, "Configuration loaded");

    let rpc = Arc::new(EthRpcClient::new(
        &config.rpc_url,
        &config.fallback_rpc_url,
        config.http_timeout(),
    )?);
    let registry = RpcRegistryReader::new(rpc.clone(), config.hub_address()?, config.from_block);
    let transport = ReqwestTransport::new(config.http_timeout())?;
    let client = RelayClient::from_config(&config, registry, transport, Arc::new(FailureRecord::new()))?;

    let network_price = rpc.gas_price().await?;
    let max_gas_price = config.max_gas_price(network_price);
    info!(network = %network_price, max = %max_gas_price, "Gas price");

    let ranked = client.ranked_relays().await?;
    for (rank, scored) in ranked.iter().enumerate() {
        info!(
            rank,
            url = %scored.relay.url,
            fee = scored.relay.transaction_fee,
            stake = %scored.relay.stake,
            "Candidate relay"
        );
    }

    let found = client.find_relay(max_gas_price).await?;
    info!(
        url = %found.relay.url,
        address = %found.relay.address,
        min_gas_price = %found.info.min_gas_price,
        "Relay available"
    );

    debug!(metrics = %METRICS.render(), "Metrics");
    Ok(())
}
