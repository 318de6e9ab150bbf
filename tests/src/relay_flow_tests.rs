//! End-to-end relay flow over real HTTP: registry logs from a fake node,
//! pings and submissions against fake relays.

use anyhow::Result;
use axum::http::StatusCode;
use gasless_client::{
    EthRpcClient, FailureRecord, RelayClient, RelayRequest, RelaySelector, ReqwestTransport,
    RpcRegistryReader, SelectionConfig, TransactionSigner,
};
use gasless_types::{recover_signer, transaction_digest, Address, TransactionDigestInput, U256};
use std::sync::Arc;
use std::time::Duration;

use crate::utils::*;

const DAY: u64 = 24 * 3600;

type Client = RelayClient<RpcRegistryReader, ReqwestTransport>;

fn client(node_url: &str, failures: Arc<FailureRecord>) -> Result<(Client, Arc<EthRpcClient>)> {
    let rpc = Arc::new(EthRpcClient::new(node_url, node_url, Duration::from_secs(5))?);
    let registry = RpcRegistryReader::new(rpc.clone(), hub_address(), 0);
    let config = SelectionConfig {
        min_stake: eth(1),
        min_delay: 7 * DAY,
        ..SelectionConfig::default()
    };
    let client = RelayClient::new(
        registry,
        ReqwestTransport::new(Duration::from_secs(5))?,
        RelaySelector::new(config),
        failures,
        hub_address(),
        Duration::from_millis(500),
    );
    Ok((client, rpc))
}

fn request() -> RelayRequest {
    RelayRequest {
        from: sender_address(),
        to: Address::repeat_byte(0x22),
        encoded_function: vec![0xd0, 0x9d, 0xe0, 0x8a],
        gas_price: U256::from(12_000_000_000u64),
        gas_limit: U256::from(250_000u64),
    }
}

#[tokio::test]
async fn test_relay_transaction_end_to_end() -> Result<()> {
    let relay_signer = Address::repeat_byte(0xab);
    let (relay_url, relay) = spawn_fake_relay(FakeRelay::ready(relay_signer)).await?;
    let (removed_url, removed) = spawn_fake_relay(FakeRelay::ready(relay_signer)).await?;

    let logs = vec![
        // Cheapest, but its server is down.
        relay_added_log(10, 0, Address::repeat_byte(0xa1), 5, eth(2), 14 * DAY, DEAD_URL),
        relay_added_log(10, 1, Address::repeat_byte(0xa2), 8, eth(2), 14 * DAY, &relay_url),
        // Cheaper still, but deregistered.
        relay_added_log(11, 0, Address::repeat_byte(0xa3), 1, eth(2), 14 * DAY, &removed_url),
        relay_removed_log(12, 0, Address::repeat_byte(0xa3)),
        // Understaked.
        relay_added_log(12, 1, Address::repeat_byte(0xa4), 2, U256::from(1u64), 14 * DAY, &relay_url),
    ];
    let (node_url, node) = spawn_fake_node(FakeNode::new(logs)).await?;
    let (client, _) = client(&node_url, Arc::new(FailureRecord::new()))?;

    let signer = TransactionSigner::local_hex(SENDER_SECRET)?;
    let receipt = client.relay_transaction(&request(), &signer).await?;

    assert_eq!(receipt.relay.relay.address, Address::repeat_byte(0xa2));
    assert_eq!(receipt.response["signedTx"], "0xf86b8085");
    assert_eq!(removed.ping_count(), 0);

    let req = request();
    let expected = transaction_digest(&TransactionDigestInput {
        from: req.from,
        to: req.to,
        encoded_call_data: req.encoded_function.clone(),
        fee: U256::from(8u64),
        gas_price: req.gas_price,
        gas_limit: req.gas_limit,
        nonce: U256::from(7u64),
        hub_address: hub_address(),
        relay_address: relay_signer,
    });
    assert_eq!(receipt.digest, expected);

    let submissions = relay.submissions();
    assert_eq!(submissions.len(), 1);
    let body = &submissions[0];
    let signature: Vec<u8> = serde_json::from_value(body["signature"].clone())?;
    assert_eq!(signature.len(), 65);
    let signature = gasless_types::Signature::from_bytes(&signature)?;
    assert_eq!(recover_signer(&expected, &signature)?, sender_address());
    assert_eq!(body["encodedFunction"], "0xd09de08a");
    assert_eq!(body["RelayMaxNonce"], 43);
    assert_eq!(body["relayFee"], 8);

    let calls = node.calls();
    assert!(calls.contains(&"eth_getLogs".to_string()));
    assert!(calls.contains(&"eth_call".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_rejecting_relay_is_down_ranked() -> Result<()> {
    let mut rejecting = FakeRelay::ready(Address::repeat_byte(0xab));
    rejecting.relay_status = StatusCode::INTERNAL_SERVER_ERROR;
    let (bad_url, bad) = spawn_fake_relay(rejecting).await?;
    let (good_url, good) = spawn_fake_relay(FakeRelay::ready(Address::repeat_byte(0xac))).await?;

    let logs = vec![
        relay_added_log(1, 0, Address::repeat_byte(0xb1), 1, eth(2), 14 * DAY, &bad_url),
        relay_added_log(1, 1, Address::repeat_byte(0xb2), 2, eth(2), 14 * DAY, &good_url),
    ];
    let (node_url, _node) = spawn_fake_node(FakeNode::new(logs)).await?;
    let failures = Arc::new(FailureRecord::new());
    let (client, _) = client(&node_url, failures.clone())?;
    let signer = TransactionSigner::local_hex(SENDER_SECRET)?;

    let receipt = client.relay_transaction(&request(), &signer).await?;
    assert_eq!(receipt.relay.relay.url, good_url);
    assert_eq!(bad.submissions().len(), 1);
    assert_eq!(good.submissions().len(), 1);
    assert!(failures.last_failure(&bad_url).is_some());

    // Next time the failed relay is tried last.
    let ranked = client.ranked_relays().await?;
    assert_eq!(ranked[0].relay.url, good_url);
    assert!(ranked[1].recently_failed);
    Ok(())
}

#[tokio::test]
async fn test_rpc_signer_falls_back_to_eth_sign() -> Result<()> {
    let (relay_url, relay) = spawn_fake_relay(FakeRelay::ready(Address::repeat_byte(0xab))).await?;
    let logs = vec![relay_added_log(1, 0, Address::repeat_byte(0xc1), 3, eth(2), 14 * DAY, &relay_url)];
    let mut node = FakeNode::new(logs);
    node.personal_sign_supported = false;
    node.raw_parity = true;
    let (node_url, node) = spawn_fake_node(node).await?;
    let (client, rpc) = client(&node_url, Arc::new(FailureRecord::new()))?;

    let signer = TransactionSigner::rpc(rpc, sender_address());
    let receipt = client.relay_transaction(&request(), &signer).await?;

    assert!(receipt.signature.v == 27 || receipt.signature.v == 28);
    assert_eq!(recover_signer(&receipt.digest, &receipt.signature)?, sender_address());
    let calls = node.calls();
    let personal = calls.iter().position(|m| m == "personal_sign").unwrap();
    let eth_sign = calls.iter().position(|m| m == "eth_sign").unwrap();
    assert!(personal < eth_sign);
    assert_eq!(relay.submissions().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_no_ready_relay() -> Result<()> {
    let mut busy = FakeRelay::ready(Address::repeat_byte(0xab));
    busy.ping = serde_json::json!({ "MinGasPrice": 1, "Ready": false });
    let (busy_url, _busy) = spawn_fake_relay(busy).await?;
    let mut slow = FakeRelay::ready(Address::repeat_byte(0xac));
    slow.ping_delay = Duration::from_secs(5);
    let (slow_url, slow) = spawn_fake_relay(slow).await?;

    let logs = vec![
        relay_added_log(1, 0, Address::repeat_byte(0xd1), 1, eth(2), 14 * DAY, &busy_url),
        relay_added_log(1, 1, Address::repeat_byte(0xd2), 2, eth(2), 14 * DAY, &slow_url),
        relay_added_log(1, 2, Address::repeat_byte(0xd3), 3, eth(2), 14 * DAY, DEAD_URL),
    ];
    let (node_url, _node) = spawn_fake_node(FakeNode::new(logs)).await?;
    let (client, _) = client(&node_url, Arc::new(FailureRecord::new()))?;

    let started = std::time::Instant::now();
    let err = client.find_relay(U256::from(12_000_000_000u64)).await.unwrap_err();
    assert!(matches!(err, gasless_client::Error::NoRelayFound { probed: 3 }));
    assert_eq!(slow.ping_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(3));
    Ok(())
}

#[tokio::test]
async fn test_relay_asking_too_much_gas_is_skipped() -> Result<()> {
    let mut pricey = FakeRelay::ready(Address::repeat_byte(0xab));
    pricey.ping = serde_json::json!({ "MinGasPrice": 100_000_000_000u64, "Ready": true });
    let (pricey_url, _) = spawn_fake_relay(pricey).await?;
    let (fair_url, _) = spawn_fake_relay(FakeRelay::ready(Address::repeat_byte(0xac))).await?;

    let logs = vec![
        relay_added_log(1, 0, Address::repeat_byte(0xe1), 1, eth(2), 14 * DAY, &pricey_url),
        relay_added_log(1, 1, Address::repeat_byte(0xe2), 9, eth(2), 14 * DAY, &fair_url),
    ];
    let (node_url, _node) = spawn_fake_node(FakeNode::new(logs)).await?;
    let (client, _) = client(&node_url, Arc::new(FailureRecord::new()))?;

    let found = client.find_relay(U256::from(12_000_000_000u64)).await?;
    assert_eq!(found.relay.url, fair_url);
    assert_eq!(found.info.relay_server_address, Some(Address::repeat_byte(0xac)));
    Ok(())
}
