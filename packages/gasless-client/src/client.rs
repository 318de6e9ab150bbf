//! Relay a meta-transaction end to end: discover, rank, ping, sign, submit.

use gasless_types::{transaction_digest, Address, Signature, TransactionDigestInput, B256, U256};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::failures::FailureRecord;
use crate::http::HttpTransport;
use crate::metrics::{Metrics, METRICS};
use crate::pinger::{ActiveRelayPinger, PingedRelay};
use crate::probe::relay_endpoint;
use crate::registry::RegistryReader;
use crate::selector::{RelaySelector, ScoredRelay};
use crate::signer::TransactionSigner;

/// Relays may queue this many transactions ahead of their current nonce.
const RELAY_NONCE_SLACK: u64 = 3;

/// A call the sender wants relayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest {
    pub from: Address,
    pub to: Address,
    pub encoded_function: Vec<u8>,
    /// Highest gas price the sender pays; relays asking more are skipped.
    pub gas_price: U256,
    pub gas_limit: U256,
}

#[derive(Debug, Clone)]
pub struct RelayReceipt {
    pub relay: PingedRelay,
    pub digest: B256,
    pub signature: Signature,
    /// The relay's JSON answer, typically the signed transaction it broadcast.
    pub response: Value,
}

pub struct RelayClient<R, T> {
    registry: R,
    transport: T,
    selector: RelaySelector,
    failures: Arc<FailureRecord>,
    hub_address: Address,
    ping_timeout: Duration,
}

impl<R: RegistryReader, T: HttpTransport> RelayClient<R, T> {
    pub fn new(
        registry: R,
        transport: T,
        selector: RelaySelector,
        failures: Arc<FailureRecord>,
        hub_address: Address,
        ping_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            transport,
            selector,
            failures,
            hub_address,
            ping_timeout,
        }
    }

    pub fn from_config(
        config: &Config,
        registry: R,
        transport: T,
        failures: Arc<FailureRecord>,
    ) -> Result<Self, crate::Error> {
        Ok(Self::new(
            registry,
            transport,
            RelaySelector::new(config.selection_config()?),
            failures,
            config.hub_address()?,
            config.ping_timeout(),
        ))
    }

    pub fn failures(&self) -> &Arc<FailureRecord> {
        &self.failures
    }

    /// Current registry state, filtered and ranked.
    pub async fn ranked_relays(&self) -> Result<Vec<ScoredRelay>, crate::Error> {
        let events = self.registry.relay_events().await?;
        Ok(self.selector.select(events, &self.failures))
    }

    /// First relay that answers its ping as ready at `max_gas_price`.
    pub async fn find_relay(&self, max_gas_price: U256) -> Result<PingedRelay, crate::Error> {
        let ranked = self.ranked_relays().await?;
        ActiveRelayPinger::new(ranked, &self.transport, self.ping_timeout, max_gas_price)
            .next_relay()
            .await
    }

    /// Sign `request` for successive relays until one accepts it.
    ///
    /// A relay that rejects the request is recorded in the failure record
    /// and the next eligible relay is tried. A failed lookup of the relay's
    /// own transaction count skips that relay without recording a failure.
    /// Signing errors abort at once.
    pub async fn relay_transaction(
        &self,
        request: &RelayRequest,
        signer: &TransactionSigner,
    ) -> Result<RelayReceipt, crate::Error> {
        if signer.address() != request.from {
            return Err(crate::Error::Signer(format!(
                "signer {} cannot sign for {}",
                signer.address(),
                request.from
            )));
        }

        let nonce = self.registry.nonce(request.from).await?;
        let ranked = self.ranked_relays().await?;
        let mut pinger =
            ActiveRelayPinger::new(ranked, &self.transport, self.ping_timeout, request.gas_price);

        loop {
            let pinged = pinger.next_relay().await?;
            let relay_address = pinged
                .info
                .relay_server_address
                .unwrap_or(pinged.relay.address);
            let relay_max_nonce = match self.registry.transaction_count(relay_address).await {
                Ok(count) => count.saturating_add(RELAY_NONCE_SLACK),
                Err(e) => {
                    warn!(
                        url = %pinged.relay.url,
                        relay = %relay_address,
                        error = %e,
                        "Relay nonce lookup failed, trying next"
                    );
                    continue;
                }
            };
            match self
                .submit(request, signer, nonce, &pinged, relay_address, relay_max_nonce)
                .await
            {
                Ok(receipt) => return Ok(receipt),
                Err(e @ (crate::Error::Http(_) | crate::Error::Relay(_))) => {
                    Metrics::incr(&METRICS.submissions_rejected);
                    warn!(url = %pinged.relay.url, error = %e, "Relay rejected request, trying next");
                    self.failures.record_failure(&pinged.relay.url);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn submit(
        &self,
        request: &RelayRequest,
        signer: &TransactionSigner,
        nonce: U256,
        pinged: &PingedRelay,
        relay_address: Address,
        relay_max_nonce: u64,
    ) -> Result<RelayReceipt, crate::Error> {
        let fee = U256::from(pinged.relay.transaction_fee);
        let digest = transaction_digest(&TransactionDigestInput {
            from: request.from,
            to: request.to,
            encoded_call_data: request.encoded_function.clone(),
            fee,
            gas_price: request.gas_price,
            gas_limit: request.gas_limit,
            nonce,
            hub_address: self.hub_address,
            relay_address,
        });
        let signature = signer.sign(&digest).await?;

        let body = json!({
            "encodedFunction": format!("0x{}", hex::encode(&request.encoded_function)),
            "signature": signature.to_bytes().to_vec(),
            "from": request.from,
            "to": request.to,
            "gasPrice": request.gas_price.to_string(),
            "gasLimit": request.gas_limit.to_string(),
            "relayFee": pinged.relay.transaction_fee,
            "RecipientNonce": nonce.to_string(),
            "RelayMaxNonce": relay_max_nonce,
            "RelayHubAddress": self.hub_address,
        });

        Metrics::incr(&METRICS.submissions_total);
        let url = relay_endpoint(&pinged.relay.url, "relay");
        let response = self.transport.post_json(&url, &body).await?;
        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            return Err(crate::Error::Relay(match error.as_str() {
                Some(msg) => msg.to_string(),
                None => error.to_string(),
            }));
        }

        info!(
            url = %pinged.relay.url,
            relay = %relay_address,
            from = %request.from,
            nonce = %nonce,
            "Relay accepted request"
        );
        Ok(RelayReceipt {
            relay: pinged.clone(),
            digest,
            signature,
            response,
        })
    }
}
