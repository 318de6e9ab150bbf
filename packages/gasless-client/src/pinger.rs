//! Concurrent relay probing in fixed-size waves.

use futures::future::join_all;
use gasless_types::U256;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::http::HttpTransport;
use crate::metrics::{Metrics, METRICS};
use crate::probe::{probe_relay, PingResponse, ProbeOutcome};
use crate::registry::RelayRecord;
use crate::selector::ScoredRelay;

/// Relays probed concurrently per wave.
pub const PING_BATCH_SIZE: usize = 3;

/// A relay that answered its probe as ready and affordable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingedRelay {
    pub relay: RelayRecord,
    pub info: PingResponse,
}

/// Walks a ranked relay list, probing [`PING_BATCH_SIZE`] relays at a time.
///
/// Each wave waits for every probe (or its timeout) before choosing, so the
/// highest-ranked eligible relay of the wave wins even if a lower-ranked one
/// answered first. Eligible runners-up are kept for later calls.
pub struct ActiveRelayPinger<T> {
    remaining: VecDeque<RelayRecord>,
    ready: VecDeque<PingedRelay>,
    transport: T,
    timeout: Duration,
    max_gas_price: U256,
    probes: usize,
}

impl<T: HttpTransport> ActiveRelayPinger<T> {
    pub fn new(ranked: Vec<ScoredRelay>, transport: T, timeout: Duration, max_gas_price: U256) -> Self {
        Self::from_records(
            ranked.into_iter().map(|s| s.relay).collect(),
            transport,
            timeout,
            max_gas_price,
        )
    }

    pub fn from_records(
        relays: Vec<RelayRecord>,
        transport: T,
        timeout: Duration,
        max_gas_price: U256,
    ) -> Self {
        Self {
            remaining: relays.into(),
            ready: VecDeque::new(),
            transport,
            timeout,
            max_gas_price,
            probes: 0,
        }
    }

    /// Next usable relay, or [`crate::Error::NoRelayFound`] once the list
    /// is exhausted.
    pub async fn next_relay(&mut self) -> Result<PingedRelay, crate::Error> {
        loop {
            if let Some(pinged) = self.ready.pop_front() {
                Metrics::incr(&METRICS.relays_found);
                info!(url = %pinged.relay.url, probes = self.probes, "Found relay");
                return Ok(pinged);
            }
            if self.remaining.is_empty() {
                Metrics::incr(&METRICS.no_relay_found);
                warn!(probes = self.probes, "No relay available");
                return Err(crate::Error::NoRelayFound {
                    probed: self.probes,
                });
            }
            self.probe_wave().await;
        }
    }

    async fn probe_wave(&mut self) {
        let take = PING_BATCH_SIZE.min(self.remaining.len());
        let wave: Vec<RelayRecord> = self.remaining.drain(..take).collect();
        self.probes += wave.len();
        Metrics::incr(&METRICS.ping_batches);

        let transport = &self.transport;
        let (timeout, max_gas_price) = (self.timeout, self.max_gas_price);
        let outcomes = join_all(
            wave.iter()
                .map(|relay| probe_relay(transport, relay, timeout, max_gas_price)),
        )
        .await;

        for (relay, outcome) in wave.into_iter().zip(outcomes) {
            if let ProbeOutcome::Eligible(info) = outcome {
                self.ready.push_back(PingedRelay { relay, info });
            }
        }
        debug!(
            size = take,
            eligible = self.ready.len(),
            left = self.remaining.len(),
            "Ping wave done"
        );
    }

    /// Probes issued so far.
    pub fn probe_count(&self) -> usize {
        self.probes
    }

    pub fn remaining(&self) -> usize {
        self.remaining.len() + self.ready.len()
    }
}
