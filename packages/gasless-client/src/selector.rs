//! Relay filtering and ranking.

use gasless_types::U256;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info};

use crate::failures::{now_ms, FailureRecord};
use crate::metrics::{Metrics, METRICS};
use crate::registry::{fold_events, RegistryEvent, RelayRecord};

/// Thresholds applied before scoring. Zero disables a threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionConfig {
    pub min_stake: U256,
    /// Seconds.
    pub min_delay: u64,
    pub failure_window: Duration,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_stake: U256::ZERO,
            min_delay: 0,
            failure_window: Duration::from_secs(60),
        }
    }
}

/// Caller-supplied filter, score and tie-break noise. Lower scores rank
/// first. Implementations must be free of side effects.
pub trait RelayStrategy: Send + Sync {
    fn accept(&self, _relay: &RelayRecord) -> bool {
        true
    }

    fn score(&self, relay: &RelayRecord) -> f64 {
        relay.transaction_fee as f64
    }

    /// Added to every score; must lie in `[0, 1)`.
    fn randomness(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Accept everything, cheapest fee first, uniform tie-break noise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStrategy;

impl RelayStrategy for DefaultStrategy {}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRelay {
    pub relay: RelayRecord,
    pub score: f64,
    pub recently_failed: bool,
}

pub struct RelaySelector {
    config: SelectionConfig,
    strategy: Box<dyn RelayStrategy>,
}

impl RelaySelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self::with_strategy(config, DefaultStrategy)
    }

    pub fn with_strategy(config: SelectionConfig, strategy: impl RelayStrategy + 'static) -> Self {
        Self {
            config,
            strategy: Box::new(strategy),
        }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Fold raw registry events and rank the surviving relays.
    pub fn select(&self, events: Vec<RegistryEvent>, failures: &FailureRecord) -> Vec<ScoredRelay> {
        self.select_at(events, failures, now_ms())
    }

    pub fn select_at(
        &self,
        events: Vec<RegistryEvent>,
        failures: &FailureRecord,
        now_ms: u64,
    ) -> Vec<ScoredRelay> {
        let records = fold_events(events)
            .into_iter()
            .filter_map(|added| {
                let relay = added.relay;
                RelayRecord::try_from(added)
                    .map_err(|e| debug!(relay = %relay, reason = %e, "Dropping malformed relay"))
                    .ok()
            })
            .collect();
        self.rank(records, failures, now_ms)
    }

    /// Filter, score and order `records`.
    ///
    /// The failure record stays locked for the whole pass. Entries older
    /// than the window are deleted first, whether or not their relay is
    /// still a candidate; relays with a remaining entry sort last.
    pub fn rank(
        &self,
        records: Vec<RelayRecord>,
        failures: &FailureRecord,
        now_ms: u64,
    ) -> Vec<ScoredRelay> {
        Metrics::incr(&METRICS.selections);
        let window_ms = u64::try_from(self.config.failure_window.as_millis()).unwrap_or(u64::MAX);
        let candidates = records.len();
        let mut failed = failures.lock();
        let tracked = failed.len();
        failed.retain(|url, ts| {
            let live = now_ms.saturating_sub(*ts) < window_ms;
            if !live {
                info!(url = %url, "Failure window elapsed, restoring relay");
            }
            live
        });
        if failed.len() < tracked {
            debug!(expired = tracked - failed.len(), "Dropped expired failure entries");
        }

        let mut ranked: Vec<ScoredRelay> = records
            .into_iter()
            .filter(|r| self.config.min_stake.is_zero() || r.stake >= self.config.min_stake)
            .filter(|r| self.config.min_delay == 0 || r.unstake_delay >= self.config.min_delay)
            .filter(|r| self.strategy.accept(r))
            .map(|relay| {
                let recently_failed = failed.contains_key(&relay.url);
                let score = self.strategy.score(&relay) + self.strategy.randomness();
                ScoredRelay {
                    relay,
                    score,
                    recently_failed,
                }
            })
            .collect();
        drop(failed);

        ranked.sort_by(|a, b| {
            a.recently_failed
                .cmp(&b.recently_failed)
                .then(a.score.total_cmp(&b.score))
        });

        METRICS
            .relays_ranked
            .fetch_add(ranked.len() as u64, std::sync::atomic::Ordering::Relaxed);
        debug!(candidates, ranked = ranked.len(), "Ranked relays");
        ranked
    }
}
