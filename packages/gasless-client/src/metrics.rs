//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Discovery ---
    pub selections: AtomicU64,
    pub relays_ranked: AtomicU64,

    // --- Probing ---
    pub ping_batches: AtomicU64,
    pub probes_total: AtomicU64,
    pub probes_ineligible: AtomicU64,
    pub relays_found: AtomicU64,
    pub no_relay_found: AtomicU64,

    // --- Submission ---
    pub submissions_total: AtomicU64,
    pub submissions_rejected: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            selections: AtomicU64::new(0),
            relays_ranked: AtomicU64::new(0),
            ping_batches: AtomicU64::new(0),
            probes_total: AtomicU64::new(0),
            probes_ineligible: AtomicU64::new(0),
            relays_found: AtomicU64::new(0),
            no_relay_found: AtomicU64::new(0),
            submissions_total: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
        }
    }

    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let selections = self.selections.load(Ordering::Relaxed);
        let relays_ranked = self.relays_ranked.load(Ordering::Relaxed);
        let ping_batches = self.ping_batches.load(Ordering::Relaxed);
        let probes_total = self.probes_total.load(Ordering::Relaxed);
        let probes_ineligible = self.probes_ineligible.load(Ordering::Relaxed);
        let relays_found = self.relays_found.load(Ordering::Relaxed);
        let no_relay_found = self.no_relay_found.load(Ordering::Relaxed);
        let submissions_total = self.submissions_total.load(Ordering::Relaxed);
        let submissions_rejected = self.submissions_rejected.load(Ordering::Relaxed);
        let rpc_failovers = self.rpc_failovers.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);

        format!(
            "\
# HELP gasless_selections_total Relay selection passes.\n\
# TYPE gasless_selections_total counter\n\
gasless_selections_total {selections}\n\
# HELP gasless_relays_ranked_total Relays that survived filtering.\n\
# TYPE gasless_relays_ranked_total counter\n\
gasless_relays_ranked_total {relays_ranked}\n\
# HELP gasless_ping_batches_total Concurrent ping batches issued.\n\
# TYPE gasless_ping_batches_total counter\n\
gasless_ping_batches_total {ping_batches}\n\
# HELP gasless_probes_total Relay health probes issued.\n\
# TYPE gasless_probes_total counter\n\
gasless_probes_total {probes_total}\n\
# HELP gasless_probes_ineligible_total Probes that failed or reported ineligible.\n\
# TYPE gasless_probes_ineligible_total counter\n\
gasless_probes_ineligible_total {probes_ineligible}\n\
# HELP gasless_relays_found_total Eligible relays handed out by the pinger.\n\
# TYPE gasless_relays_found_total counter\n\
gasless_relays_found_total {relays_found}\n\
# HELP gasless_no_relay_found_total Pinger runs that exhausted every candidate.\n\
# TYPE gasless_no_relay_found_total counter\n\
gasless_no_relay_found_total {no_relay_found}\n\
# HELP gasless_submissions_total Signed requests posted to relays.\n\
# TYPE gasless_submissions_total counter\n\
gasless_submissions_total {submissions_total}\n\
# HELP gasless_submissions_rejected_total Requests a relay definitively rejected.\n\
# TYPE gasless_submissions_rejected_total counter\n\
gasless_submissions_rejected_total {submissions_rejected}\n\
# HELP gasless_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE gasless_rpc_failovers_total counter\n\
gasless_rpc_failovers_total {rpc_failovers}\n\
# HELP gasless_rpc_errors_total RPC errors.\n\
# TYPE gasless_rpc_errors_total counter\n\
gasless_rpc_errors_total {rpc_errors}\n"
        )
    }
}
