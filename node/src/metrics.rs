//! Prometheus metrics for the airdrop service.
//!
//! [`ServiceMetrics`] owns a dedicated [`Registry`] that the HTTP `/metrics`
//! endpoint encodes into the Prometheus text exposition format. It is fed
//! through the observer hooks of claim intake and the broadcast engine.

use airdrop_broadcaster::BroadcastObserver;
use airdrop_rpc::IntakeObserver;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};

pub struct ServiceMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Intake ──────────────────────────────────────────────────────────
    pub claims_accepted: IntCounter,
    /// Rejected claims, labelled by rejection code.
    pub claims_rejected: IntCounterVec,
    pub claims_conflicted: IntCounter,

    // ── Broadcast ───────────────────────────────────────────────────────
    pub broadcasts_completed: IntCounter,
    pub broadcasts_failed: IntCounter,
    pub status_write_retries: IntCounter,
    /// Pending claims selected by the most recent poll cycle.
    pub pending_claims: IntGauge,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let claims_accepted = register_int_counter_with_registry!(
            Opts::new(
                "airdrop_claims_accepted_total",
                "Claims that passed verification and were stored"
            ),
            registry
        )
        .expect("failed to register claims_accepted counter");

        let claims_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "airdrop_claims_rejected_total",
                "Claims rejected by verification, by reason"
            ),
            &["reason"],
            registry
        )
        .expect("failed to register claims_rejected counter");

        let claims_conflicted = register_int_counter_with_registry!(
            Opts::new(
                "airdrop_claims_conflicted_total",
                "Claims refused because the nullifier already claimed"
            ),
            registry
        )
        .expect("failed to register claims_conflicted counter");

        let broadcasts_completed = register_int_counter_with_registry!(
            Opts::new(
                "airdrop_broadcasts_completed_total",
                "Claims paid with a successful ledger transaction"
            ),
            registry
        )
        .expect("failed to register broadcasts_completed counter");

        let broadcasts_failed = register_int_counter_with_registry!(
            Opts::new(
                "airdrop_broadcasts_failed_total",
                "Claims whose transfer failed"
            ),
            registry
        )
        .expect("failed to register broadcasts_failed counter");

        let status_write_retries = register_int_counter_with_registry!(
            Opts::new(
                "airdrop_status_write_retries_total",
                "Claim status writes retried after a storage failure"
            ),
            registry
        )
        .expect("failed to register status_write_retries counter");

        let pending_claims = register_int_gauge_with_registry!(
            Opts::new(
                "airdrop_pending_claims",
                "Pending claims selected by the last broadcast cycle"
            ),
            registry
        )
        .expect("failed to register pending_claims gauge");

        Self {
            registry,
            claims_accepted,
            claims_rejected,
            claims_conflicted,
            broadcasts_completed,
            broadcasts_failed,
            status_write_retries,
            pending_claims,
        }
    }
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeObserver for ServiceMetrics {
    fn claim_accepted(&self) {
        self.claims_accepted.inc();
    }

    fn claim_rejected(&self, reason: &str) {
        self.claims_rejected.with_label_values(&[reason]).inc();
    }

    fn claim_conflicted(&self) {
        self.claims_conflicted.inc();
    }
}

impl BroadcastObserver for ServiceMetrics {
    fn claim_completed(&self) {
        self.broadcasts_completed.inc();
    }

    fn claim_failed(&self) {
        self.broadcasts_failed.inc();
    }

    fn status_write_retried(&self) {
        self.status_write_retries.inc();
    }

    fn cycle_finished(&self, pending: usize) {
        self.pending_claims
            .set(i64::try_from(pending).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    fn render(metrics: &ServiceMetrics) -> String {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metrics.registry.gather(), &mut buf)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn observers_feed_counters() {
        let metrics = ServiceMetrics::new();
        metrics.claim_accepted();
        metrics.claim_rejected("underage");
        metrics.claim_rejected("underage");
        metrics.claim_rejected("invalid-proof");
        metrics.claim_conflicted();
        metrics.claim_completed();
        metrics.claim_failed();
        metrics.status_write_retried();
        metrics.cycle_finished(7);

        assert_eq!(metrics.claims_accepted.get(), 1);
        assert_eq!(
            metrics.claims_rejected.with_label_values(&["underage"]).get(),
            2
        );
        assert_eq!(metrics.claims_conflicted.get(), 1);
        assert_eq!(metrics.broadcasts_completed.get(), 1);
        assert_eq!(metrics.broadcasts_failed.get(), 1);
        assert_eq!(metrics.status_write_retries.get(), 1);
        assert_eq!(metrics.pending_claims.get(), 7);
    }

    #[test]
    fn exposition_names_every_family() {
        let metrics = ServiceMetrics::new();
        metrics.claim_rejected("stale-proof");
        let text = render(&metrics);
        for name in [
            "airdrop_claims_accepted_total",
            "airdrop_claims_rejected_total{reason=\"stale-proof\"} 1",
            "airdrop_claims_conflicted_total",
            "airdrop_broadcasts_completed_total",
            "airdrop_broadcasts_failed_total",
            "airdrop_status_write_retries_total",
            "airdrop_pending_claims",
        ] {
            assert!(text.contains(name), "missing {name}");
        }
    }

    #[test]
    fn separate_instances_do_not_collide() {
        let a = ServiceMetrics::new();
        let b = ServiceMetrics::new();
        a.claim_accepted();
        assert_eq!(b.claims_accepted.get(), 0);
    }
}
