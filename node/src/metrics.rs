//! Prometheus metrics for the Tidemark orchestrator.
//!
//! The [`NodeMetrics`] struct owns a dedicated [`Registry`] that an
//! operator-facing endpoint can encode into the Prometheus text
//! exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

/// Central collection of orchestrator-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Total stage commands dispatched to handlers.
    pub commands_dispatched: IntCounter,
    /// Total steps completed successfully.
    pub steps_completed: IntCounter,
    /// Total steps that ended in permanent failure.
    pub steps_failed: IntCounter,
    /// Total transient-failure retries across all collaborator calls.
    pub retries: IntCounter,
    /// Total notifications published to the bus.
    pub notifications_published: IntCounter,
    /// Total verifications that recommended approval.
    pub verifications_approved: IntCounter,
    /// Total verifications that recommended rejection.
    pub verifications_rejected: IntCounter,
    /// Total verifications suspended for community or manual review.
    pub verifications_suspended: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Workflow instances currently held in memory.
    pub active_instances: IntGauge,
    /// Out-of-order events currently parked.
    pub parked_events: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time spent per stage handler, in milliseconds.
    pub stage_duration_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let commands_dispatched = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_commands_dispatched_total",
                "Total stage commands dispatched"
            ),
            registry
        )
        .expect("failed to register commands_dispatched counter");

        let steps_completed = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_steps_completed_total",
                "Total workflow steps completed"
            ),
            registry
        )
        .expect("failed to register steps_completed counter");

        let steps_failed = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_steps_failed_total",
                "Total workflow steps that failed permanently"
            ),
            registry
        )
        .expect("failed to register steps_failed counter");

        let retries = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_retries_total",
                "Total transient-failure retries of collaborator calls"
            ),
            registry
        )
        .expect("failed to register retries counter");

        let notifications_published = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_notifications_published_total",
                "Total notification events published"
            ),
            registry
        )
        .expect("failed to register notifications_published counter");

        let verifications_approved = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_verifications_approved_total",
                "Total verifications recommending approval"
            ),
            registry
        )
        .expect("failed to register verifications_approved counter");

        let verifications_rejected = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_verifications_rejected_total",
                "Total verifications recommending rejection"
            ),
            registry
        )
        .expect("failed to register verifications_rejected counter");

        let verifications_suspended = register_int_counter_with_registry!(
            Opts::new(
                "tidemark_verifications_suspended_total",
                "Total verifications suspended for review"
            ),
            registry
        )
        .expect("failed to register verifications_suspended counter");

        let active_instances = register_int_gauge_with_registry!(
            Opts::new(
                "tidemark_active_instances",
                "Workflow instances currently in memory"
            ),
            registry
        )
        .expect("failed to register active_instances gauge");

        let parked_events = register_int_gauge_with_registry!(
            Opts::new(
                "tidemark_parked_events",
                "Out-of-order stage events currently parked"
            ),
            registry
        )
        .expect("failed to register parked_events gauge");

        let stage_duration_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "tidemark_stage_duration_ms",
                "Stage handler wall time in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register stage_duration_ms histogram");

        Self {
            registry,
            commands_dispatched,
            steps_completed,
            steps_failed,
            retries,
            notifications_published,
            verifications_approved,
            verifications_rejected,
            verifications_suspended,
            active_instances,
            parked_events,
            stage_duration_ms,
        }
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}
