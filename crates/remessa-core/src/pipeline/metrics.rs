use opentelemetry::metrics::{Counter, Gauge, Meter};
use opentelemetry::KeyValue;

use crate::event::EventType;

/// Core OTel metrics for the send queue. Created once during pipeline init;
/// with no meter provider configured the instruments are no-op.
#[derive(Clone)]
pub struct Metrics {
    pub jobs_claimed: Counter<u64>,
    pub jobs_blocked: Counter<u64>,
    pub jobs_sent: Counter<u64>,
    pub jobs_failed: Counter<u64>,
    pub batches_dispatched: Counter<u64>,
    pub batches_skipped: Counter<u64>,
    pub rate_limit_hits: Counter<u64>,
    pub claims_reclaimed: Counter<u64>,
    pub webhook_events: Counter<u64>,
    pub cycle_duration_ms: Gauge<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let meter = opentelemetry::global::meter("remessa");
        Self::from_meter(&meter)
    }

    /// Create metrics from a specific meter (used in tests with an in-memory
    /// exporter).
    pub fn from_meter(meter: &Meter) -> Self {
        Self {
            jobs_claimed: meter
                .u64_counter("remessa.jobs.claimed")
                .with_description("Jobs claimed for dispatch")
                .build(),
            jobs_blocked: meter
                .u64_counter("remessa.jobs.blocked")
                .with_description("Jobs blocked by the suppression list")
                .build(),
            jobs_sent: meter
                .u64_counter("remessa.jobs.sent")
                .with_description("Jobs accepted by the provider")
                .build(),
            jobs_failed: meter
                .u64_counter("remessa.jobs.failed")
                .with_description("Jobs whose batch call failed terminally")
                .build(),
            batches_dispatched: meter
                .u64_counter("remessa.batches.dispatched")
                .with_description("Provider batch calls issued")
                .build(),
            batches_skipped: meter
                .u64_counter("remessa.batches.skipped")
                .with_description("Batches skipped because the cycle budget ran out")
                .build(),
            rate_limit_hits: meter
                .u64_counter("remessa.provider.rate_limit_hits")
                .with_description("429 responses from the provider")
                .build(),
            claims_reclaimed: meter
                .u64_counter("remessa.claims.reclaimed")
                .with_description("Expired claims released back to queued")
                .build(),
            webhook_events: meter
                .u64_counter("remessa.webhook.events")
                .with_description("Delivery events accepted at the webhook")
                .build(),
            cycle_duration_ms: meter
                .u64_gauge("remessa.cycle.duration_ms")
                .with_description("Wall-clock duration of the last cycle")
                .build(),
        }
    }

    /// The `type` label comes from the parsed taxonomy, never the raw wire
    /// string, so the label set stays bounded.
    pub fn record_webhook_event(&self, event_type: Option<EventType>) {
        self.webhook_events
            .add(1, &[KeyValue::new("type", webhook_type_label(event_type))]);
    }
}

fn webhook_type_label(event_type: Option<EventType>) -> &'static str {
    event_type.map(|t| t.as_str()).unwrap_or("unknown")
}
