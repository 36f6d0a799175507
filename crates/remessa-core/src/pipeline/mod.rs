//! The send pipeline: one periodic cycle that reclaims expired claims,
//! claims a fair slice of queued work, partitions it into batches, and
//! dispatches them to the provider under rate pacing.

mod batch;
mod claimer;
mod config;
mod dispatcher;
mod governor;
mod metrics;
mod reconciler;

#[cfg(test)]
mod tests;

pub use claimer::{active_tenants, per_tenant_cap, ClaimOutcome, ClaimedJob};
pub use config::{CycleConfig, ProviderConfig, RemessaConfig, ServerConfig};
pub use dispatcher::DispatchStats;
pub use governor::RateGovernor;
pub use metrics::Metrics;
pub use reconciler::{apply_event, EventApplied};

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::StorageError;
use crate::event::{DeliveryEvent, EventType};
use crate::now_ms;
use crate::provider::Provider;
use crate::storage::{keys, Storage};

/// Summary of one completed cycle, for logging and metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleReport {
    pub reclaimed: usize,
    pub claimed: usize,
    pub blocked: usize,
    pub batches: usize,
    pub sent: usize,
    pub failed: usize,
    pub rate_limit_hits: usize,
    pub skipped_batches: usize,
}

pub struct Pipeline {
    storage: Arc<dyn Storage>,
    provider: Arc<dyn Provider>,
    config: RemessaConfig,
    governor: RateGovernor,
    metrics: Metrics,
}

impl Pipeline {
    pub fn new(storage: Arc<dyn Storage>, provider: Arc<dyn Provider>, config: RemessaConfig) -> Self {
        let governor = RateGovernor::new(
            Duration::from_millis(config.provider.min_batch_interval_ms),
            Duration::from_secs(config.provider.retry_after_fallback_secs),
        );
        Self {
            storage,
            provider,
            config,
            governor,
            metrics: Metrics::new(),
        }
    }

    /// Run one full cycle. Holds `&mut self` for its duration, so cycles
    /// never overlap within one pipeline instance.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, StorageError> {
        let started = tokio::time::Instant::now();
        let mut report = CycleReport::default();

        report.reclaimed = self.reclaim_expired_claims()?;

        let outcome = claimer::claim_cycle(
            self.storage.as_ref(),
            self.config.cycle.per_tenant_cap,
            self.config.cycle.global_budget,
            now_ms(),
            self.config.cycle.claim_ttl_ms(),
        )?;
        report.claimed = outcome.claimed.len();
        report.blocked = outcome.blocked;

        let batches = batch::partition(outcome.claimed, self.config.provider.batch_size);
        let deadline = started + Duration::from_millis(self.config.cycle.budget_ms);
        let stats = dispatcher::dispatch_all(
            self.storage.as_ref(),
            self.provider.as_ref(),
            &mut self.governor,
            batches,
            deadline,
        )
        .await;
        report.batches = stats.batches;
        report.sent = stats.sent;
        report.failed = stats.failed;
        report.rate_limit_hits = stats.rate_limit_hits;
        report.skipped_batches = stats.skipped_batches;

        self.record_metrics(&report, started.elapsed());
        info!(
            reclaimed = report.reclaimed,
            claimed = report.claimed,
            blocked = report.blocked,
            batches = report.batches,
            sent = report.sent,
            failed = report.failed,
            rate_limit_hits = report.rate_limit_hits,
            skipped_batches = report.skipped_batches,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cycle complete"
        );
        Ok(report)
    }

    /// Return jobs whose claims outlived their TTL to the queue. Covers
    /// crashes and deadline-skipped batches.
    fn reclaim_expired_claims(&self) -> Result<usize, StorageError> {
        let bound = keys::claim_expiry_upper_bound(now_ms());
        let expired = self.storage.list_expired_claims(&bound)?;
        let mut reclaimed = 0;
        for (expiry_key, job_key) in expired {
            match self.storage.release_claim(&job_key, &expiry_key) {
                Ok(true) => reclaimed += 1,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "failed to release expired claim"),
            }
        }
        if reclaimed > 0 {
            warn!(reclaimed, "returned expired claims to the queue");
        }
        Ok(reclaimed)
    }

    /// Apply an asynchronous delivery event through the reconciler, with
    /// metrics attached. Exposed for the webhook surface.
    pub fn apply_delivery_event(
        storage: &dyn Storage,
        metrics: &Metrics,
        event: &DeliveryEvent,
    ) -> Result<EventApplied, StorageError> {
        let applied = reconciler::apply_event(storage, event, now_ms())?;
        metrics.record_webhook_event(EventType::parse(&event.event_type));
        Ok(applied)
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    fn record_metrics(&self, report: &CycleReport, elapsed: Duration) {
        let m = &self.metrics;
        m.jobs_claimed.add(report.claimed as u64, &[]);
        m.jobs_blocked.add(report.blocked as u64, &[]);
        m.jobs_sent.add(report.sent as u64, &[]);
        m.jobs_failed.add(report.failed as u64, &[]);
        m.batches_dispatched.add(report.batches as u64, &[]);
        m.batches_skipped.add(report.skipped_batches as u64, &[]);
        m.rate_limit_hits.add(report.rate_limit_hits as u64, &[]);
        m.claims_reclaimed.add(report.reclaimed as u64, &[]);
        m.cycle_duration_ms.record(elapsed.as_millis() as u64, &[]);
    }
}
