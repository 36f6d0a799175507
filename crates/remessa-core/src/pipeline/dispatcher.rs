//! Serial batch dispatch against the provider, paced by the rate governor.
//!
//! Batches go out one at a time. A rate-limited batch gets exactly one retry
//! after the provider's backoff; any other provider error fails the batch
//! immediately. A cycle deadline bounds total dispatch time so a slow
//! provider cannot make cycles pile up.

use tracing::{info, warn};

use crate::now_ms;
use crate::provider::{BatchEmail, Provider, ProviderError};
use crate::storage::Storage;

use super::claimer::ClaimedJob;
use super::governor::RateGovernor;
use super::reconciler;

#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    pub sent: usize,
    pub failed: usize,
    pub batches: usize,
    pub rate_limit_hits: usize,
    /// Batches left undispatched because the cycle deadline arrived. Their
    /// jobs stay claimed and return via claim expiry.
    pub skipped_batches: usize,
}

pub async fn dispatch_all(
    storage: &dyn Storage,
    provider: &dyn Provider,
    governor: &mut RateGovernor,
    batches: Vec<Vec<ClaimedJob>>,
    deadline: tokio::time::Instant,
) -> DispatchStats {
    let mut stats = DispatchStats::default();
    let total = batches.len();

    for (i, batch) in batches.into_iter().enumerate() {
        if tokio::time::Instant::now() >= deadline {
            stats.skipped_batches = total - i;
            warn!(
                skipped = stats.skipped_batches,
                "cycle deadline reached, leaving remaining batches claimed"
            );
            break;
        }

        let wait = governor.pace(tokio::time::Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        dispatch_one(storage, provider, governor, &batch, &mut stats).await;
        stats.batches += 1;
    }
    stats
}

async fn dispatch_one(
    storage: &dyn Storage,
    provider: &dyn Provider,
    governor: &mut RateGovernor,
    batch: &[ClaimedJob],
    stats: &mut DispatchStats,
) {
    let emails: Vec<BatchEmail> = batch.iter().map(|(_, job)| BatchEmail::from(job)).collect();

    governor.record_dispatch(tokio::time::Instant::now());
    let first = provider.send_batch(&emails).await;

    let result = match first {
        Err(ProviderError::RateLimited { retry_after }) => {
            stats.rate_limit_hits += 1;
            let backoff = governor.backoff(retry_after);
            info!(backoff_ms = backoff.as_millis() as u64, "rate limited, retrying batch once");
            tokio::time::sleep(backoff).await;
            governor.record_dispatch(tokio::time::Instant::now());
            provider.send_batch(&emails).await
        }
        other => other,
    };

    match result {
        Ok(provider_ids) => {
            stats.sent += reconciler::mark_batch_sent(storage, batch, &provider_ids, now_ms());
        }
        Err(e) => {
            if matches!(e, ProviderError::RateLimited { .. }) {
                stats.rate_limit_hits += 1;
            }
            warn!(size = batch.len(), error = %e, "batch dispatch failed");
            stats.failed +=
                reconciler::mark_batch_failed(storage, batch, &e.to_string(), now_ms());
        }
    }
}
