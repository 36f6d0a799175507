//! Fair claim phase: round-robin over tenants with queued work, bounded per
//! tenant so no backlog can monopolize a cycle.
//!
//! All fairness state here is cycle-scoped, computed fresh from the queued
//! index each invocation and discarded afterwards, so restarts can never act
//! on stale fairness data.

use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::job::EmailJob;
use crate::storage::{keys, Storage};

/// A claimed job together with its storage key, which later phases need for
/// status write-back.
pub type ClaimedJob = (Vec<u8>, EmailJob);

/// Result of one claim phase.
#[derive(Debug, Default)]
pub struct ClaimOutcome {
    pub claimed: Vec<ClaimedJob>,
    /// Jobs failed at claim time because the recipient is suppressed.
    pub blocked: usize,
    /// Tenants skipped because their queued-index read failed.
    pub skipped_tenants: usize,
}

/// Per-tenant claim cap for this cycle. Shrinks as more tenants have backlog,
/// so capacity is always split evenly before the hard cap applies.
pub fn per_tenant_cap(hard_cap: usize, global_budget: usize, tenants_with_work: usize) -> usize {
    if tenants_with_work == 0 {
        return 0;
    }
    hard_cap.min(global_budget / tenants_with_work)
}

/// Distinct tenants currently holding at least one queued job, in first-seen
/// key order.
pub fn active_tenants(storage: &dyn Storage) -> StorageResult<Vec<String>> {
    let queued = storage.list_queued(&[])?;
    let mut tenants = Vec::new();
    for key in &queued {
        let Some(tenant) = keys::parse_tenant(key) else {
            warn!("corrupt queued-index key, skipping");
            continue;
        };
        if tenants.last() != Some(&tenant) && !tenants.contains(&tenant) {
            tenants.push(tenant);
        }
    }
    Ok(tenants)
}

/// Claim up to `cap` jobs for one tenant, in queue order. Claim contention
/// (another cycle won the compare-and-set) silently excludes the job; a
/// suppressed recipient on a non-transactional job fails the job instead of
/// claiming it.
fn claim_for_tenant(
    storage: &dyn Storage,
    tenant_id: &str,
    cap: usize,
    now_ms: u64,
    claim_ttl_ms: u64,
    outcome: &mut ClaimOutcome,
) -> StorageResult<()> {
    let queued_keys = storage.list_queued(&keys::tenant_prefix(tenant_id))?;

    let mut claimed_here = 0usize;
    for key in queued_keys {
        if claimed_here >= cap {
            break;
        }

        // Suppression may have arrived after enqueue; re-check at claim time.
        if let Some(job) = storage.get_job(&key)? {
            if !job.is_transactional() && storage.is_suppressed(tenant_id, &job.to_email)? {
                if storage
                    .mark_failed(&key, "blocked at send time: recipient unsubscribed", now_ms)?
                    .is_some()
                {
                    outcome.blocked += 1;
                }
                continue;
            }
        }

        match storage.claim_job(&key, now_ms, claim_ttl_ms)? {
            Some(job) => {
                outcome.claimed.push((key, job));
                claimed_here += 1;
            }
            None => {
                // Lost the CAS to a concurrent cycle, or the job moved on.
                debug!(tenant_id, "claim contention, job excluded from this cycle");
            }
        }
    }
    Ok(())
}

/// Run the claim phase across all tenants with work. A storage failure for
/// one tenant is isolated: logged, counted, and the remaining tenants still
/// get their turn.
pub fn claim_cycle(
    storage: &dyn Storage,
    hard_cap: usize,
    global_budget: usize,
    now_ms: u64,
    claim_ttl_ms: u64,
) -> StorageResult<ClaimOutcome> {
    let tenants = active_tenants(storage)?;
    let cap = per_tenant_cap(hard_cap, global_budget, tenants.len());

    let mut outcome = ClaimOutcome::default();
    if cap == 0 {
        return Ok(outcome);
    }

    for tenant_id in &tenants {
        if let Err(e) = claim_for_tenant(storage, tenant_id, cap, now_ms, claim_ttl_ms, &mut outcome)
        {
            warn!(tenant_id, error = %e, "claim failed for tenant, skipping this cycle");
            outcome.skipped_tenants += 1;
        }
    }

    debug!(
        tenants = tenants.len(),
        cap,
        claimed = outcome.claimed.len(),
        blocked = outcome.blocked,
        "claim phase complete"
    );
    Ok(outcome)
}
