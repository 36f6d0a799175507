//! Outcome reconciliation, in two halves.
//!
//! Synchronous: a batch send is all-or-nothing at the provider boundary, so
//! batch success marks every member sent and batch failure marks every member
//! failed. Asynchronous: webhook events arrive later, correlated back to jobs
//! through the provider message ID, and update the delivery projection.

use tracing::{debug, warn};

use crate::error::StorageError;
use crate::event::{DeliveryEvent, EventType, SuppressionEntry};
use crate::job::EmailJob;
use crate::storage::{keys, Storage};

use super::claimer::ClaimedJob;

/// Mark every job in a successfully dispatched batch as sent, pairing jobs
/// with provider message IDs by position. Returns the number marked.
pub fn mark_batch_sent(
    storage: &dyn Storage,
    batch: &[ClaimedJob],
    provider_ids: &[String],
    now_ms: u64,
) -> usize {
    if provider_ids.len() != batch.len() {
        warn!(
            expected = batch.len(),
            got = provider_ids.len(),
            "provider returned a short ID list, pairing by position"
        );
    }
    let mut marked = 0;
    for (i, (key, job)) in batch.iter().enumerate() {
        let Some(provider_id) = provider_ids.get(i) else {
            // No ID for this slot; fail it so it is not silently lost.
            mark_one_failed(storage, key, job, "provider omitted message id", now_ms);
            continue;
        };
        match storage.mark_sent(key, provider_id, now_ms) {
            Ok(Some(_)) => marked += 1,
            Ok(None) => {
                debug!(job_id = %job.id, "job no longer claimed, skipping sent mark");
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "failed to persist sent mark");
            }
        }
    }
    marked
}

/// Mark every job in a failed batch as failed with the given error. Returns
/// the number marked.
pub fn mark_batch_failed(
    storage: &dyn Storage,
    batch: &[ClaimedJob],
    error: &str,
    now_ms: u64,
) -> usize {
    let mut marked = 0;
    for (key, job) in batch {
        if mark_one_failed(storage, key, job, error, now_ms) {
            marked += 1;
        }
    }
    marked
}

fn mark_one_failed(
    storage: &dyn Storage,
    key: &[u8],
    job: &EmailJob,
    error: &str,
    now_ms: u64,
) -> bool {
    match storage.mark_failed(key, error, now_ms) {
        Ok(Some(_)) => true,
        Ok(None) => {
            debug!(job_id = %job.id, "job already terminal, skipping failed mark");
            false
        }
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "failed to persist failed mark");
            false
        }
    }
}

/// What processing a webhook event amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventApplied {
    /// The event was correlated to a job and its delivery projection updated.
    Updated,
    /// Known event type, recorded, but no matching job (or no projection to
    /// write, as for `email.sent`).
    RecordedOnly,
    /// Payload carried no `email_id`, nothing to correlate against.
    MissingEmailId,
    /// Event type outside the known taxonomy; accepted but ignored.
    UnknownType,
}

/// Apply one asynchronous delivery event. Recording happens before
/// correlation, so events for jobs this instance never sent are still kept.
/// Processing is idempotent: replays overwrite their own event record and
/// re-write the same projection.
pub fn apply_event(
    storage: &dyn Storage,
    event: &DeliveryEvent,
    now_ms: u64,
) -> Result<EventApplied, StorageError> {
    let Some(kind) = EventType::parse(&event.event_type) else {
        debug!(event_type = %event.event_type, "ignoring unknown event type");
        return Ok(EventApplied::UnknownType);
    };

    let email_id = match event.data.email_id.as_deref().filter(|s| !s.is_empty()) {
        Some(id) if id.len() > keys::MAX_COMPONENT_LEN => {
            warn!(
                event_type = %event.event_type,
                len = id.len(),
                "email_id exceeds key component bound, cannot correlate"
            );
            return Ok(EventApplied::MissingEmailId);
        }
        Some(id) => id,
        None => {
            warn!(event_type = %event.event_type, "event carries no email_id");
            return Ok(EventApplied::MissingEmailId);
        }
    };

    let created_at = event
        .created_at
        .as_deref()
        .filter(|s| s.len() <= keys::MAX_COMPONENT_LEN)
        .unwrap_or("");
    let record = serde_json::to_vec(event)?;
    storage.put_event(&keys::event_key(email_id, kind.as_str(), created_at), &record)?;

    let Some(job_key) = storage.job_key_for_provider_id(email_id)? else {
        debug!(email_id, event_type = %event.event_type, "no job for provider id");
        return Ok(EventApplied::RecordedOnly);
    };

    let updated = match kind.delivery_status() {
        Some(delivery) => storage.record_delivery(&job_key, delivery, now_ms)?,
        None => None,
    };

    if kind == EventType::Complained {
        suppress_complainants(storage, &job_key, event, now_ms)?;
    }

    Ok(match updated {
        Some(_) => EventApplied::Updated,
        None => EventApplied::RecordedOnly,
    })
}

/// A complaint permanently suppresses the recipient for that tenant. The
/// event's `to` list is authoritative; the job's recipient is the fallback.
fn suppress_complainants(
    storage: &dyn Storage,
    job_key: &[u8],
    event: &DeliveryEvent,
    now_ms: u64,
) -> Result<(), StorageError> {
    let Some(job) = storage.get_job(job_key)? else {
        return Ok(());
    };

    let recipients: Vec<&str> = if event.data.to.is_empty() {
        vec![job.to_email.as_str()]
    } else {
        event.data.to.iter().map(String::as_str).collect()
    };

    for email in recipients {
        if email.len() > keys::MAX_COMPONENT_LEN {
            warn!(
                tenant_id = %job.tenant_id,
                len = email.len(),
                "recipient exceeds key component bound, skipping suppression"
            );
            continue;
        }
        let entry = SuppressionEntry {
            email: email.trim().to_lowercase(),
            reason: "complained".to_string(),
            created_at: now_ms,
        };
        if storage.insert_suppression(&job.tenant_id, email, &entry)? {
            warn!(tenant_id = %job.tenant_id, "recipient suppressed after complaint");
        }
    }
    Ok(())
}
