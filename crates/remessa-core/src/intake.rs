//! Queue ingestion. The rest of the platform hands over fully rendered
//! content; the queue validates presence only, never content correctness.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{RemessaError, Result};
use crate::job::{EmailJob, JobSource, JobStatus};
use crate::storage::{keys, Storage, WriteBatchOp};
use uuid::Uuid;

/// A request to enqueue one outbound message.
#[derive(Debug, Clone)]
pub struct EnqueueRequest {
    pub tenant_id: String,
    pub source: JobSource,
    pub to_email: String,
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub reply_to: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Result of an enqueue. A blocked job is stored as `Failed` (with the
/// content body cleared) so it stays visible to operators but is never
/// claimed or sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued(Uuid),
    Blocked(Uuid),
}

impl EnqueueOutcome {
    pub fn id(&self) -> Uuid {
        match self {
            EnqueueOutcome::Queued(id) | EnqueueOutcome::Blocked(id) => *id,
        }
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RemessaError::InvalidJob(format!("missing field: {field}")));
    }
    Ok(())
}

/// Fields that become storage key components carry a length bound on top of
/// the presence check.
fn bounded(field: &str, value: &str) -> Result<()> {
    if value.len() > keys::MAX_COMPONENT_LEN {
        return Err(RemessaError::InvalidJob(format!("field too long: {field}")));
    }
    Ok(())
}

/// Enqueue a job. Non-transactional messages to a suppressed recipient are
/// blocked up front rather than at claim time, so they never consume cycle
/// capacity.
pub fn enqueue(
    storage: &dyn Storage,
    req: EnqueueRequest,
    now_ms: u64,
) -> Result<EnqueueOutcome> {
    require("tenant_id", &req.tenant_id)?;
    require("to_email", &req.to_email)?;
    bounded("tenant_id", &req.tenant_id)?;
    bounded("to_email", &req.to_email)?;
    require("from_name", &req.from_name)?;
    require("from_email", &req.from_email)?;
    require("subject", &req.subject)?;
    require("html_content", &req.html_content)?;

    let suppressed = req.source != JobSource::Transactional
        && storage.is_suppressed(&req.tenant_id, &req.to_email)?;

    let id = EmailJob::new_id();
    let job = EmailJob {
        id,
        tenant_id: req.tenant_id.clone(),
        to_email: req.to_email,
        from_name: req.from_name,
        from_email: req.from_email,
        subject: req.subject,
        html_content: if suppressed { String::new() } else { req.html_content },
        text_content: req.text_content,
        reply_to: req.reply_to,
        headers: req.headers,
        source: req.source,
        status: if suppressed { JobStatus::Failed } else { JobStatus::Queued },
        delivery: None,
        attempts: 0,
        queued_at: now_ms,
        claimed_at: None,
        sent_at: None,
        failed_at: if suppressed { Some(now_ms) } else { None },
        delivery_updated_at: None,
        claim_expires_at: None,
        last_error: suppressed.then(|| "blocked: recipient is unsubscribed".to_string()),
        provider_message_id: None,
    };

    let key = keys::job_key(&req.tenant_id, now_ms, &id);
    let value = serde_json::to_vec(&job).map_err(crate::error::StorageError::from)?;

    let mut ops = vec![WriteBatchOp::PutJob {
        key: key.clone(),
        value,
    }];
    if !suppressed {
        ops.push(WriteBatchOp::PutQueuedMarker { key });
    }
    storage.write_batch(ops)?;

    if suppressed {
        debug!(tenant_id = %req.tenant_id, job_id = %id, "enqueue blocked: recipient suppressed");
        Ok(EnqueueOutcome::Blocked(id))
    } else {
        debug!(tenant_id = %req.tenant_id, job_id = %id, "job enqueued");
        Ok(EnqueueOutcome::Queued(id))
    }
}
