use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Send state of a job. A job transitions `Queued → Claimed → {Sent | Failed}`
/// exactly once per claim; the claim is a status-guarded compare-and-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Claimed,
    Sent,
    Failed,
}

/// Where the job was produced. Transactional jobs (receipts, password resets)
/// bypass suppression checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobSource {
    Workflow,
    Drip,
    Broadcast,
    Transactional,
}

/// Delivery-lifecycle projection, recorded from provider webhooks once a job
/// is `Sent`. Separate from `JobStatus`; it never replaces the send state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    DeliveryDelayed,
    Bounced,
    Complained,
    Opened,
    Clicked,
}

/// One outbound message. Content is already rendered (personalized, variables
/// replaced) before it reaches the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailJob {
    pub id: Uuid,
    pub tenant_id: String,
    pub to_email: String,
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: Option<String>,
    pub reply_to: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub source: JobSource,
    pub status: JobStatus,
    pub delivery: Option<DeliveryStatus>,
    /// Incremented on every claim, including TTL reclaims of crashed cycles.
    pub attempts: u32,
    pub queued_at: u64,
    pub claimed_at: Option<u64>,
    pub sent_at: Option<u64>,
    pub failed_at: Option<u64>,
    pub delivery_updated_at: Option<u64>,
    /// Set while `Claimed`; a claim not resolved by this time is released
    /// back to `Queued` by the reclaim pass.
    pub claim_expires_at: Option<u64>,
    pub last_error: Option<String>,
    /// The provider's message ID, assigned on successful dispatch. Webhook
    /// events correlate back to the job through this.
    pub provider_message_id: Option<String>,
}

impl EmailJob {
    /// Generate a new UUIDv7 job ID (time-ordered, sortable raw bytes).
    pub fn new_id() -> Uuid {
        Uuid::now_v7()
    }

    pub fn is_transactional(&self) -> bool {
        self.source == JobSource::Transactional
    }
}
