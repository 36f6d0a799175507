use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::job::EmailJob;

/// One message in a provider batch call. This is the wire shape the batch
/// endpoint accepts; it is built from an [`EmailJob`] at dispatch time.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl From<&EmailJob> for BatchEmail {
    fn from(job: &EmailJob) -> Self {
        Self {
            from: format!("{} <{}>", job.from_name, job.from_email),
            to: vec![job.to_email.clone()],
            subject: job.subject.clone(),
            html: job.html_content.clone(),
            text: job.text_content.clone(),
            reply_to: job.reply_to.clone(),
            headers: job.headers.clone(),
        }
    }
}

/// Errors from one provider batch call. Only `RateLimited` is retried, and
/// only once; everything else is terminal for the batch in this cycle.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited by provider (retry-after: {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider request timed out")]
    Timeout,

    #[error("provider rejected batch: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// The provider's batch-send endpoint, reduced to its boundary: submit up to
/// `batch_size` messages in one call, get back one provider message ID per
/// item (in input order), or one error for the whole batch. The endpoint is
/// transport-atomic; items are not partially rejected within a successful
/// call.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn send_batch(&self, batch: &[BatchEmail]) -> Result<Vec<String>, ProviderError>;
}
