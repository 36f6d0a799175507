//! Enqueue and introspection endpoints.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use remessa_core::intake::{self, EnqueueOutcome, EnqueueRequest};
use remessa_core::{now_ms, JobSource, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct EnqueueBody {
    pub tenant_id: String,
    #[serde(default = "default_source")]
    pub source: JobSource,
    pub to_email: String,
    pub from_name: String,
    pub from_email: String,
    pub subject: String,
    pub html_content: String,
    #[serde(default)]
    pub text_content: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub headers: std::collections::HashMap<String, String>,
}

fn default_source() -> JobSource {
    JobSource::Transactional
}

pub async fn enqueue_job(
    State(state): State<AppState>,
    Json(body): Json<EnqueueBody>,
) -> Result<Response, ApiError> {
    let req = EnqueueRequest {
        tenant_id: body.tenant_id,
        source: body.source,
        to_email: body.to_email,
        from_name: body.from_name,
        from_email: body.from_email,
        subject: body.subject,
        html_content: body.html_content,
        text_content: body.text_content,
        reply_to: body.reply_to,
        headers: body.headers,
    };

    let outcome = intake::enqueue(state.storage.as_ref(), req, now_ms())?;
    let (id, status) = match outcome {
        EnqueueOutcome::Queued(id) => (id, "queued"),
        EnqueueOutcome::Blocked(id) => (id, "blocked"),
    };
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": id.to_string(), "status": status })),
    )
        .into_response())
}

#[derive(Debug, Default, Serialize)]
pub struct QueueStats {
    pub queued: usize,
    pub claimed: usize,
    pub sent: usize,
    pub failed: usize,
    pub queued_by_tenant: BTreeMap<String, usize>,
}

pub async fn queue_stats(State(state): State<AppState>) -> Result<Response, ApiError> {
    let jobs = state.storage.list_jobs(&[])?;

    let mut stats = QueueStats::default();
    for (_, job) in jobs {
        match job.status {
            JobStatus::Queued => {
                stats.queued += 1;
                *stats.queued_by_tenant.entry(job.tenant_id).or_default() += 1;
            }
            JobStatus::Claimed => stats.claimed += 1,
            JobStatus::Sent => stats.sent += 1,
            JobStatus::Failed => stats.failed += 1,
        }
    }
    Ok(Json(stats).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use remessa_core::pipeline::Metrics;
    use remessa_core::{RocksDbStorage, Storage};

    use crate::signature::WebhookVerifier;

    fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(RocksDbStorage::open(dir.path()).unwrap());
        let state = AppState {
            storage,
            metrics: Metrics::new(),
            verifier: Arc::new(WebhookVerifier::new(None)),
        };
        (state, dir)
    }

    fn body(tenant: &str, to_email: &str) -> EnqueueBody {
        EnqueueBody {
            tenant_id: tenant.to_string(),
            source: JobSource::Broadcast,
            to_email: to_email.to_string(),
            from_name: "Sender".to_string(),
            from_email: "sender@example.com".to_string(),
            subject: "Subject".to_string(),
            html_content: "<p>Body</p>".to_string(),
            text_content: None,
            reply_to: None,
            headers: Default::default(),
        }
    }

    #[tokio::test]
    async fn enqueue_accepts_and_persists() {
        let (state, _dir) = test_state();
        let response = enqueue_job(State(state.clone()), Json(body("t1", "a@b.com")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(state.storage.list_queued(&[]).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enqueue_rejects_missing_fields() {
        let (state, _dir) = test_state();
        let mut bad = body("t1", "a@b.com");
        bad.subject = String::new();
        let err = enqueue_job(State(state), Json(bad)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn stats_count_jobs_by_status_and_tenant() {
        let (state, _dir) = test_state();
        for (tenant, email) in [("t1", "a@b.com"), ("t1", "c@d.com"), ("t2", "e@f.com")] {
            enqueue_job(State(state.clone()), Json(body(tenant, email)))
                .await
                .unwrap();
        }
        let key = state.storage.list_queued(&[]).unwrap().remove(0);
        state.storage.claim_job(&key, now_ms(), 90_000).unwrap().unwrap();

        let response = queue_stats(State(state)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
