//! Shared fixtures for pipeline tests: a scriptable provider, a storage
//! wrapper that injects failures, and enqueue helpers.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::event::SuppressionEntry;
use crate::intake::{self, EnqueueRequest};
use crate::job::{DeliveryStatus, EmailJob, JobSource};
use crate::pipeline::{Pipeline, RemessaConfig};
use crate::provider::{BatchEmail, Provider, ProviderError};
use crate::storage::{RocksDbStorage, Storage, WriteBatchOp};

pub fn test_storage() -> (Arc<RocksDbStorage>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = RocksDbStorage::open(dir.path()).unwrap();
    (Arc::new(storage), dir)
}

pub fn request(tenant: &str, to_email: &str, source: JobSource) -> EnqueueRequest {
    EnqueueRequest {
        tenant_id: tenant.to_string(),
        source,
        to_email: to_email.to_string(),
        from_name: "Sender".to_string(),
        from_email: "sender@example.com".to_string(),
        subject: "Subject".to_string(),
        html_content: "<p>Body</p>".to_string(),
        text_content: None,
        reply_to: None,
        headers: HashMap::new(),
    }
}

/// Enqueue `n` broadcast jobs for a tenant with strictly increasing
/// timestamps, so queue order within the tenant is deterministic.
pub fn enqueue_n(storage: &dyn Storage, tenant: &str, n: usize, base_ms: u64) {
    for i in 0..n {
        let req = request(tenant, &format!("user{i}@example.com"), JobSource::Broadcast);
        intake::enqueue(storage, req, base_ms + i as u64).unwrap();
    }
}

pub fn test_pipeline(storage: Arc<RocksDbStorage>, provider: Arc<MockProvider>) -> Pipeline {
    Pipeline::new(storage, provider, RemessaConfig::default())
}

pub fn pipeline_with(
    storage: Arc<RocksDbStorage>,
    provider: Arc<MockProvider>,
    config: RemessaConfig,
) -> Pipeline {
    Pipeline::new(storage, provider, config)
}

/// Provider double. Scripted outcomes are consumed front to back, one per
/// call; once the script runs dry every call succeeds. Batch sizes and call
/// instants are recorded for pacing assertions.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<(), ProviderError>>>,
    next_id: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
    pub call_times: Mutex<Vec<tokio::time::Instant>>,
}

impl MockProvider {
    pub fn ok() -> Arc<Self> {
        Self::scripted(Vec::new())
    }

    pub fn scripted(outcomes: Vec<Result<(), ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(outcomes.into()),
            next_id: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
            call_times: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.batch_sizes.lock().len()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn send_batch(&self, batch: &[BatchEmail]) -> Result<Vec<String>, ProviderError> {
        self.batch_sizes.lock().push(batch.len());
        self.call_times.lock().push(tokio::time::Instant::now());
        if let Some(outcome) = self.script.lock().pop_front() {
            outcome?;
        }
        Ok(batch
            .iter()
            .map(|_| format!("msg_{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
            .collect())
    }
}

/// Storage wrapper that fails `list_queued` for one tenant's prefix, to
/// exercise per-tenant isolation in the claim phase.
pub struct FailingStorage {
    inner: Arc<RocksDbStorage>,
    fail_prefix: Vec<u8>,
}

impl FailingStorage {
    pub fn new(inner: Arc<RocksDbStorage>, fail_prefix: Vec<u8>) -> Self {
        Self { inner, fail_prefix }
    }
}

impl Storage for FailingStorage {
    fn put_job(&self, key: &[u8], job: &EmailJob) -> StorageResult<()> {
        self.inner.put_job(key, job)
    }

    fn get_job(&self, key: &[u8]) -> StorageResult<Option<EmailJob>> {
        self.inner.get_job(key)
    }

    fn list_jobs(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, EmailJob)>> {
        self.inner.list_jobs(prefix)
    }

    fn list_queued(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        if !prefix.is_empty() && prefix == self.fail_prefix.as_slice() {
            return Err(StorageError::RocksDb("injected fault".to_string()));
        }
        self.inner.list_queued(prefix)
    }

    fn claim_job(
        &self,
        key: &[u8],
        now_ms: u64,
        claim_ttl_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        self.inner.claim_job(key, now_ms, claim_ttl_ms)
    }

    fn mark_sent(
        &self,
        key: &[u8],
        provider_message_id: &str,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        self.inner.mark_sent(key, provider_message_id, now_ms)
    }

    fn mark_failed(&self, key: &[u8], error: &str, now_ms: u64)
        -> StorageResult<Option<EmailJob>> {
        self.inner.mark_failed(key, error, now_ms)
    }

    fn record_delivery(
        &self,
        key: &[u8],
        delivery: DeliveryStatus,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        self.inner.record_delivery(key, delivery, now_ms)
    }

    fn release_claim(&self, job_key: &[u8], expiry_key: &[u8]) -> StorageResult<bool> {
        self.inner.release_claim(job_key, expiry_key)
    }

    fn list_expired_claims(&self, up_to_key: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.list_expired_claims(up_to_key)
    }

    fn job_key_for_provider_id(&self, provider_message_id: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.job_key_for_provider_id(provider_message_id)
    }

    fn put_event(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.inner.put_event(key, value)
    }

    fn insert_suppression(
        &self,
        tenant_id: &str,
        email: &str,
        entry: &SuppressionEntry,
    ) -> StorageResult<bool> {
        self.inner.insert_suppression(tenant_id, email, entry)
    }

    fn is_suppressed(&self, tenant_id: &str, email: &str) -> StorageResult<bool> {
        self.inner.is_suppressed(tenant_id, email)
    }

    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        self.inner.write_batch(ops)
    }

    fn flush(&self) -> StorageResult<()> {
        self.inner.flush()
    }
}
