use crate::error::StorageResult;
use crate::event::SuppressionEntry;
use crate::job::EmailJob;

/// Represents a single operation in an atomic write batch.
#[derive(Debug)]
pub enum WriteBatchOp {
    PutJob { key: Vec<u8>, value: Vec<u8> },
    PutQueuedMarker { key: Vec<u8> },
    DeleteQueuedMarker { key: Vec<u8> },
    PutClaimExpiry { key: Vec<u8>, job_key: Vec<u8> },
    DeleteClaimExpiry { key: Vec<u8> },
    PutProviderId { key: Vec<u8>, job_key: Vec<u8> },
    PutEvent { key: Vec<u8>, value: Vec<u8> },
    PutSuppression { key: Vec<u8>, value: Vec<u8> },
}

/// Storage trait for all persistence operations. Implementations must be
/// thread-safe, and the status-guarded transitions (`claim_job`, `mark_sent`,
/// `mark_failed`, `release_claim`) must be atomic per job: when two callers
/// race on the same job, exactly one observes the transition.
pub trait Storage: Send + Sync {
    // --- Job operations ---

    /// Store a job in the jobs CF.
    fn put_job(&self, key: &[u8], job: &EmailJob) -> StorageResult<()>;

    /// Retrieve a job by its full key.
    fn get_job(&self, key: &[u8]) -> StorageResult<Option<EmailJob>>;

    /// List jobs whose keys start with the given prefix, in key order
    /// (tenant, then enqueue time). An empty prefix lists everything.
    fn list_jobs(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, EmailJob)>>;

    /// List keys in the queued index with the given prefix, in key order.
    /// A key is present here iff the job's status is `Queued`.
    fn list_queued(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>>;

    // --- Status-guarded transitions ---

    /// Compare-and-set claim: `Queued → Claimed`. Sets `claimed_at` and
    /// `claim_expires_at`, increments `attempts`, removes the queued marker
    /// and writes the claim-expiry index entry. Returns the updated job, or
    /// `None` if the job no longer exists or is not `Queued` (claim
    /// contention is expected, not an error).
    fn claim_job(&self, key: &[u8], now_ms: u64, claim_ttl_ms: u64)
        -> StorageResult<Option<EmailJob>>;

    /// `Claimed → Sent`: sets `sent_at`, records the provider message ID and
    /// its reverse mapping, clears the claim-expiry entry. Returns `None` if
    /// the job is not `Claimed`.
    fn mark_sent(
        &self,
        key: &[u8],
        provider_message_id: &str,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>>;

    /// `{Queued | Claimed} → Failed`: sets `failed_at` and `last_error`,
    /// clears whichever index entries the previous state held. The `Queued`
    /// arm covers suppression blocks at claim time. Returns `None` if the
    /// job is already terminal or missing.
    fn mark_failed(&self, key: &[u8], error: &str, now_ms: u64)
        -> StorageResult<Option<EmailJob>>;

    /// Update the delivery projection on a `Sent` job from an asynchronous
    /// provider event. Sets `delivery` and `delivery_updated_at`. Returns
    /// `None` if the job is missing or not `Sent` (events can never resurrect
    /// a failed job).
    fn record_delivery(
        &self,
        key: &[u8],
        delivery: crate::job::DeliveryStatus,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>>;

    /// `Claimed → Queued`: releases an expired claim back to the queue,
    /// restoring the queued marker and removing the claim-expiry entry.
    /// Returns false if the job is no longer `Claimed`.
    fn release_claim(&self, job_key: &[u8], expiry_key: &[u8]) -> StorageResult<bool>;

    /// List claim-expiry entries whose keys are <= the upper-bound key,
    /// earliest first. Returns (expiry_key, job_key) pairs.
    fn list_expired_claims(&self, up_to_key: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>>;

    // --- Webhook correlation ---

    /// Look up the job key for a provider message ID.
    fn job_key_for_provider_id(&self, provider_message_id: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Record a delivery event (append-only; deterministic keys make replays
    /// overwrite their own record).
    fn put_event(&self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    // --- Suppression list ---

    /// Insert an address into a tenant's suppression list. Returns true if
    /// the entry is new, false if the address was already suppressed (no-op).
    fn insert_suppression(
        &self,
        tenant_id: &str,
        email: &str,
        entry: &SuppressionEntry,
    ) -> StorageResult<bool>;

    /// Whether an address is on a tenant's suppression list.
    fn is_suppressed(&self, tenant_id: &str, email: &str) -> StorageResult<bool>;

    // --- Batch operations ---

    /// Atomically apply a batch of write operations across column families.
    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()>;

    /// Flush the WAL so all writes are durable.
    fn flush(&self) -> StorageResult<()>;
}
