use std::path::Path;

use parking_lot::Mutex;
use rocksdb::{
    ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded, Options, WriteBatch,
};

use crate::error::{StorageError, StorageResult};
use crate::event::SuppressionEntry;
use crate::job::{EmailJob, JobStatus};
use crate::storage::keys;
use crate::storage::traits::{Storage, WriteBatchOp};

const CF_JOBS: &str = "jobs";
const CF_QUEUED: &str = "queued";
const CF_CLAIMS: &str = "claims";
const CF_PROVIDER_IDS: &str = "provider_ids";
const CF_EVENTS: &str = "events";
const CF_SUPPRESSION: &str = "suppression";

/// All column family names (excluding `default` which RocksDB creates automatically).
const COLUMN_FAMILIES: &[&str] = &[
    CF_JOBS,
    CF_QUEUED,
    CF_CLAIMS,
    CF_PROVIDER_IDS,
    CF_EVENTS,
    CF_SUPPRESSION,
];

type DB = DBWithThreadMode<MultiThreaded>;

/// RocksDB-backed storage implementation.
///
/// Status-guarded transitions are serialized through `transition_lock`, which
/// makes the read-check-write sequence atomic per database. Racing cycle
/// invocations claiming the same job get exactly one winner.
pub struct RocksDbStorage {
    db: DB,
    transition_lock: Mutex<()>,
}

impl RocksDbStorage {
    /// Open or create a RocksDB database at the given path with all column families.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;
        Ok(Self {
            db,
            transition_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> StorageResult<std::sync::Arc<rocksdb::BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::RocksDb(format!("column family not found: {name}")))
    }

    fn scan_prefix(&self, cf_name: &str, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(cf_name)?;
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(prefix, rocksdb::Direction::Forward));
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn apply_ops(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                WriteBatchOp::PutJob { key, value } => {
                    batch.put_cf(&self.cf(CF_JOBS)?, key, value);
                }
                WriteBatchOp::PutQueuedMarker { key } => {
                    batch.put_cf(&self.cf(CF_QUEUED)?, key, []);
                }
                WriteBatchOp::DeleteQueuedMarker { key } => {
                    batch.delete_cf(&self.cf(CF_QUEUED)?, key);
                }
                WriteBatchOp::PutClaimExpiry { key, job_key } => {
                    batch.put_cf(&self.cf(CF_CLAIMS)?, key, job_key);
                }
                WriteBatchOp::DeleteClaimExpiry { key } => {
                    batch.delete_cf(&self.cf(CF_CLAIMS)?, key);
                }
                WriteBatchOp::PutProviderId { key, job_key } => {
                    batch.put_cf(&self.cf(CF_PROVIDER_IDS)?, key, job_key);
                }
                WriteBatchOp::PutEvent { key, value } => {
                    batch.put_cf(&self.cf(CF_EVENTS)?, key, value);
                }
                WriteBatchOp::PutSuppression { key, value } => {
                    batch.put_cf(&self.cf(CF_SUPPRESSION)?, key, value);
                }
            }
        }
        self.db.write(batch)?;
        Ok(())
    }

    /// Expiry-index key for a job currently holding a claim, if any.
    fn expiry_key_of(job: &EmailJob) -> Option<Vec<u8>> {
        job.claim_expires_at
            .map(|at| keys::claim_expiry_key(at, &job.tenant_id, &job.id))
    }
}

impl Storage for RocksDbStorage {
    fn put_job(&self, key: &[u8], job: &EmailJob) -> StorageResult<()> {
        let value = serde_json::to_vec(job)?;
        self.db.put_cf(&self.cf(CF_JOBS)?, key, &value)?;
        Ok(())
    }

    fn get_job(&self, key: &[u8]) -> StorageResult<Option<EmailJob>> {
        match self.db.get_cf(&self.cf(CF_JOBS)?, key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn list_jobs(&self, prefix: &[u8]) -> StorageResult<Vec<(Vec<u8>, EmailJob)>> {
        let raw = self.scan_prefix(CF_JOBS, prefix)?;
        let mut results = Vec::with_capacity(raw.len());
        for (key, value) in raw {
            let job: EmailJob = serde_json::from_slice(&value)?;
            results.push((key, job));
        }
        Ok(results)
    }

    fn list_queued(&self, prefix: &[u8]) -> StorageResult<Vec<Vec<u8>>> {
        Ok(self
            .scan_prefix(CF_QUEUED, prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    fn claim_job(
        &self,
        key: &[u8],
        now_ms: u64,
        claim_ttl_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        let _guard = self.transition_lock.lock();

        let Some(mut job) = self.get_job(key)? else {
            return Ok(None);
        };
        if job.status != JobStatus::Queued {
            return Ok(None);
        }

        let expires_at = now_ms + claim_ttl_ms;
        job.status = JobStatus::Claimed;
        job.claimed_at = Some(now_ms);
        job.claim_expires_at = Some(expires_at);
        job.attempts += 1;

        let value = serde_json::to_vec(&job)?;
        let expiry_key = keys::claim_expiry_key(expires_at, &job.tenant_id, &job.id);
        self.apply_ops(vec![
            WriteBatchOp::PutJob {
                key: key.to_vec(),
                value,
            },
            WriteBatchOp::DeleteQueuedMarker { key: key.to_vec() },
            WriteBatchOp::PutClaimExpiry {
                key: expiry_key,
                job_key: key.to_vec(),
            },
        ])?;
        Ok(Some(job))
    }

    fn mark_sent(
        &self,
        key: &[u8],
        provider_message_id: &str,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        let _guard = self.transition_lock.lock();

        let Some(mut job) = self.get_job(key)? else {
            return Ok(None);
        };
        if job.status != JobStatus::Claimed {
            return Ok(None);
        }

        let mut ops = Vec::with_capacity(3);
        if let Some(expiry_key) = Self::expiry_key_of(&job) {
            ops.push(WriteBatchOp::DeleteClaimExpiry { key: expiry_key });
        }

        job.status = JobStatus::Sent;
        job.sent_at = Some(now_ms);
        job.claim_expires_at = None;
        job.provider_message_id = Some(provider_message_id.to_string());

        let value = serde_json::to_vec(&job)?;
        ops.push(WriteBatchOp::PutJob {
            key: key.to_vec(),
            value,
        });
        ops.push(WriteBatchOp::PutProviderId {
            key: provider_message_id.as_bytes().to_vec(),
            job_key: key.to_vec(),
        });
        self.apply_ops(ops)?;
        Ok(Some(job))
    }

    fn mark_failed(
        &self,
        key: &[u8],
        error: &str,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        let _guard = self.transition_lock.lock();

        let Some(mut job) = self.get_job(key)? else {
            return Ok(None);
        };

        let mut ops = Vec::with_capacity(3);
        match job.status {
            JobStatus::Queued => {
                ops.push(WriteBatchOp::DeleteQueuedMarker { key: key.to_vec() });
            }
            JobStatus::Claimed => {
                if let Some(expiry_key) = Self::expiry_key_of(&job) {
                    ops.push(WriteBatchOp::DeleteClaimExpiry { key: expiry_key });
                }
            }
            JobStatus::Sent | JobStatus::Failed => return Ok(None),
        }

        job.status = JobStatus::Failed;
        job.failed_at = Some(now_ms);
        job.claim_expires_at = None;
        job.last_error = Some(error.to_string());

        let value = serde_json::to_vec(&job)?;
        ops.push(WriteBatchOp::PutJob {
            key: key.to_vec(),
            value,
        });
        self.apply_ops(ops)?;
        Ok(Some(job))
    }

    fn record_delivery(
        &self,
        key: &[u8],
        delivery: crate::job::DeliveryStatus,
        now_ms: u64,
    ) -> StorageResult<Option<EmailJob>> {
        let _guard = self.transition_lock.lock();

        let Some(mut job) = self.get_job(key)? else {
            return Ok(None);
        };
        if job.status != JobStatus::Sent {
            return Ok(None);
        }

        job.delivery = Some(delivery);
        job.delivery_updated_at = Some(now_ms);
        let value = serde_json::to_vec(&job)?;
        self.db.put_cf(&self.cf(CF_JOBS)?, key, &value)?;
        Ok(Some(job))
    }

    fn release_claim(&self, job_key: &[u8], expiry_key: &[u8]) -> StorageResult<bool> {
        let _guard = self.transition_lock.lock();

        let Some(mut job) = self.get_job(job_key)? else {
            // Orphaned expiry entry; clean it up.
            self.apply_ops(vec![WriteBatchOp::DeleteClaimExpiry {
                key: expiry_key.to_vec(),
            }])?;
            return Ok(false);
        };
        if job.status != JobStatus::Claimed {
            self.apply_ops(vec![WriteBatchOp::DeleteClaimExpiry {
                key: expiry_key.to_vec(),
            }])?;
            return Ok(false);
        }

        job.status = JobStatus::Queued;
        job.claimed_at = None;
        job.claim_expires_at = None;

        let value = serde_json::to_vec(&job)?;
        self.apply_ops(vec![
            WriteBatchOp::PutJob {
                key: job_key.to_vec(),
                value,
            },
            WriteBatchOp::PutQueuedMarker {
                key: job_key.to_vec(),
            },
            WriteBatchOp::DeleteClaimExpiry {
                key: expiry_key.to_vec(),
            },
        ])?;
        Ok(true)
    }

    fn list_expired_claims(&self, up_to_key: &[u8]) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(CF_CLAIMS)?;
        let iter = self.db.iterator_cf(&cf, IteratorMode::Start);
        let mut results = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if key.as_ref() > up_to_key {
                break;
            }
            results.push((key.to_vec(), value.to_vec()));
        }
        Ok(results)
    }

    fn job_key_for_provider_id(&self, provider_message_id: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self
            .db
            .get_cf(&self.cf(CF_PROVIDER_IDS)?, provider_message_id.as_bytes())?)
    }

    fn put_event(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.db.put_cf(&self.cf(CF_EVENTS)?, key, value)?;
        Ok(())
    }

    fn insert_suppression(
        &self,
        tenant_id: &str,
        email: &str,
        entry: &SuppressionEntry,
    ) -> StorageResult<bool> {
        let _guard = self.transition_lock.lock();

        let key = keys::suppression_key(tenant_id, email);
        let cf = self.cf(CF_SUPPRESSION)?;
        if self.db.get_cf(&cf, &key)?.is_some() {
            return Ok(false);
        }
        let value = serde_json::to_vec(entry)?;
        self.db.put_cf(&cf, &key, &value)?;
        Ok(true)
    }

    fn is_suppressed(&self, tenant_id: &str, email: &str) -> StorageResult<bool> {
        let key = keys::suppression_key(tenant_id, email);
        Ok(self.db.get_cf(&self.cf(CF_SUPPRESSION)?, &key)?.is_some())
    }

    fn write_batch(&self, ops: Vec<WriteBatchOp>) -> StorageResult<()> {
        self.apply_ops(ops)
    }

    fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}
