pub mod error;
pub mod event;
pub mod intake;
pub mod job;
pub mod pipeline;
pub mod provider;
pub mod storage;
pub mod telemetry;

pub use error::{RemessaError, StorageError, StorageResult};
pub use event::{DeliveryEvent, EventType};
pub use job::{DeliveryStatus, EmailJob, JobSource, JobStatus};
pub use pipeline::{Pipeline, RemessaConfig};
pub use provider::{BatchEmail, Provider, ProviderError};
pub use storage::{RocksDbStorage, Storage, WriteBatchOp};

/// Current time as milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
