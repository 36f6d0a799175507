//! Key encoding for RocksDB column families.
//!
//! All numeric values use big-endian encoding for correct lexicographic
//! ordering. Composite keys use `:` (0x3A) as separator. Variable-length
//! strings are length-prefixed with a big-endian u16.

const SEPARATOR: u8 = b':';

/// Longest string accepted as a key component. Tenant IDs, email addresses,
/// provider message IDs, and event timestamps all fit comfortably; anything
/// larger is rejected at the intake and webhook boundaries before it reaches
/// key construction.
pub const MAX_COMPONENT_LEN: usize = 512;

/// Encode a u64 as 8 big-endian bytes.
fn encode_u64(val: u64) -> [u8; 8] {
    val.to_be_bytes()
}

/// Encode a variable-length string with a 2-byte big-endian length prefix.
/// Input longer than the prefix can carry is clamped to `u16::MAX` bytes;
/// boundary validation against [`MAX_COMPONENT_LEN`] keeps real keys far
/// below that.
fn encode_string(s: &str) -> Vec<u8> {
    let len = s.len().min(u16::MAX as usize);
    let mut buf = Vec::with_capacity(2 + len);
    buf.extend_from_slice(&(len as u16).to_be_bytes());
    buf.extend_from_slice(&s.as_bytes()[..len]);
    buf
}

/// Build a job key: `{tenant_id}:{queued_at_ms}:{job_id}`
///
/// Key layout (binary):
/// - length-prefixed tenant_id
/// - separator
/// - 8-byte big-endian enqueue timestamp (ms)
/// - separator
/// - 16-byte UUID (raw bytes, lexicographically sortable for UUIDv7)
///
/// Tenant-first layout groups each tenant's jobs; timestamp-second preserves
/// queue order within a tenant.
pub fn job_key(tenant_id: &str, queued_at_ms: u64, job_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(64);
    key.extend_from_slice(&encode_string(tenant_id));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_u64(queued_at_ms));
    key.push(SEPARATOR);
    key.extend_from_slice(job_id.as_bytes());
    key
}

/// Build a prefix for iterating all jobs of a tenant.
pub fn tenant_prefix(tenant_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(32);
    prefix.extend_from_slice(&encode_string(tenant_id));
    prefix.push(SEPARATOR);
    prefix
}

/// Extract the tenant ID back out of a job (or queued-index) key.
pub fn parse_tenant(key: &[u8]) -> Option<String> {
    if key.len() < 2 {
        return None;
    }
    let len = u16::from_be_bytes([key[0], key[1]]) as usize;
    if key.len() < 2 + len {
        return None;
    }
    String::from_utf8(key[2..2 + len].to_vec()).ok()
}

/// Build a claim expiry key: `{claim_expires_at_ms}:{tenant_id}:{job_id}`
///
/// Timestamp-first layout enables efficient "scan from earliest expiry"
/// iteration. The claims CF stores the job key as the value, so no reverse
/// lookup is needed on reclaim.
pub fn claim_expiry_key(expires_at_ms: u64, tenant_id: &str, job_id: &uuid::Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(&encode_u64(expires_at_ms));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_string(tenant_id));
    key.push(SEPARATOR);
    key.extend_from_slice(job_id.as_bytes());
    key
}

/// Upper-bound key for scanning all claim expiries at or before `now_ms`.
/// 0xFF padding after the timestamp sorts after any real key at that instant.
pub fn claim_expiry_upper_bound(now_ms: u64) -> Vec<u8> {
    let mut up_to = Vec::with_capacity(40);
    up_to.extend_from_slice(&encode_u64(now_ms));
    up_to.extend_from_slice(&[0xFF; 32]);
    up_to
}

/// Build an event key: `{provider_msg_id}:{event_type}:{created_at}`
///
/// Deterministic over the event payload, so a replayed webhook overwrites
/// its own record instead of double-counting.
pub fn event_key(provider_msg_id: &str, event_type: &str, created_at: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(64);
    key.extend_from_slice(&encode_string(provider_msg_id));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_string(event_type));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_string(created_at));
    key
}

/// Build a suppression key: `{tenant_id}:{email}` with the address lowercased,
/// so lookups are case-insensitive.
pub fn suppression_key(tenant_id: &str, email: &str) -> Vec<u8> {
    let email = email.trim().to_lowercase();
    let mut key = Vec::with_capacity(48);
    key.extend_from_slice(&encode_string(tenant_id));
    key.push(SEPARATOR);
    key.extend_from_slice(&encode_string(&email));
    key
}
