//! Pure partitioning of claimed jobs into provider-sized batches.

use super::claimer::ClaimedJob;

/// Split claimed jobs into batches of at most `batch_size`, preserving claim
/// order. The final batch holds the remainder. `batch_size` of zero yields no
/// batches rather than looping forever.
pub fn partition(jobs: Vec<ClaimedJob>, batch_size: usize) -> Vec<Vec<ClaimedJob>> {
    if batch_size == 0 || jobs.is_empty() {
        return Vec::new();
    }
    let mut batches = Vec::with_capacity(jobs.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size.min(jobs.len()));
    for job in jobs {
        current.push(job);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
