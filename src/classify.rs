//! Utilization buckets shared by every dashboard and analytics view.
//!
//! | Bucket               | Condition                          |
//! |----------------------|------------------------------------|
//! | `Available`          | free / max > 0.7                   |
//! | `PartiallyAllocated` | 0 < free / max <= 0.7              |
//! | `FullyAllocated`     | used >= max                        |
//!
//! The ratio test runs in integers (`10 * free > 7 * max`) so the 0.7
//! boundary is exact.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Available,
    PartiallyAllocated,
    FullyAllocated,
}

impl Bucket {
    pub fn label(self) -> &'static str {
        match self {
            Bucket::Available => "available",
            Bucket::PartiallyAllocated => "partially_allocated",
            Bucket::FullyAllocated => "fully_allocated",
        }
    }
}

/// Classify `used_percent` of an engineer whose ceiling is `max_capacity`.
///
/// A zero ceiling has no room at all and counts as fully allocated.
pub fn classify(used_percent: u32, max_capacity: u32) -> Bucket {
    if max_capacity == 0 || used_percent >= max_capacity {
        return Bucket::FullyAllocated;
    }
    let free = u64::from(max_capacity - used_percent);
    if free * 10 > u64::from(max_capacity) * 7 {
        Bucket::Available
    } else {
        Bucket::PartiallyAllocated
    }
}

/// Per-bucket engineer counts (the Team Utilization chart data).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub available: usize,
    pub partially_allocated: usize,
    pub fully_allocated: usize,
}

impl BucketCounts {
    pub fn record(&mut self, bucket: Bucket) {
        match bucket {
            Bucket::Available => self.available += 1,
            Bucket::PartiallyAllocated => self.partially_allocated += 1,
            Bucket::FullyAllocated => self.fully_allocated += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.available + self.partially_allocated + self.fully_allocated
    }
}

impl FromIterator<Bucket> for BucketCounts {
    fn from_iter<I: IntoIterator<Item = Bucket>>(iter: I) -> Self {
        let mut counts = BucketCounts::default();
        for bucket in iter {
            counts.record(bucket);
        }
        counts
    }
}
