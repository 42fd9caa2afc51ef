//! Per-phase `DataWarning` aggregation: logged and counted, never fatal.
//! Only the first ten examples of each kind are retained, each bucket
//! tracking its full count separately from the examples it keeps.

use crate::prelude::*;
use crate::stats::UpdateStats;

const MAX_EXAMPLES: usize = 10;

pub struct WarningBucket {
    label: &'static str,
    examples: Mutex<Vec<String>>,
    total: std::sync::atomic::AtomicUsize,
}

impl WarningBucket {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            examples: Mutex::new(Vec::with_capacity(MAX_EXAMPLES)),
            total: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn push(&self, example: impl Into<String>) {
        let prior = self
            .total
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if prior < MAX_EXAMPLES {
            self.examples.lock().unwrap().push(example.into());
        }
    }

    pub fn total(&self) -> usize {
        self.total.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Emits a single `log::warn!` summarising this bucket, and rolls the
    /// count into `stats.num_warnings`. A no-op when nothing was recorded.
    pub fn flush(&self, stats: &UpdateStats) {
        let total = self.total();
        if total == 0 {
            return;
        }
        stats.num_warnings.inc_by(total as i64);
        let examples = self.examples.lock().unwrap();
        warn!(
            "{}: {} occurrence(s), first {}: {}",
            self.label,
            total,
            examples.len(),
            examples.join(", ")
        );
    }
}
