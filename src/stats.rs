//! Atomic per-run counters: a `Counter` wraps an `AtomicI64` so counts can
//! be merged across concurrent tasks without a lock.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering::Relaxed};

#[derive(Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn inc(&self) {
        self.0.fetch_add(1, Relaxed);
    }

    pub fn inc_by(&self, by: i64) {
        self.0.fetch_add(by, Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Relaxed)
    }
}

impl fmt::Debug for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// Counters for a single `Loader::update` run. Shared via `Arc` across the
/// per-source-group tasks that make up the mapped-load phase.
#[derive(Debug, Default)]
pub struct UpdateStats {
    pub num_mapped: Counter,
    pub num_unmapped: Counter,
    pub num_synonyms: Counter,
    pub num_dependent_edges: Counter,
    pub num_skipped_master_problem: Counter,

    pub num_purged_sources: Counter,
    pub num_deleted_rows: Counter,

    pub alt_allele_moved: Counter,
    pub alt_allele_deleted: Counter,
    pub alt_allele_copied: Counter,
    pub alt_allele_ignored: Counter,
    pub alt_allele_groups_without_reference: Counter,

    pub biomart_migrated: Counter,
    pub biomart_collisions_deleted: Counter,

    pub num_warnings: Counter,
}

impl fmt::Display for UpdateStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mapped={} unmapped={} synonyms={} dependent_edges={} \
             purged_sources={} deleted_rows={} \
             alt_allele(moved={} deleted={} copied={} ignored={}) \
             biomart(migrated={} collisions_deleted={}) warnings={}",
            self.num_mapped,
            self.num_unmapped,
            self.num_synonyms,
            self.num_dependent_edges,
            self.num_purged_sources,
            self.num_deleted_rows,
            self.alt_allele_moved,
            self.alt_allele_deleted,
            self.alt_allele_copied,
            self.alt_allele_ignored,
            self.biomart_migrated,
            self.biomart_collisions_deleted,
            self.num_warnings,
        )
    }
}
