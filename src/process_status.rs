//! Append-only audit log of which phase of a run last completed, so a
//! restarted run knows where to resume.

use crate::model::staging::ProcessStatusRow;
use crate::staging_store::StagingStore;
use crate::prelude::*;

/// Every phase name this loader appends, in the order a clean run emits
/// them. Any other string found in the table belongs to a different tool
/// sharing the same log and is ignored.
pub const KNOWN_PHASES: &[&str] = &[
    "parsing_finished",
    "mapping_finished",
    "alt_alleles_added",
    "alt_alleles_processed",
    "biomart_test_finished",
    "source_level_move_finished",
    "core_loaded",
];

pub struct ProcessStatusMachine<'a> {
    staging: &'a dyn StagingStore,
}

impl<'a> ProcessStatusMachine<'a> {
    pub fn new(staging: &'a dyn StagingStore) -> Self {
        Self { staging }
    }

    pub async fn record(&self, phase: &str) -> Result<()> {
        if !KNOWN_PHASES.contains(&phase) {
            return Err(LoaderError::config(format!("unknown process_status phase '{phase}'")));
        }
        self.staging.insert_process_status(phase).await
    }

    pub async fn latest(&self) -> Result<Option<ProcessStatusRow>> {
        self.staging.latest_process_status().await
    }

    /// Whether the last recorded phase is at or past `phase` in
    /// `KNOWN_PHASES` order - used to decide whether a resumed run can skip
    /// straight to mapping instead of re-parsing.
    pub async fn reached(&self, phase: &str) -> Result<bool> {
        let Some(target_idx) = KNOWN_PHASES.iter().position(|p| *p == phase) else {
            return Err(LoaderError::config(format!("unknown process_status phase '{phase}'")));
        };
        let Some(latest) = self.latest().await? else {
            return Ok(false);
        };
        let Some(latest_idx) = KNOWN_PHASES.iter().position(|p| *p == latest.status) else {
            return Ok(false);
        };
        Ok(latest_idx >= target_idx)
    }

    /// Re-appends `parsing_finished`, discarding (logically - the log is
    /// append-only) any alt-allele/biomart/mapping progress recorded after
    /// it. Used when a run is restarted after a failure in the mapped/
    /// unmapped load phase.
    pub async fn revert_to_parsing_finished(&self) -> Result<()> {
        self.record("parsing_finished").await
    }

    /// Re-appends `mapping_finished`, the point a failed alt-allele/biomart/
    /// QC phase restarts from.
    pub async fn revert_to_mapping_finished(&self) -> Result<()> {
        self.record("mapping_finished").await
    }
}
