//! Keeps `unmapped_reason` populated and maps reason kinds to their row
//! ids, creating per-source threshold reasons on demand.

use crate::core_store::CoreStore;
use crate::model::staging::MappingThreshold;
use crate::model::UnmappedReasonKind;
use crate::prelude::*;
use std::collections::HashMap;

pub struct UnmappedReasonRegistry {
    fixed: HashMap<UnmappedReasonKind, i32>,
    by_source: HashMap<i32, i32>,
}

impl UnmappedReasonRegistry {
    /// Ensures all five enumerated reasons exist, then one threshold reason
    /// per `(source_id)` pair in `thresholds` (the text embeds the cutoffs,
    /// so two sources with different thresholds never collide on lookup).
    pub async fn build(core: &dyn CoreStore, thresholds: &[MappingThreshold]) -> Result<Self> {
        let mut fixed = HashMap::new();
        for kind in [
            UnmappedReasonKind::NoStableId,
            UnmappedReasonKind::FailedMap,
            UnmappedReasonKind::NoMapping,
            UnmappedReasonKind::MasterFailed,
            UnmappedReasonKind::NoMaster,
        ] {
            let id = Self::ensure(core, kind.summary(), kind.description()).await?;
            fixed.insert(kind, id);
        }

        let mut by_source = HashMap::new();
        for threshold in thresholds {
            let description = Self::threshold_description(threshold);
            let id = Self::ensure(core, "Did not meet threshold", &description).await?;
            by_source.insert(threshold.source_id, id);
        }

        Ok(Self { fixed, by_source })
    }

    async fn ensure(core: &dyn CoreStore, summary: &str, description: &str) -> Result<i32> {
        if let Some(existing) = core.find_unmapped_reason(description).await? {
            return Ok(existing.unmapped_reason_id);
        }
        core.add_unmapped_reason(summary, description).await
    }

    fn threshold_description(threshold: &MappingThreshold) -> String {
        format!(
            "Did not meet the query ({:.1}%) or target ({:.1}%) identity threshold for source {}",
            threshold.percent_query_cutoff, threshold.percent_target_cutoff, threshold.source_id
        )
    }

    pub fn reason_id(&self, kind: UnmappedReasonKind) -> Option<i32> {
        self.fixed.get(&kind).copied()
    }

    pub fn threshold_reason_id(&self, source_id: i32) -> Option<i32> {
        self.by_source.get(&source_id).copied()
    }
}
