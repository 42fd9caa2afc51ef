//! Id-space remapping so staging-side ids never collide with ids
//! already present in the core database.

use crate::core_store::CoreStore;
use crate::model::core::Offsets;
use crate::prelude::*;

pub struct OffsetAllocator {
    offsets: Offsets,
}

impl OffsetAllocator {
    pub async fn compute(core: &dyn CoreStore) -> Result<Self> {
        let offsets = core.offsets().await?;
        Ok(Self { offsets })
    }

    pub fn offsets(&self) -> Offsets {
        self.offsets
    }

    /// Remaps a staging `xref_id` into the core id space it will occupy
    /// once written.
    pub fn remap_xref(&self, staging_xref_id: i64) -> i64 {
        staging_xref_id + self.offsets.xref_offset
    }

    pub fn remap_object_xref(&self, staging_object_xref_id: i64) -> i64 {
        staging_object_xref_id + self.offsets.object_xref_offset
    }
}
