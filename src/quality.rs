//! Post-load sanity checks over the core database.

use crate::core_store::CoreStore;
use crate::model::core::{SourceWithMultipleTypes, UnlinkedEntry};
use crate::prelude::*;

pub struct QualityChecker<'a> {
    core: &'a dyn CoreStore,
}

impl<'a> QualityChecker<'a> {
    pub fn new(core: &'a dyn CoreStore) -> Self {
        Self { core }
    }

    /// Dangling `object_xref`/`identity_xref`/`dependent_xref` rows whose
    /// parent `xref` no longer exists. A non-empty result is an `Integrity`
    /// error: the load already committed bad data.
    pub async fn unlinked_entries(&self) -> Result<Vec<UnlinkedEntry>> {
        self.core.unlinked_entries().await
    }

    /// Sources still labelling more than one `ensembl_object_type` after
    /// the BiomartNormaliser ran - should always be empty; a non-empty
    /// result means the normaliser's loop exited early.
    pub async fn sources_with_multiple_types(&self) -> Result<Vec<SourceWithMultipleTypes>> {
        self.core.sources_with_multiple_types().await
    }

    pub async fn assert_clean(&self) -> Result<()> {
        let unlinked = self.unlinked_entries().await?;
        if !unlinked.is_empty() {
            return Err(LoaderError::integrity(format!(
                "{} unlinked entries found after load",
                unlinked.len()
            )));
        }
        let duplicates = self.sources_with_multiple_types().await?;
        if !duplicates.is_empty() {
            return Err(LoaderError::integrity(format!(
                "{} sources still have multiple ensembl_object_types after biomart normalisation",
                duplicates.len()
            )));
        }
        Ok(())
    }
}
