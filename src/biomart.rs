//! Collapses a source that has, incorrectly, labelled xrefs against more
//! than one `ensembl_object_type` down to a single type so BioMart's
//! single-type-per-source assumption holds.

use crate::core_store::CoreStore;
use crate::model::EnsemblObjectType;
use crate::prelude::*;
use std::collections::HashMap;

/// Sources that collapse to Translation even though Gene would otherwise
/// win by rank, because GO/goslim_goa annotation is defined at the protein
/// level.
const FORCE_TRANSLATION_SOURCES: &[&str] = &["GO", "goslim_goa"];

#[derive(Debug, Default, Clone, Copy)]
pub struct BiomartCounts {
    pub migrated: u64,
    pub collisions_deleted: u64,
}

pub struct BiomartNormaliser;

impl BiomartNormaliser {
    /// Runs until `CoreStore::sources_with_multiple_types` comes back empty;
    /// each pass collapses one source's types and may create a dangling
    /// duplicate `(xref_id, new_type, ensembl_id)` that must be deleted
    /// rather than retyped.
    pub async fn normalise(core: &dyn CoreStore) -> Result<BiomartCounts> {
        let mut counts = BiomartCounts::default();
        loop {
            let offenders = core.sources_with_multiple_types().await?;
            if offenders.is_empty() {
                break;
            }
            for offender in offenders {
                let rows = core
                    .object_xrefs_for_external_db(offender.external_db_id)
                    .await?;
                let target_type = Self::target_type(&offender.db_name, &rows);

                let mut seen: HashMap<i64, i64> = HashMap::new();
                let mut to_retype = Vec::new();
                let mut to_delete = Vec::new();
                for (object_xref_id, xref_id, object_type) in rows {
                    if object_type == target_type {
                        seen.insert(xref_id, object_xref_id);
                        continue;
                    }
                    if seen.contains_key(&xref_id) {
                        to_delete.push(object_xref_id);
                    } else {
                        seen.insert(xref_id, object_xref_id);
                        to_retype.push(object_xref_id);
                    }
                }

                if !to_retype.is_empty() {
                    core.retype_object_xrefs(&to_retype, target_type).await?;
                    counts.migrated += to_retype.len() as u64;
                }
                if !to_delete.is_empty() {
                    let deleted = core.delete_object_xrefs(&to_delete).await?;
                    counts.collisions_deleted += deleted;
                }
            }
        }
        Ok(counts)
    }

    fn target_type(db_name: &str, rows: &[(i64, i64, EnsemblObjectType)]) -> EnsemblObjectType {
        if FORCE_TRANSLATION_SOURCES.contains(&db_name) {
            return EnsemblObjectType::Translation;
        }
        rows.iter()
            .map(|(_, _, t)| *t)
            .reduce(EnsemblObjectType::collapse)
            .unwrap_or(EnsemblObjectType::Gene)
    }
}
