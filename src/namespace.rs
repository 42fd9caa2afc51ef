//! Decides which staging sources this run is allowed to touch.

use crate::model::staging::Source;
use crate::prelude::*;
use std::collections::BTreeSet;

/// Sources whose name ends in this suffix are intentionally excluded from
/// the transfer even when a matching `external_db` exists in core.
const SUPPRESS_SUFFIX: &str = "notransfer";

/// Sources that only ever label genes, never transcripts/translations.
/// Curated rather than inferred, because a source with zero xrefs loaded
/// so far gives no evidence either way.
const GENE_SPECIFIC_SOURCES: &[&str] = &[
    "HGNC",
    "MGI",
    "miRBase",
    "RFAM",
    "WikiGene",
    "EntrezGene",
];

#[derive(Debug, Default)]
pub struct NamespaceResolver {
    pub transferable: BTreeSet<String>,
    pub suppressed: BTreeSet<String>,
    pub rejected: BTreeSet<String>,
    pub gene_specific: BTreeSet<String>,
}

impl NamespaceResolver {
    /// `core_db_names` is the set of `external_db.db_name` already present
    /// in the core database; `staging_sources` is every row in
    /// `staging.source`.
    pub fn resolve(staging_sources: &[Source], core_db_names: &BTreeSet<String>) -> Self {
        let mut transferable = BTreeSet::new();
        let mut suppressed = BTreeSet::new();
        let mut rejected = BTreeSet::new();

        for source in staging_sources {
            if source.name.ends_with(SUPPRESS_SUFFIX) {
                suppressed.insert(source.name.clone());
                continue;
            }
            if core_db_names.contains(&source.name) {
                transferable.insert(source.name.clone());
            } else {
                rejected.insert(source.name.clone());
            }
        }

        let gene_specific = GENE_SPECIFIC_SOURCES
            .iter()
            .map(|s| s.to_string())
            .filter(|name| transferable.contains(name))
            .collect();

        Self {
            transferable,
            suppressed,
            rejected,
            gene_specific,
        }
    }

    pub fn is_transferable(&self, source_name: &str) -> bool {
        self.transferable.contains(source_name)
    }

    pub fn is_gene_specific(&self, source_name: &str) -> bool {
        self.gene_specific.contains(source_name)
    }

    /// Fails loudly when a source named in `required` is missing from
    /// `external_db`.
    pub fn require_present(&self, required: &[&str]) -> Result<()> {
        for name in required {
            if self.rejected.contains(*name) {
                return Err(LoaderError::config(format!(
                    "source '{name}' has no matching external_db in the core database"
                )));
            }
        }
        Ok(())
    }
}
