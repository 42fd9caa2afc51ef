//! Propagates gene-specific xrefs across an alt-allele group onto a
//! single elected reference gene.

use crate::core_store::CoreStore;
use crate::model::staging::AltAlleleRow;
use crate::prelude::*;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, Copy)]
pub struct AltAlleleCounts {
    pub moved: u64,
    pub deleted: u64,
    pub copied: u64,
    pub ignored: u64,
    pub groups_without_reference: u64,
}

/// One resolved alt-allele group: a reference gene and the alternate genes
/// whose gene-specific xrefs must be merged onto it.
#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub reference_gene_id: i64,
    pub alt_gene_ids: Vec<i64>,
}

pub struct AltAlleleResolver;

impl AltAlleleResolver {
    /// Builds the reference/alt grouping from raw `alt_allele` rows plus the
    /// LRG gene pairs, which are folded in as pseudo-groups of size two
    ///.
    pub fn resolve_groups(
        alt_allele_rows: &[AltAlleleRow],
        lrg_pairs: &[(i64, i64)],
    ) -> (Vec<ResolvedGroup>, AltAlleleCounts) {
        let mut counts = AltAlleleCounts::default();
        let mut by_group: HashMap<i32, Vec<AltAlleleRow>> = HashMap::new();
        for row in alt_allele_rows {
            by_group.entry(row.group_id).or_default().push(row.clone());
        }

        let mut groups = Vec::new();
        for members in by_group.into_values() {
            match Self::elect_reference(&members) {
                Some(reference_gene_id) => {
                    let alt_gene_ids = members
                        .iter()
                        .map(|m| m.gene_id)
                        .filter(|id| *id != reference_gene_id)
                        .collect();
                    groups.push(ResolvedGroup {
                        reference_gene_id,
                        alt_gene_ids,
                    });
                }
                None => {
                    counts.groups_without_reference += 1;
                }
            }
        }

        for (lrg_gene_id, ensembl_gene_id) in lrg_pairs {
            groups.push(ResolvedGroup {
                reference_gene_id: *ensembl_gene_id,
                alt_gene_ids: vec![*lrg_gene_id],
            });
        }

        (groups, counts)
    }

    /// Explicit `is_reference` wins; absent that, the first member in
    /// `gene_id` order stands in as reference rather than dropping the
    /// whole group.
    fn elect_reference(members: &[AltAlleleRow]) -> Option<i64> {
        if members.is_empty() {
            return None;
        }
        members
            .iter()
            .find(|m| m.is_reference)
            .or_else(|| members.iter().min_by_key(|m| m.gene_id))
            .map(|m| m.gene_id)
    }

    /// Applies one resolved group against the core database: every
    /// gene-specific object_xref attached to an alt gene is moved onto the
    /// reference gene, unless the reference already carries an equivalent
    /// xref (same source+accession), in which case the move is skipped
    /// rather than attempted. Once the reference gene carries the full
    /// merged set, every gene-specific xref on it is copied back out to
    /// every other allele in the group.
    pub async fn apply_group(
        core: &dyn CoreStore,
        group: &ResolvedGroup,
        gene_specific_sources: &[String],
        counts: &mut AltAlleleCounts,
    ) -> Result<()> {
        let alt_object_xrefs = core
            .genes_for_alt_allele_move(&group.alt_gene_ids, gene_specific_sources)
            .await?;
        let reference_object_xrefs = core
            .genes_for_alt_allele_move(&[group.reference_gene_id], gene_specific_sources)
            .await?;
        let mut reference_keys: HashSet<(i32, String)> = reference_object_xrefs
            .iter()
            .map(|x| (x.external_db_id, x.accession.clone()))
            .collect();

        for entry in alt_object_xrefs {
            let key = (entry.external_db_id, entry.accession.clone());
            if reference_keys.contains(&key) {
                counts.ignored += 1;
                continue;
            }
            core.move_object_xref_gene(entry.object_xref_id, group.reference_gene_id)
                .await?;
            reference_keys.insert(key);
            counts.moved += 1;
        }

        let reference_object_xrefs = core
            .genes_for_alt_allele_move(&[group.reference_gene_id], gene_specific_sources)
            .await?;
        for alt_gene_id in &group.alt_gene_ids {
            for entry in &reference_object_xrefs {
                core.copy_object_xref(entry.object_xref_id, *alt_gene_id)
                    .await?;
                counts.copied += 1;
            }
        }
        Ok(())
    }
}
