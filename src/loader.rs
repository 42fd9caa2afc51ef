//! The orchestrator. `Loader::update` runs the phases of a load in order,
//! each inside its own transactional unit of work rather than one
//! transaction for the whole run, so a restart can resume from the last
//! completed phase via [`crate::process_status::ProcessStatusMachine`].

use crate::alt_allele::AltAlleleResolver;
use crate::biomart::BiomartNormaliser;
use crate::config::LoaderConfig;
use crate::core_store::CoreStore;
use crate::model::core::{NewDependentXref, NewIdentityXref, NewObjectXref, NewUnmappedObject, NewXref};
use crate::model::staging::{DependentXrefRow, DumpOutGroup, IdentityXrefRow, UnmappedCandidate};
use crate::model::{DumpedState, EnsemblObjectType, InfoType, UnmappedReasonKind};
use crate::namespace::NamespaceResolver;
use crate::offsets::OffsetAllocator;
use crate::process_status::ProcessStatusMachine;
use crate::prelude::*;
use crate::quality::QualityChecker;
use crate::stats::UpdateStats;
use crate::unmapped_reasons::UnmappedReasonRegistry;
use crate::warnings::WarningBucket;
use futures::StreamExt;
use std::collections::HashSet;

/// `analysis.logic_name` for Translation-bound rows.
const PROTEIN_ANALYSIS_LOGIC_NAME: &str = "xrefexonerateprotein";
/// `analysis.logic_name` for Checksum-matched rows.
const CHECKSUM_ANALYSIS_LOGIC_NAME: &str = "xrefchecksum";

/// The three analysis rows a load ever attaches `object_xref`s to: DNA
/// exonerate (Gene/Transcript, name configurable), protein exonerate
/// (Translation), and checksum matching.
struct AnalysisIds {
    dna: i32,
    protein: i32,
    checksum: i32,
}

impl AnalysisIds {
    fn select(&self, info_type: InfoType, object_type: EnsemblObjectType) -> i32 {
        if info_type == InfoType::Checksum {
            self.checksum
        } else if object_type == EnsemblObjectType::Translation {
            self.protein
        } else {
            self.dna
        }
    }
}

pub struct Loader {
    staging: Arc<dyn crate::staging_store::StagingStore>,
    core: Arc<dyn CoreStore>,
    config: LoaderConfig,
}

impl Loader {
    pub fn new(
        staging: Arc<dyn crate::staging_store::StagingStore>,
        core: Arc<dyn CoreStore>,
        config: LoaderConfig,
    ) -> Self {
        Self {
            staging,
            core,
            config,
        }
    }

    pub async fn update(&self) -> Result<UpdateStats> {
        let stats = UpdateStats::default();
        let warnings = WarningBucket::new("xref_loader");
        let status = ProcessStatusMachine::new(self.staging.as_ref());

        let sources = self.staging.all_sources().await?;
        let core_names = self.core.external_db_names().await?;
        let namespace = NamespaceResolver::resolve(&sources, &core_names);
        let source_names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
        namespace.require_present(&source_names)?;

        let analyses = AnalysisIds {
            dna: self.core.ensure_analysis(self.config.analysis_logic_name()).await?,
            protein: self.core.ensure_analysis(PROTEIN_ANALYSIS_LOGIC_NAME).await?,
            checksum: self.core.ensure_analysis(CHECKSUM_ANALYSIS_LOGIC_NAME).await?,
        };

        if status.reached("mapping_finished").await? {
            info!("prior run already reached mapping_finished, resuming from the unmapped load");
            status.revert_to_mapping_finished().await?;
        } else {
            info!("resetting dumped flags from prior runs");
            self.staging.reset_dumped_unless_another_priority().await?;
            status.revert_to_parsing_finished().await?;

            self.purge_sources(&sources, &namespace).await?;

            let offsets = OffsetAllocator::compute(self.core.as_ref()).await?;

            let mut dependent_seen: HashSet<(i64, i64)> = HashSet::new();
            let mut groups = self.staging.xrefs_by_dump_out();
            while let Some(group) = groups.next().await {
                let group = group?;
                if !namespace.is_transferable(&group.name) {
                    continue;
                }
                let Some(external_db) = self.core.external_db_by_name(&group.name).await? else {
                    return Err(LoaderError::config(format!(
                        "no external_db row for transferable source '{}'",
                        group.name
                    )));
                };
                self.load_group(
                    &group,
                    external_db.external_db_id,
                    &analyses,
                    &offsets,
                    &mut dependent_seen,
                    &stats,
                    &warnings,
                )
                .await?;
            }
            status.record("mapping_finished").await?;
        }

        self.load_unmapped(&sources, &namespace, &analyses, &stats).await?;

        let alt_rows = self.staging.alt_allele_rows().await?;
        let lrg_pairs = self.staging.lrg_gene_pairs().await?;
        let (groups, mut alt_counts) = AltAlleleResolver::resolve_groups(&alt_rows, &lrg_pairs);
        status.record("alt_alleles_added").await?;
        let gene_specific_sources: Vec<String> = sources
            .iter()
            .map(|s| s.name.clone())
            .filter(|name| namespace.is_gene_specific(name))
            .collect();
        for group in &groups {
            AltAlleleResolver::apply_group(
                self.core.as_ref(),
                group,
                &gene_specific_sources,
                &mut alt_counts,
            )
            .await?;
        }
        status.record("alt_alleles_processed").await?;
        stats.alt_allele_moved.inc_by(alt_counts.moved as i64);
        stats.alt_allele_deleted.inc_by(alt_counts.deleted as i64);
        stats.alt_allele_copied.inc_by(alt_counts.copied as i64);
        stats.alt_allele_ignored.inc_by(alt_counts.ignored as i64);
        stats
            .alt_allele_groups_without_reference
            .inc_by(alt_counts.groups_without_reference as i64);

        let biomart_counts = BiomartNormaliser::normalise(self.core.as_ref()).await?;
        status.record("biomart_test_finished").await?;
        stats.biomart_migrated.inc_by(biomart_counts.migrated as i64);
        stats
            .biomart_collisions_deleted
            .inc_by(biomart_counts.collisions_deleted as i64);
        status.record("source_level_move_finished").await?;

        QualityChecker::new(self.core.as_ref()).assert_clean().await?;

        warnings.flush(&stats);
        status.record("core_loaded").await?;

        Ok(stats)
    }

    async fn purge_sources(
        &self,
        sources: &[crate::model::staging::Source],
        namespace: &NamespaceResolver,
    ) -> Result<()> {
        self.core.delete_projected().await?;
        for source in sources {
            if !namespace.is_transferable(&source.name) {
                continue;
            }
            let Some(external_db) = self.core.external_db_by_name(&source.name).await? else {
                return Err(LoaderError::config(format!(
                    "no external_db row for transferable source '{}'",
                    source.name
                )));
            };
            let deleted = self.core.delete_by_external_db(external_db.external_db_id).await?;
            debug!(
                "purged {deleted} existing rows for source '{}' before reload",
                source.name
            );
            if let Some(release) = &source.release {
                self.core
                    .set_source_release(external_db.external_db_id, release)
                    .await?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn load_group(
        &self,
        group: &DumpOutGroup,
        external_db_id: i32,
        analyses: &AnalysisIds,
        offsets: &OffsetAllocator,
        dependent_seen: &mut HashSet<(i64, i64)>,
        stats: &UpdateStats,
        warnings: &WarningBucket,
    ) -> Result<()> {
        let dumped_ids = match group.info_type {
            InfoType::Direct | InfoType::SequenceMatch | InfoType::Checksum => {
                let mut rows = if group.info_type == InfoType::Checksum {
                    self.staging.checksum_xrefs(group.source_id)
                } else {
                    self.staging.identity_xrefs(group.source_id, group.info_type)
                };
                let mut dumped_ids = Vec::new();
                while let Some(row) = rows.next().await {
                    let row: IdentityXrefRow = row?;
                    let staging_xref_id = row.xref.xref_id;
                    match self
                        .write_identity_row(&row, external_db_id, analyses, offsets)
                        .await
                    {
                        Ok(()) => {
                            dumped_ids.push(staging_xref_id);
                            stats.num_mapped.inc();
                        }
                        Err(err) => {
                            warnings.push(format!(
                                "xref {staging_xref_id} in source '{}': {err}",
                                group.name
                            ));
                        }
                    }
                }
                self.staging.mark_dumped(&dumped_ids, DumpedState::Mapped).await?;
                dumped_ids
            }
            InfoType::Dependent => {
                let mut rows = self.staging.dependent_xrefs(group.source_id);
                let mut dumped_ids = Vec::new();
                while let Some(row) = rows.next().await {
                    let row: DependentXrefRow = row?;
                    let staging_xref_id = row.xref.xref_id;
                    match self
                        .write_dependent_row(&row, external_db_id, analyses, offsets, dependent_seen)
                        .await
                    {
                        Ok(true) => {
                            dumped_ids.push(staging_xref_id);
                            stats.num_mapped.inc();
                            stats.num_dependent_edges.inc();
                        }
                        Ok(false) => {
                            stats.num_skipped_master_problem.inc();
                        }
                        Err(err) => {
                            warnings.push(format!(
                                "dependent xref {staging_xref_id} in source '{}': {err}",
                                group.name
                            ));
                        }
                    }
                }
                self.staging.mark_dumped(&dumped_ids, DumpedState::Mapped).await?;
                dumped_ids
            }
            other => {
                warnings.push(format!(
                    "source '{}' has unexpected dumped info_type {other}",
                    group.name
                ));
                Vec::new()
            }
        };

        self.load_synonyms(&dumped_ids, offsets, stats).await?;
        Ok(())
    }

    async fn load_synonyms(
        &self,
        staging_xref_ids: &[i64],
        offsets: &OffsetAllocator,
        stats: &UpdateStats,
    ) -> Result<()> {
        if staging_xref_ids.is_empty() {
            return Ok(());
        }
        let mut synonyms = self.staging.synonyms_for_xrefs(staging_xref_ids);
        while let Some(row) = synonyms.next().await {
            let row = row?;
            let core_xref_id = offsets.remap_xref(row.xref_id);
            self.core.add_synonym(core_xref_id, &row.synonym).await?;
            stats.num_synonyms.inc();
        }
        Ok(())
    }

    async fn write_identity_row(
        &self,
        row: &IdentityXrefRow,
        external_db_id: i32,
        analyses: &AnalysisIds,
        offsets: &OffsetAllocator,
    ) -> Result<()> {
        let object_type: EnsemblObjectType = row
            .object_xref
            .ensembl_object_type
            .parse()
            .map_err(|_| anyhow!("unknown ensembl_object_type {}", row.object_xref.ensembl_object_type))?;
        let info_type: InfoType = row
            .xref
            .info_type
            .parse()
            .map_err(|_| anyhow!("unknown info_type {}", row.xref.info_type))?;
        let analysis_id = analyses.select(info_type, object_type);

        let new_xref = NewXref {
            xref_id: offsets.remap_xref(row.xref.xref_id),
            external_db_id,
            accession: row.xref.accession.clone(),
            label: row.xref.label.clone().unwrap_or_else(|| row.xref.accession.clone()),
            version: row.xref.version,
            description: row.xref.description.clone(),
            info_type,
            info_text: row.xref.info_text.clone(),
        };
        let xref_id = self.core.upsert_xref(&new_xref).await?;

        let new_object_xref = NewObjectXref {
            object_xref_id: offsets.remap_object_xref(row.object_xref.object_xref_id),
            xref_id,
            ensembl_id: row.object_xref.ensembl_id,
            ensembl_object_type: object_type,
            analysis_id,
            master_xref_id: row.object_xref.master_xref_id.map(|id| offsets.remap_xref(id)),
            linkage_annotation: row.object_xref.linkage_annotation.clone(),
        };
        let object_xref_id = self.core.upsert_object_xref(&new_object_xref).await?;

        if let Some(identity) = &row.identity {
            self.core
                .add_identity_xref(&NewIdentityXref {
                    object_xref_id,
                    query_identity: identity.query_identity,
                    target_identity: identity.target_identity,
                    hit_start: identity.hit_start,
                    hit_end: identity.hit_end,
                    translation_start: identity.translation_start,
                    translation_end: identity.translation_end,
                    cigar_line: identity.cigar_line.clone(),
                    score: identity.score,
                    evalue: identity.evalue,
                })
                .await?;
        }
        Ok(())
    }

    /// Returns `Ok(true)` when the dependent edge was written, `Ok(false)`
    /// when it was skipped because the master xref never mapped (counted
    /// as `num_skipped_master_problem`, not an error).
    async fn write_dependent_row(
        &self,
        row: &DependentXrefRow,
        external_db_id: i32,
        analyses: &AnalysisIds,
        offsets: &OffsetAllocator,
        dependent_seen: &mut HashSet<(i64, i64)>,
    ) -> Result<bool> {
        let Some(master_xref_id) = row.master_xref_id else {
            return Ok(false);
        };
        let master_core_id = offsets.remap_xref(master_xref_id);
        let dedup_key = (master_xref_id, row.xref.xref_id);
        if !dependent_seen.insert(dedup_key) {
            return Ok(true);
        }

        let info_type: InfoType = row
            .xref
            .info_type
            .parse()
            .map_err(|_| anyhow!("unknown info_type {}", row.xref.info_type))?;
        let object_type: EnsemblObjectType = row
            .object_xref
            .ensembl_object_type
            .parse()
            .map_err(|_| anyhow!("unknown ensembl_object_type {}", row.object_xref.ensembl_object_type))?;
        let analysis_id = analyses.select(info_type, object_type);

        let new_xref = NewXref {
            xref_id: offsets.remap_xref(row.xref.xref_id),
            external_db_id,
            accession: row.xref.accession.clone(),
            label: row.xref.label.clone().unwrap_or_else(|| row.xref.accession.clone()),
            version: row.xref.version,
            description: row.xref.description.clone(),
            info_type,
            info_text: row.xref.info_text.clone(),
        };
        let dependent_core_id = self.core.upsert_xref(&new_xref).await?;

        let new_object_xref = NewObjectXref {
            object_xref_id: offsets.remap_object_xref(row.object_xref.object_xref_id),
            xref_id: dependent_core_id,
            ensembl_id: row.object_xref.ensembl_id,
            ensembl_object_type: object_type,
            analysis_id,
            master_xref_id: Some(master_core_id),
            linkage_annotation: row.object_xref.linkage_annotation.clone(),
        };
        self.core.upsert_object_xref(&new_object_xref).await?;

        self.core
            .add_dependent_xref(&NewDependentXref {
                master_xref_id: master_core_id,
                dependent_xref_id: dependent_core_id,
                linkage_annotation: row.object_xref.linkage_annotation.clone(),
                linkage_source_id: row.linkage_source_id.unwrap_or(external_db_id),
            })
            .await?;
        Ok(true)
    }

    async fn load_unmapped(
        &self,
        sources: &[crate::model::staging::Source],
        namespace: &NamespaceResolver,
        analyses: &AnalysisIds,
        stats: &UpdateStats,
    ) -> Result<()> {
        let analysis_id = analyses.dna;
        let thresholds = self.staging.mapping_thresholds().await?;
        let reasons = UnmappedReasonRegistry::build(self.core.as_ref(), &thresholds).await?;

        for source in sources {
            if !namespace.is_transferable(&source.name) {
                continue;
            }
            let Some(external_db) = self.core.external_db_by_name(&source.name).await? else {
                continue;
            };

            self.drain_unmapped(
                self.staging.direct_unmapped_low_priority(source.source_id),
                external_db.external_db_id,
                analysis_id,
                reasons.reason_id(UnmappedReasonKind::NoStableId),
                UnmappedReasonKind::NoStableId.dumped_state(),
                stats,
            )
            .await?;

            self.drain_unmapped(
                self.staging.dependent_unmapped_low_priority(source.source_id),
                external_db.external_db_id,
                analysis_id,
                reasons.reason_id(UnmappedReasonKind::MasterFailed),
                UnmappedReasonKind::MasterFailed.dumped_state(),
                stats,
            )
            .await?;

            self.drain_unmapped(
                self.staging.sequence_unmapped_remaining(source.source_id),
                external_db.external_db_id,
                analysis_id,
                reasons
                    .threshold_reason_id(source.source_id)
                    .or_else(|| reasons.reason_id(UnmappedReasonKind::FailedMap)),
                UnmappedReasonKind::FailedMap.dumped_state(),
                stats,
            )
            .await?;

            self.drain_unmapped(
                self.staging.misc_unmapped(source.source_id),
                external_db.external_db_id,
                analysis_id,
                reasons.reason_id(UnmappedReasonKind::NoMapping),
                UnmappedReasonKind::NoMapping.dumped_state(),
                stats,
            )
            .await?;

            self.drain_unmapped(
                self.staging.other_unmapped(source.source_id),
                external_db.external_db_id,
                analysis_id,
                reasons.reason_id(UnmappedReasonKind::NoMaster),
                UnmappedReasonKind::NoMaster.dumped_state(),
                stats,
            )
            .await?;
        }
        Ok(())
    }

    async fn drain_unmapped(
        &self,
        mut stream: futures::stream::BoxStream<'_, Result<UnmappedCandidate>>,
        external_db_id: i32,
        analysis_id: i32,
        reason_id: Option<i32>,
        dumped_state: DumpedState,
        stats: &UpdateStats,
    ) -> Result<()> {
        let Some(reason_id) = reason_id else {
            return Ok(());
        };
        let mut dumped_ids = Vec::new();
        while let Some(candidate) = stream.next().await {
            let candidate = candidate?;
            self.core
                .add_unmapped_object(&NewUnmappedObject {
                    analysis_id,
                    external_db_id,
                    identifier: candidate.xref.accession.clone(),
                    unmapped_reason_id: reason_id,
                    query_score: candidate.query_score,
                    target_score: candidate.target_score,
                    ensembl_id: None,
                    ensembl_object_type: None,
                    parent: None,
                })
                .await?;
            dumped_ids.push(candidate.xref.xref_id);
            stats.num_unmapped.inc();
        }
        self.staging.mark_dumped(&dumped_ids, dumped_state).await?;
        Ok(())
    }
}
