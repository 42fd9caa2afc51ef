//! In-memory fakes for `StagingStore`/`CoreStore`, used to drive
//! `Loader::update` end to end without a live Postgres - the orchestration
//! logic is tested against these, not against the database adapters.

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use xref_loader::core_store::CoreStore;
use xref_loader::model::core::*;
use xref_loader::model::staging::*;
use xref_loader::model::{DumpedState, EnsemblObjectType, InfoType};
use xref_loader::staging_store::StagingStore;
use xref_loader::Result;

#[derive(Default, Clone)]
pub struct FakeStaging {
    pub sources: Vec<Source>,
    pub xrefs: Arc<Mutex<HashMap<i64, StagingXref>>>,
    pub object_xrefs: Arc<Mutex<HashMap<i64, StagingObjectXref>>>,
    pub identities: Arc<Mutex<HashMap<i64, StagingIdentityXref>>>,
    pub dependent_links: Arc<Mutex<HashMap<i64, (Option<i64>, Option<i32>)>>>,
    pub synonyms: Arc<Mutex<Vec<SynonymRow>>>,
    pub mapping_thresholds: Vec<MappingThreshold>,
    pub alt_allele_rows: Vec<AltAlleleRow>,
    pub lrg_pairs: Vec<(i64, i64)>,
    pub process_status: Arc<Mutex<Vec<ProcessStatusRow>>>,
}

impl FakeStaging {
    fn xrefs_for(&self, source_id: i32, info_type: InfoType) -> Vec<StagingXref> {
        self.xrefs
            .lock()
            .unwrap()
            .values()
            .filter(|x| {
                x.source_id == source_id
                    && x.info_type == info_type.to_string()
                    && x.dumped.is_none()
            })
            .cloned()
            .collect()
    }

    fn object_xref_for_xref(&self, xref_id: i64) -> Option<StagingObjectXref> {
        self.object_xrefs
            .lock()
            .unwrap()
            .values()
            .find(|ox| ox.xref_id == xref_id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl StagingStore for FakeStaging {
    fn xrefs_by_dump_out(&self) -> BoxStream<'_, Result<DumpOutGroup>> {
        let mut groups: HashMap<(i32, String), i64> = HashMap::new();
        for x in self.xrefs.lock().unwrap().values() {
            if x.dumped.is_none() {
                *groups.entry((x.source_id, x.info_type.clone())).or_insert(0) += 1;
            }
        }
        let by_id: HashMap<i32, &Source> = self.sources.iter().map(|s| (s.source_id, s)).collect();
        let out: Vec<Result<DumpOutGroup>> = groups
            .into_iter()
            .filter_map(|((source_id, info_type), count)| {
                let source = by_id.get(&source_id)?;
                Some(Ok(DumpOutGroup {
                    source_id,
                    name: source.name.clone(),
                    info_type: info_type.parse().ok()?,
                    count,
                    priority_description: source.priority_description.clone(),
                    release: source.release.clone(),
                }))
            })
            .collect();
        stream::iter(out).boxed()
    }

    fn identity_xrefs(
        &self,
        source_id: i32,
        info_type: InfoType,
    ) -> BoxStream<'_, Result<IdentityXrefRow>> {
        let rows: Vec<Result<IdentityXrefRow>> = self
            .xrefs_for(source_id, info_type)
            .into_iter()
            .filter_map(|xref| {
                let object_xref = self.object_xref_for_xref(xref.xref_id)?;
                let identity = self
                    .identities
                    .lock()
                    .unwrap()
                    .get(&object_xref.object_xref_id)
                    .cloned();
                Some(Ok(IdentityXrefRow {
                    xref,
                    object_xref,
                    identity,
                }))
            })
            .collect();
        stream::iter(rows).boxed()
    }

    fn checksum_xrefs(&self, source_id: i32) -> BoxStream<'_, Result<IdentityXrefRow>> {
        self.identity_xrefs(source_id, InfoType::Checksum)
    }

    fn dependent_xrefs(&self, source_id: i32) -> BoxStream<'_, Result<DependentXrefRow>> {
        let rows: Vec<Result<DependentXrefRow>> = self
            .xrefs_for(source_id, InfoType::Dependent)
            .into_iter()
            .filter_map(|xref| {
                let object_xref = self.object_xref_for_xref(xref.xref_id)?;
                let (master_xref_id, linkage_source_id) = self
                    .dependent_links
                    .lock()
                    .unwrap()
                    .get(&xref.xref_id)
                    .cloned()
                    .unwrap_or((None, None));
                Some(Ok(DependentXrefRow {
                    xref,
                    object_xref,
                    master_xref_id,
                    linkage_source_id,
                }))
            })
            .collect();
        stream::iter(rows).boxed()
    }

    fn direct_unmapped_low_priority(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        self.unmapped_stream(source_id, InfoType::Direct)
    }

    fn dependent_unmapped_low_priority(
        &self,
        source_id: i32,
    ) -> BoxStream<'_, Result<UnmappedCandidate>> {
        self.unmapped_stream(source_id, InfoType::Dependent)
    }

    fn sequence_unmapped_remaining(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        self.unmapped_stream(source_id, InfoType::SequenceMatch)
    }

    fn misc_unmapped(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        self.unmapped_stream(source_id, InfoType::Misc)
    }

    fn other_unmapped(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        self.unmapped_stream(source_id, InfoType::InferredPair)
    }

    fn synonyms_for_xrefs(&self, xref_ids: &[i64]) -> BoxStream<'_, Result<SynonymRow>> {
        let ids = xref_ids.to_vec();
        let rows: Vec<Result<SynonymRow>> = self
            .synonyms
            .lock()
            .unwrap()
            .iter()
            .filter(|s| ids.contains(&s.xref_id))
            .cloned()
            .map(Ok)
            .collect();
        stream::iter(rows).boxed()
    }

    async fn mapping_thresholds(&self) -> Result<Vec<MappingThreshold>> {
        Ok(self.mapping_thresholds.clone())
    }

    async fn alt_allele_rows(&self) -> Result<Vec<AltAlleleRow>> {
        Ok(self.alt_allele_rows.clone())
    }

    async fn lrg_gene_pairs(&self) -> Result<Vec<(i64, i64)>> {
        Ok(self.lrg_pairs.clone())
    }

    async fn mark_dumped(&self, xref_ids: &[i64], state: DumpedState) -> Result<()> {
        let mut xrefs = self.xrefs.lock().unwrap();
        for id in xref_ids {
            if let Some(x) = xrefs.get_mut(id) {
                x.dumped = Some(state.to_string());
            }
        }
        Ok(())
    }

    async fn reset_dumped_unless_another_priority(&self) -> Result<()> {
        let mut xrefs = self.xrefs.lock().unwrap();
        for x in xrefs.values_mut() {
            if x.dumped.as_deref() != Some("NO_DUMP_ANOTHER_PRIORITY") {
                x.dumped = None;
            }
        }
        Ok(())
    }

    async fn insert_process_status(&self, status: &str) -> Result<()> {
        self.process_status.lock().unwrap().push(ProcessStatusRow {
            status: status.to_string(),
            timestamp: epoch(),
        });
        Ok(())
    }

    async fn latest_process_status(&self) -> Result<Option<ProcessStatusRow>> {
        Ok(self.process_status.lock().unwrap().last().cloned())
    }

    async fn all_sources(&self) -> Result<Vec<Source>> {
        Ok(self.sources.clone())
    }
}

impl FakeStaging {
    fn unmapped_stream(&self, source_id: i32, info_type: InfoType) -> BoxStream<'_, Result<UnmappedCandidate>> {
        let rows: Vec<Result<UnmappedCandidate>> = self
            .xrefs_for(source_id, info_type)
            .into_iter()
            .map(|xref| {
                Ok(UnmappedCandidate {
                    xref,
                    query_score: None,
                    target_score: None,
                })
            })
            .collect();
        stream::iter(rows).boxed()
    }
}

fn epoch() -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(0, 0).unwrap()
}

#[derive(Default, Clone)]
pub struct FakeCore {
    pub external_dbs: Arc<Mutex<HashMap<String, ExternalDb>>>,
    pub next_external_db_id: Arc<Mutex<i32>>,
    pub xrefs: Arc<Mutex<HashMap<i64, (XrefKey, NewXref)>>>,
    pub object_xrefs: Arc<Mutex<HashMap<i64, NewObjectXref>>>,
    pub next_object_xref_id: Arc<Mutex<i64>>,
    pub identity_xrefs: Arc<Mutex<Vec<(i64, NewIdentityXref)>>>,
    pub dependent_xrefs: Arc<Mutex<Vec<NewDependentXref>>>,
    pub synonyms: Arc<Mutex<Vec<(i64, String)>>>,
    pub unmapped_reasons: Arc<Mutex<Vec<UnmappedReason>>>,
    pub next_reason_id: Arc<Mutex<i32>>,
    pub unmapped_objects: Arc<Mutex<Vec<NewUnmappedObject>>>,
    pub analyses: Arc<Mutex<HashMap<String, i32>>>,
    pub next_analysis_id: Arc<Mutex<i32>>,
}

impl FakeCore {
    pub fn with_external_db(self, name: &str) -> Self {
        let mut id = self.next_external_db_id.lock().unwrap();
        *id += 1;
        self.external_dbs.lock().unwrap().insert(
            name.to_string(),
            ExternalDb {
                external_db_id: *id,
                db_name: name.to_string(),
                release: None,
            },
        );
        drop(id);
        self
    }
}

#[async_trait::async_trait]
impl CoreStore for FakeCore {
    async fn external_db_by_name(&self, name: &str) -> Result<Option<ExternalDb>> {
        Ok(self.external_dbs.lock().unwrap().get(name).cloned())
    }

    async fn external_db_names(&self) -> Result<std::collections::BTreeSet<String>> {
        Ok(self.external_dbs.lock().unwrap().keys().cloned().collect())
    }

    async fn set_source_release(&self, external_db_id: i32, release: &str) -> Result<()> {
        for db in self.external_dbs.lock().unwrap().values_mut() {
            if db.external_db_id == external_db_id {
                db.release = Some(release.to_string());
            }
        }
        Ok(())
    }

    async fn offsets(&self) -> Result<Offsets> {
        Ok(Offsets {
            xref_offset: 0,
            object_xref_offset: 0,
        })
    }

    async fn delete_projected(&self) -> Result<u64> {
        Ok(0)
    }

    async fn delete_by_external_db(&self, external_db_id: i32) -> Result<u64> {
        let before = self.xrefs.lock().unwrap().len();
        self.xrefs
            .lock()
            .unwrap()
            .retain(|_, (key, _)| key.external_db_id != external_db_id);
        let after = self.xrefs.lock().unwrap().len();
        Ok((before - after) as u64)
    }

    async fn ensure_analysis(&self, logic_name: &str) -> Result<i32> {
        if let Some(id) = self.analyses.lock().unwrap().get(logic_name) {
            return Ok(*id);
        }
        let mut next = self.next_analysis_id.lock().unwrap();
        *next += 1;
        self.analyses
            .lock()
            .unwrap()
            .insert(logic_name.to_string(), *next);
        Ok(*next)
    }

    async fn upsert_xref(&self, xref: &NewXref) -> Result<i64> {
        let key = XrefKey {
            accession: xref.accession.clone(),
            external_db_id: xref.external_db_id,
            info_type: xref.info_type,
            info_text: xref.info_text.clone(),
            version: xref.version,
        };
        if let Some((id, _)) = self
            .xrefs
            .lock()
            .unwrap()
            .iter()
            .find(|(_, (k, _))| *k == key)
            .map(|(id, v)| (*id, v.clone()))
        {
            return Ok(id);
        }
        let id = xref.xref_id;
        self.xrefs.lock().unwrap().insert(id, (key, xref.clone()));
        Ok(id)
    }

    async fn upsert_object_xref(&self, object_xref: &NewObjectXref) -> Result<i64> {
        if let Some((id, _)) = self.object_xrefs.lock().unwrap().iter().find(|(_, o)| {
            o.xref_id == object_xref.xref_id
                && o.ensembl_id == object_xref.ensembl_id
                && o.ensembl_object_type == object_xref.ensembl_object_type
        }) {
            return Ok(*id);
        }
        let id = object_xref.object_xref_id;
        self.object_xrefs.lock().unwrap().insert(id, object_xref.clone());
        Ok(id)
    }

    async fn add_identity_xref(&self, identity: &NewIdentityXref) -> Result<()> {
        self.identity_xrefs
            .lock()
            .unwrap()
            .push((identity.object_xref_id, identity.clone()));
        Ok(())
    }

    async fn add_dependent_xref(&self, dependent: &NewDependentXref) -> Result<()> {
        self.dependent_xrefs.lock().unwrap().push(dependent.clone());
        Ok(())
    }

    async fn add_synonym(&self, xref_id: i64, synonym: &str) -> Result<()> {
        self.synonyms.lock().unwrap().push((xref_id, synonym.to_string()));
        Ok(())
    }

    async fn find_unmapped_reason(&self, description_like: &str) -> Result<Option<UnmappedReason>> {
        Ok(self
            .unmapped_reasons
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.full_description == description_like)
            .cloned())
    }

    async fn add_unmapped_reason(&self, summary: &str, full_description: &str) -> Result<i32> {
        let mut next = self.next_reason_id.lock().unwrap();
        *next += 1;
        let id = *next;
        self.unmapped_reasons.lock().unwrap().push(UnmappedReason {
            unmapped_reason_id: id,
            summary: summary.to_string(),
            full_description: full_description.to_string(),
        });
        Ok(id)
    }

    async fn add_unmapped_object(&self, unmapped: &NewUnmappedObject) -> Result<i64> {
        self.unmapped_objects.lock().unwrap().push(unmapped.clone());
        Ok(self.unmapped_objects.lock().unwrap().len() as i64)
    }

    async fn sources_with_multiple_types(&self) -> Result<Vec<SourceWithMultipleTypes>> {
        let object_xrefs = self.object_xrefs.lock().unwrap();
        let xrefs = self.xrefs.lock().unwrap();
        let mut by_db: HashMap<i32, std::collections::HashSet<EnsemblObjectType>> = HashMap::new();
        for ox in object_xrefs.values() {
            if let Some((key, _)) = xrefs.get(&ox.xref_id) {
                by_db
                    .entry(key.external_db_id)
                    .or_default()
                    .insert(ox.ensembl_object_type);
            }
        }
        let external_dbs = self.external_dbs.lock().unwrap();
        Ok(by_db
            .into_iter()
            .filter(|(_, types)| types.len() > 1)
            .filter_map(|(external_db_id, _)| {
                external_dbs
                    .values()
                    .find(|d| d.external_db_id == external_db_id)
                    .map(|d| SourceWithMultipleTypes {
                        external_db_id,
                        db_name: d.db_name.clone(),
                    })
            })
            .collect())
    }

    async fn object_xrefs_for_external_db(
        &self,
        external_db_id: i32,
    ) -> Result<Vec<(i64, i64, EnsemblObjectType)>> {
        let object_xrefs = self.object_xrefs.lock().unwrap();
        let xrefs = self.xrefs.lock().unwrap();
        Ok(object_xrefs
            .iter()
            .filter_map(|(ox_id, ox)| {
                let (key, _) = xrefs.get(&ox.xref_id)?;
                if key.external_db_id == external_db_id {
                    Some((*ox_id, ox.xref_id, ox.ensembl_object_type))
                } else {
                    None
                }
            })
            .collect())
    }

    async fn retype_object_xrefs(
        &self,
        object_xref_ids: &[i64],
        to: EnsemblObjectType,
    ) -> Result<()> {
        let mut object_xrefs = self.object_xrefs.lock().unwrap();
        for id in object_xref_ids {
            if let Some(ox) = object_xrefs.get_mut(id) {
                ox.ensembl_object_type = to;
            }
        }
        Ok(())
    }

    async fn delete_object_xrefs(&self, object_xref_ids: &[i64]) -> Result<u64> {
        let mut object_xrefs = self.object_xrefs.lock().unwrap();
        let before = object_xrefs.len();
        for id in object_xref_ids {
            object_xrefs.remove(id);
        }
        Ok((before - object_xrefs.len()) as u64)
    }

    async fn genes_for_alt_allele_move(
        &self,
        gene_ids: &[i64],
        gene_specific_sources: &[String],
    ) -> Result<Vec<AltAlleleObjectXref>> {
        let object_xrefs = self.object_xrefs.lock().unwrap();
        let xrefs = self.xrefs.lock().unwrap();
        let external_dbs = self.external_dbs.lock().unwrap();
        Ok(object_xrefs
            .iter()
            .filter_map(|(id, ox)| {
                if ox.ensembl_object_type != EnsemblObjectType::Gene || !gene_ids.contains(&ox.ensembl_id) {
                    return None;
                }
                let (key, new_xref) = xrefs.get(&ox.xref_id)?;
                let db_name = &external_dbs
                    .values()
                    .find(|d| d.external_db_id == key.external_db_id)?
                    .db_name;
                if !gene_specific_sources.iter().any(|s| s == db_name) {
                    return None;
                }
                Some(AltAlleleObjectXref {
                    object_xref_id: *id,
                    gene_id: ox.ensembl_id,
                    external_db_id: key.external_db_id,
                    accession: new_xref.accession.clone(),
                })
            })
            .collect())
    }

    async fn move_object_xref_gene(&self, object_xref_id: i64, new_gene_id: i64) -> Result<()> {
        if let Some(ox) = self.object_xrefs.lock().unwrap().get_mut(&object_xref_id) {
            ox.ensembl_id = new_gene_id;
            ox.ensembl_object_type = EnsemblObjectType::Gene;
        }
        Ok(())
    }

    async fn copy_object_xref(&self, object_xref_id: i64, target_gene_id: i64) -> Result<i64> {
        let source = self.object_xrefs.lock().unwrap().get(&object_xref_id).cloned();
        let Some(mut source) = source else {
            return Ok(object_xref_id);
        };
        source.ensembl_id = target_gene_id;
        let mut next = self.next_object_xref_id.lock().unwrap();
        *next += 1;
        let id = *next;
        self.object_xrefs.lock().unwrap().insert(id, source);
        Ok(id)
    }

    async fn unlinked_entries(&self) -> Result<Vec<UnlinkedEntry>> {
        Ok(Vec::new())
    }
}
