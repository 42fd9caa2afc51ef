//! Row types for the staging schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Source {
    pub source_id: i32,
    pub name: String,
    pub priority: i32,
    pub priority_description: String,
    pub release: Option<String>,
}

/// One `(source_id, info_type)` group as produced by
/// `StagingStore::xrefs_by_dump_out`.
#[derive(Debug, Clone)]
pub struct DumpOutGroup {
    pub source_id: i32,
    pub name: String,
    pub info_type: crate::model::InfoType,
    pub count: i64,
    pub priority_description: String,
    pub release: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagingXref {
    pub xref_id: i64,
    pub accession: String,
    pub label: Option<String>,
    pub version: i32,
    pub description: Option<String>,
    pub info_type: String,
    pub info_text: String,
    pub source_id: i32,
    pub species_id: i32,
    pub dumped: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagingObjectXref {
    pub object_xref_id: i64,
    pub xref_id: i64,
    pub ensembl_id: i64,
    pub ensembl_object_type: String,
    pub ox_status: String,
    pub master_xref_id: Option<i64>,
    pub linkage_annotation: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StagingIdentityXref {
    pub object_xref_id: i64,
    pub query_identity: i32,
    pub target_identity: i32,
    pub hit_start: i32,
    pub hit_end: i32,
    pub translation_start: i32,
    pub translation_end: i32,
    pub cigar_line: Option<String>,
    pub score: Option<f64>,
    pub evalue: Option<f64>,
}

/// One row streamed by `identity_xrefs`/`checksum_xrefs`: a join across
/// `xref`, `object_xref`, and (optionally) `identity_xref`, ordered by
/// `xref_id[, ensembl_id]` so the loader can detect "first row for this
/// xref" by watching for value changes.
#[derive(Debug, Clone)]
pub struct IdentityXrefRow {
    pub xref: StagingXref,
    pub object_xref: StagingObjectXref,
    pub identity: Option<StagingIdentityXref>,
}

#[derive(Debug, Clone)]
pub struct DependentXrefRow {
    pub xref: StagingXref,
    pub object_xref: StagingObjectXref,
    pub master_xref_id: Option<i64>,
    pub linkage_source_id: Option<i32>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SynonymRow {
    pub xref_id: i64,
    pub synonym: String,
}

/// A candidate row for one of the unmapped streams.
#[derive(Debug, Clone)]
pub struct UnmappedCandidate {
    pub xref: StagingXref,
    pub query_score: Option<f64>,
    pub target_score: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MappingThreshold {
    pub source_id: i32,
    pub percent_query_cutoff: f64,
    pub percent_target_cutoff: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AltAlleleRow {
    pub group_id: i32,
    pub gene_id: i64,
    pub is_reference: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessStatusRow {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteAction {
    Insert,
    Update,
}
