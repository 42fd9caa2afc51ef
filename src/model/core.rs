//! Row types for the core schema.

use super::{EnsemblObjectType, InfoType};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExternalDb {
    pub external_db_id: i32,
    pub db_name: String,
    pub release: Option<String>,
}

/// The full uniqueness key for a core `xref` row:
/// `(accession, external_db_id, info_type, info_text, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XrefKey {
    pub accession: String,
    pub external_db_id: i32,
    pub info_type: InfoType,
    pub info_text: String,
    pub version: i32,
}

/// `xref_id` is pre-computed by the caller via
/// [`crate::offsets::OffsetAllocator::remap_xref`] - this loader assigns
/// core ids explicitly rather than letting Postgres generate them, so a
/// dependent xref's `master_xref_id` (itself a remapped id) is guaranteed
/// to resolve to the row the master was actually written under.
#[derive(Debug, Clone)]
pub struct NewXref {
    pub xref_id: i64,
    pub external_db_id: i32,
    pub accession: String,
    pub label: String,
    pub version: i32,
    pub description: Option<String>,
    pub info_type: InfoType,
    pub info_text: String,
}

#[derive(Debug, Clone)]
pub struct NewObjectXref {
    pub object_xref_id: i64,
    pub xref_id: i64,
    pub ensembl_id: i64,
    pub ensembl_object_type: EnsemblObjectType,
    pub analysis_id: i32,
    pub master_xref_id: Option<i64>,
    pub linkage_annotation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewIdentityXref {
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

#[derive(Debug, Clone)]
pub struct NewDependentXref {
    pub master_xref_id: i64,
    pub dependent_xref_id: i64,
    pub linkage_annotation: Option<String>,
    pub linkage_source_id: i32,
}

/// Offsets computed once per run by the OffsetAllocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offsets {
    pub xref_offset: i64,
    pub object_xref_offset: i64,
}

#[derive(Debug, Clone)]
pub struct NewUnmappedObject {
    pub analysis_id: i32,
    pub external_db_id: i32,
    pub identifier: String,
    pub unmapped_reason_id: i32,
    pub query_score: Option<f64>,
    pub target_score: Option<f64>,
    pub ensembl_id: Option<i64>,
    pub ensembl_object_type: Option<EnsemblObjectType>,
    pub parent: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnmappedReason {
    pub unmapped_reason_id: i32,
    pub summary: String,
    pub full_description: String,
}

/// A row emitted by the biomart duplicate-type probe query: one source
/// currently labelling xrefs against more than one `ensembl_object_type`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceWithMultipleTypes {
    pub external_db_id: i32,
    pub db_name: String,
}

/// One `object_xref` row pulled in for alt-allele propagation, resolved
/// through `gene_transcript_translation` back to the gene it ultimately
/// belongs to - `gene_id` is the owning gene regardless of whether the row
/// itself is bound to that Gene, one of its Transcripts, or one of its
/// Translations. `external_db_id`+`accession` is the business key used to
/// detect a gene-specific xref the target gene already carries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AltAlleleObjectXref {
    pub object_xref_id: i64,
    pub gene_id: i64,
    pub external_db_id: i32,
    pub accession: String,
}

/// A dangling reference found by the QualityChecker.
#[derive(Debug, Clone)]
pub struct UnlinkedEntry {
    pub table: &'static str,
    pub id: i64,
    pub missing_reference: &'static str,
    pub missing_id: i64,
}
