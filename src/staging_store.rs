//! Typed, streaming access to the staging schema.
//!
//! Every read is exposed as a `BoxStream` of pull-based, fallible records
//! rather than a materialized `Vec`, so a multi-million-row source doesn't
//! have to fit in memory. Each stream wraps a connection checked out from
//! the pool for the lifetime of the iteration; dropping the stream returns
//! the connection, which is how `sqlx` expresses "closing the stream
//! releases the cursor".

use crate::model::staging::*;
use crate::model::InfoType;
use crate::prelude::*;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use sqlx::{PgPool, Row};

#[async_trait]
pub trait StagingStore: Send + Sync {
    fn xrefs_by_dump_out(&self) -> BoxStream<'_, Result<DumpOutGroup>>;

    fn identity_xrefs(
        &self,
        source_id: i32,
        info_type: InfoType,
    ) -> BoxStream<'_, Result<IdentityXrefRow>>;

    fn checksum_xrefs(&self, source_id: i32) -> BoxStream<'_, Result<IdentityXrefRow>>;

    fn dependent_xrefs(&self, source_id: i32) -> BoxStream<'_, Result<DependentXrefRow>>;

    fn direct_unmapped_low_priority(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>>;
    fn dependent_unmapped_low_priority(
        &self,
        source_id: i32,
    ) -> BoxStream<'_, Result<UnmappedCandidate>>;
    fn sequence_unmapped_remaining(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>>;
    fn misc_unmapped(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>>;
    fn other_unmapped(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>>;

    fn synonyms_for_xrefs(&self, xref_ids: &[i64]) -> BoxStream<'_, Result<SynonymRow>>;

    async fn mapping_thresholds(&self) -> Result<Vec<MappingThreshold>>;

    async fn alt_allele_rows(&self) -> Result<Vec<AltAlleleRow>>;

    async fn lrg_gene_pairs(&self) -> Result<Vec<(i64, i64)>>;

    async fn mark_dumped(&self, xref_ids: &[i64], state: crate::model::DumpedState) -> Result<()>;
    async fn reset_dumped_unless_another_priority(&self) -> Result<()>;
    async fn insert_process_status(&self, status: &str) -> Result<()>;
    async fn latest_process_status(&self) -> Result<Option<ProcessStatusRow>>;

    async fn all_sources(&self) -> Result<Vec<Source>>;
}

pub struct PgStagingStore {
    pool: PgPool,
}

impl PgStagingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_xref(row: &sqlx::postgres::PgRow) -> Result<StagingXref> {
        Ok(StagingXref {
            xref_id: row.try_get("xref_id")?,
            accession: row.try_get("accession")?,
            label: row.try_get("label")?,
            version: row.try_get("version")?,
            description: row.try_get("description")?,
            info_type: row.try_get("info_type")?,
            info_text: row.try_get("info_text")?,
            source_id: row.try_get("source_id")?,
            species_id: row.try_get("species_id")?,
            dumped: row.try_get("dumped")?,
        })
    }

    fn row_to_object_xref(row: &sqlx::postgres::PgRow) -> Result<StagingObjectXref> {
        Ok(StagingObjectXref {
            object_xref_id: row.try_get("object_xref_id")?,
            xref_id: row.try_get("xref_id")?,
            ensembl_id: row.try_get("ensembl_id")?,
            ensembl_object_type: row.try_get("ensembl_object_type")?,
            ox_status: row.try_get("ox_status")?,
            master_xref_id: row.try_get("master_xref_id")?,
            linkage_annotation: row.try_get("linkage_annotation")?,
        })
    }

    fn row_to_identity(row: &sqlx::postgres::PgRow) -> Result<Option<StagingIdentityXref>> {
        let query_identity: Option<i32> = row.try_get("query_identity")?;
        if query_identity.is_none() {
            return Ok(None);
        }
        Ok(Some(StagingIdentityXref {
            object_xref_id: row.try_get("object_xref_id")?,
            query_identity: query_identity.unwrap(),
            target_identity: row.try_get("target_identity")?,
            hit_start: row.try_get("hit_start")?,
            hit_end: row.try_get("hit_end")?,
            translation_start: row.try_get("translation_start")?,
            translation_end: row.try_get("translation_end")?,
            cigar_line: row.try_get("cigar_line")?,
            score: row.try_get("score")?,
            evalue: row.try_get("evalue")?,
        }))
    }
}

#[async_trait]
impl StagingStore for PgStagingStore {
    fn xrefs_by_dump_out(&self) -> BoxStream<'_, Result<DumpOutGroup>> {
        let query = sqlx::query(
            r#"
            SELECT s.source_id, s.name, x.info_type, COUNT(*) AS cnt,
                   s.priority_description, s.release
            FROM source s
            JOIN xref x ON x.source_id = s.source_id
            JOIN object_xref ox ON ox.xref_id = x.xref_id
            WHERE ox.ox_status = 'DUMP_OUT'
            GROUP BY s.source_id, s.name, x.info_type, s.priority_description, s.release
            ORDER BY s.source_id, x.info_type
            "#,
        );
        query
            .fetch(&self.pool)
            .map_err(anyhow::Error::from)
            .and_then(|row| async move {
                let info_type: String = row.try_get("info_type")?;
                Ok(DumpOutGroup {
                    source_id: row.try_get("source_id")?,
                    name: row.try_get("name")?,
                    info_type: info_type.parse().map_err(|_| anyhow!("unknown info_type {info_type}"))?,
                    count: row.try_get::<i64, _>("cnt")?,
                    priority_description: row.try_get("priority_description")?,
                    release: row.try_get("release")?,
                })
            })
            .boxed()
    }

    fn identity_xrefs(
        &self,
        source_id: i32,
        info_type: InfoType,
    ) -> BoxStream<'_, Result<IdentityXrefRow>> {
        let info_type = info_type.to_string();
        let query = sqlx::query(
            r#"
            SELECT x.xref_id, x.accession, x.label, x.version, x.description,
                   x.info_type, x.info_text, x.source_id, x.species_id, x.dumped,
                   ox.object_xref_id, ox.ensembl_id, ox.ensembl_object_type,
                   ox.ox_status, ox.master_xref_id, ox.linkage_annotation,
                   i.query_identity, i.target_identity, i.hit_start, i.hit_end,
                   i.translation_start, i.translation_end, i.cigar_line,
                   i.score, i.evalue
            FROM xref x
            JOIN object_xref ox ON ox.xref_id = x.xref_id
            LEFT JOIN identity_xref i ON i.object_xref_id = ox.object_xref_id
            WHERE x.source_id = $1 AND x.info_type = $2
              AND x.dumped IS NULL AND ox.ox_status = 'DUMP_OUT'
            ORDER BY x.xref_id, ox.ensembl_id
            "#,
        )
        .bind(source_id)
        .bind(info_type);
        query
            .fetch(&self.pool)
            .map_err(anyhow::Error::from)
            .and_then(|row| async move {
                Ok(IdentityXrefRow {
                    xref: Self::row_to_xref(&row)?,
                    object_xref: Self::row_to_object_xref(&row)?,
                    identity: Self::row_to_identity(&row)?,
                })
            })
            .boxed()
    }

    fn checksum_xrefs(&self, source_id: i32) -> BoxStream<'_, Result<IdentityXrefRow>> {
        self.identity_xrefs(source_id, InfoType::Checksum)
    }

    fn dependent_xrefs(&self, source_id: i32) -> BoxStream<'_, Result<DependentXrefRow>> {
        let query = sqlx::query(
            r#"
            SELECT x.xref_id, x.accession, x.label, x.version, x.description,
                   x.info_type, x.info_text, x.source_id, x.species_id, x.dumped,
                   ox.object_xref_id, ox.ensembl_id, ox.ensembl_object_type,
                   ox.ox_status, ox.master_xref_id, ox.linkage_annotation,
                   d.master_xref_id AS dep_master_xref_id, d.linkage_source_id
            FROM xref x
            JOIN object_xref ox ON ox.xref_id = x.xref_id
            LEFT JOIN dependent_xref d ON d.dependent_xref_id = x.xref_id
            WHERE x.source_id = $1 AND x.info_type = 'DEPENDENT'
              AND x.dumped IS NULL AND ox.ox_status = 'DUMP_OUT'
            ORDER BY x.xref_id, ox.ensembl_id
            "#,
        )
        .bind(source_id);
        query
            .fetch(&self.pool)
            .map_err(anyhow::Error::from)
            .and_then(|row| async move {
                Ok(DependentXrefRow {
                    xref: Self::row_to_xref(&row)?,
                    object_xref: Self::row_to_object_xref(&row)?,
                    master_xref_id: row.try_get("dep_master_xref_id")?,
                    linkage_source_id: row.try_get("linkage_source_id")?,
                })
            })
            .boxed()
    }

    fn direct_unmapped_low_priority(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        unmapped_stream(&self.pool, source_id, InfoType::Direct)
    }

    fn dependent_unmapped_low_priority(
        &self,
        source_id: i32,
    ) -> BoxStream<'_, Result<UnmappedCandidate>> {
        unmapped_stream(&self.pool, source_id, InfoType::Dependent)
    }

    fn sequence_unmapped_remaining(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        unmapped_stream(&self.pool, source_id, InfoType::SequenceMatch)
    }

    fn misc_unmapped(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        unmapped_stream(&self.pool, source_id, InfoType::Misc)
    }

    fn other_unmapped(&self, source_id: i32) -> BoxStream<'_, Result<UnmappedCandidate>> {
        unmapped_stream(&self.pool, source_id, InfoType::InferredPair)
    }

    fn synonyms_for_xrefs(&self, xref_ids: &[i64]) -> BoxStream<'_, Result<SynonymRow>> {
        let ids = xref_ids.to_vec();
        sqlx::query_as::<_, SynonymRow>(
            "SELECT xref_id, synonym FROM synonym WHERE xref_id = ANY($1)",
        )
        .bind(ids)
        .fetch(&self.pool)
        .map_err(anyhow::Error::from)
        .boxed()
    }

    async fn mapping_thresholds(&self) -> Result<Vec<MappingThreshold>> {
        let rows = sqlx::query_as::<_, MappingThreshold>(
            r#"
            SELECT smm.source_id, m.percent_query_cutoff, m.percent_target_cutoff
            FROM source_mapping_method smm
            JOIN mapping m ON m.job_id = smm.job_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn alt_allele_rows(&self) -> Result<Vec<AltAlleleRow>> {
        let rows = sqlx::query_as::<_, AltAlleleRow>(
            "SELECT group_id, gene_id, is_reference FROM alt_allele ORDER BY group_id, gene_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn lrg_gene_pairs(&self) -> Result<Vec<(i64, i64)>> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT ox.ensembl_id, p.pair_gene_id
            FROM xref x
            JOIN source s ON s.source_id = x.source_id
            JOIN object_xref ox ON ox.xref_id = x.xref_id
            JOIN pairs p ON p.lrg_xref_id = x.xref_id
            WHERE s.name = 'Ens_Hs_gene'
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn mark_dumped(&self, xref_ids: &[i64], state: crate::model::DumpedState) -> Result<()> {
        sqlx::query("UPDATE xref SET dumped = $1 WHERE xref_id = ANY($2)")
            .bind(state.to_string())
            .bind(xref_ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reset_dumped_unless_another_priority(&self) -> Result<()> {
        sqlx::query("UPDATE xref SET dumped = NULL WHERE dumped IS NOT NULL AND dumped <> 'NO_DUMP_ANOTHER_PRIORITY'")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_process_status(&self, status: &str) -> Result<()> {
        sqlx::query("INSERT INTO process_status (status, \"timestamp\") VALUES ($1, now())")
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn latest_process_status(&self) -> Result<Option<ProcessStatusRow>> {
        let row = sqlx::query_as::<_, ProcessStatusRow>(
            "SELECT status, \"timestamp\" FROM process_status ORDER BY \"timestamp\" DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn all_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, Source>(
            "SELECT source_id, name, priority, priority_description, release FROM source",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

fn unmapped_stream(
    pool: &PgPool,
    source_id: i32,
    info_type: InfoType,
) -> BoxStream<'_, Result<UnmappedCandidate>> {
    let query = sqlx::query(
        r#"
        SELECT x.xref_id, x.accession, x.label, x.version, x.description,
               x.info_type, x.info_text, x.source_id, x.species_id, x.dumped,
               ox.query_identity AS query_score, ox.target_identity AS target_score
        FROM xref x
        LEFT JOIN (
            SELECT o.xref_id, i.query_identity, i.target_identity
            FROM object_xref o
            LEFT JOIN identity_xref i ON i.object_xref_id = o.object_xref_id
            WHERE o.ox_status <> 'FAILED_PRIORITY'
        ) ox ON ox.xref_id = x.xref_id
        WHERE x.source_id = $1 AND x.info_type = $2 AND x.dumped IS NULL
        ORDER BY x.xref_id
        "#,
    )
    .bind(source_id)
    .bind(info_type.to_string());
    query
        .fetch(pool)
        .map_err(anyhow::Error::from)
        .and_then(|row| async move {
            Ok(UnmappedCandidate {
                xref: PgStagingStore::row_to_xref(&row)?,
                query_score: row.try_get("query_score")?,
                target_score: row.try_get("target_score")?,
            })
        })
        .boxed()
}
