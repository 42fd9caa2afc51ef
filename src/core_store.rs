//! Typed access to the core schema - the write side of the load.
//!
//! Every mutator that can legitimately see the same logical row twice
//! (`upsert_xref`, `upsert_object_xref`) returns the row's core id rather
//! than `()`, because callers need it immediately to build the next row
//! down the chain (`object_xref` needs `xref_id`, `identity_xref` needs
//! `object_xref_id`, ...).

use crate::model::core::*;
use crate::model::EnsemblObjectType;
use crate::prelude::*;
use sqlx::{PgPool, Row};

#[async_trait]
pub trait CoreStore: Send + Sync {
    async fn external_db_by_name(&self, name: &str) -> Result<Option<ExternalDb>>;
    async fn external_db_names(&self) -> Result<std::collections::BTreeSet<String>>;
    async fn set_source_release(&self, external_db_id: i32, release: &str) -> Result<()>;

    async fn offsets(&self) -> Result<Offsets>;

    /// Deletes every row this loader owns for xrefs still carrying
    /// `info_type = 'PROJECTION'`: those rows are
    /// regenerated by a different pipeline and must not accumulate.
    async fn delete_projected(&self) -> Result<u64>;

    /// 8-table cascade delete for one source, in dependency order
    /// (`identity_xref` / `go_xref` -> `object_xref` -> `external_synonym`
    /// -> `dependent_xref` -> `unmapped_object` -> `xref`), per 
    async fn delete_by_external_db(&self, external_db_id: i32) -> Result<u64>;

    async fn ensure_analysis(&self, logic_name: &str) -> Result<i32>;

    async fn upsert_xref(&self, xref: &NewXref) -> Result<i64>;
    async fn upsert_object_xref(&self, object_xref: &NewObjectXref) -> Result<i64>;
    async fn add_identity_xref(&self, identity: &NewIdentityXref) -> Result<()>;
    async fn add_dependent_xref(&self, dependent: &NewDependentXref) -> Result<()>;
    async fn add_synonym(&self, xref_id: i64, synonym: &str) -> Result<()>;

    async fn find_unmapped_reason(&self, description_like: &str) -> Result<Option<UnmappedReason>>;
    async fn add_unmapped_reason(&self, summary: &str, full_description: &str) -> Result<i32>;
    async fn add_unmapped_object(&self, unmapped: &NewUnmappedObject) -> Result<i64>;

    async fn sources_with_multiple_types(&self) -> Result<Vec<SourceWithMultipleTypes>>;
    async fn object_xrefs_for_external_db(
        &self,
        external_db_id: i32,
    ) -> Result<Vec<(i64, i64, EnsemblObjectType)>>;
    async fn retype_object_xrefs(
        &self,
        object_xref_ids: &[i64],
        to: EnsemblObjectType,
    ) -> Result<()>;
    async fn delete_object_xrefs(&self, object_xref_ids: &[i64]) -> Result<u64>;

    async fn genes_for_alt_allele_move(
        &self,
        gene_ids: &[i64],
        gene_specific_sources: &[String],
    ) -> Result<Vec<AltAlleleObjectXref>>;
    async fn move_object_xref_gene(&self, object_xref_id: i64, new_gene_id: i64) -> Result<()>;
    async fn copy_object_xref(&self, object_xref_id: i64, target_gene_id: i64) -> Result<i64>;

    async fn unlinked_entries(&self) -> Result<Vec<UnlinkedEntry>>;
}

pub struct PgCoreStore {
    pool: PgPool,
}

impl PgCoreStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CoreStore for PgCoreStore {
    async fn external_db_by_name(&self, name: &str) -> Result<Option<ExternalDb>> {
        let row = sqlx::query_as::<_, ExternalDb>(
            "SELECT external_db_id, db_name, release FROM external_db WHERE db_name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn external_db_names(&self) -> Result<std::collections::BTreeSet<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT db_name FROM external_db")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().collect())
    }

    async fn set_source_release(&self, external_db_id: i32, release: &str) -> Result<()> {
        sqlx::query("UPDATE external_db SET release = $1 WHERE external_db_id = $2")
            .bind(release)
            .bind(external_db_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn offsets(&self) -> Result<Offsets> {
        let row = sqlx::query(
            r#"
            SELECT
                COALESCE((SELECT MAX(xref_id) FROM xref), 0) AS xref_max,
                COALESCE((SELECT MAX(object_xref_id) FROM object_xref), 0) AS object_xref_max
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(Offsets {
            xref_offset: row.try_get::<i64, _>("xref_max")?,
            object_xref_offset: row.try_get::<i64, _>("object_xref_max")?,
        })
    }

    async fn delete_projected(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM xref WHERE info_type = 'PROJECTION'")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_by_external_db(&self, external_db_id: i32) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"DELETE FROM identity_xref WHERE object_xref_id IN (
                SELECT ox.object_xref_id FROM object_xref ox
                JOIN xref x ON x.xref_id = ox.xref_id
                WHERE x.external_db_id = $1
            )"#,
        )
        .bind(external_db_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"DELETE FROM go_xref WHERE object_xref_id IN (
                SELECT ox.object_xref_id FROM object_xref ox
                JOIN xref x ON x.xref_id = ox.xref_id
                WHERE x.external_db_id = $1
            )"#,
        )
        .bind(external_db_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"DELETE FROM object_xref WHERE xref_id IN (
                SELECT xref_id FROM xref WHERE external_db_id = $1
            )"#,
        )
        .bind(external_db_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"DELETE FROM external_synonym WHERE xref_id IN (
                SELECT xref_id FROM xref WHERE external_db_id = $1
            )"#,
        )
        .bind(external_db_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"DELETE FROM dependent_xref WHERE master_xref_id IN (
                SELECT xref_id FROM xref WHERE external_db_id = $1
            ) OR dependent_xref_id IN (
                SELECT xref_id FROM xref WHERE external_db_id = $1
            )"#,
        )
        .bind(external_db_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM unmapped_object WHERE external_db_id = $1")
            .bind(external_db_id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM xref WHERE external_db_id = $1")
            .bind(external_db_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn ensure_analysis(&self, logic_name: &str) -> Result<i32> {
        let existing: Option<i32> =
            sqlx::query_scalar("SELECT analysis_id FROM analysis WHERE logic_name = $1")
                .bind(logic_name)
                .fetch_optional(&self.pool)
                .await?;
        if let Some(id) = existing {
            return Ok(id);
        }
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO analysis (logic_name, created) VALUES ($1, now()) RETURNING analysis_id",
        )
        .bind(logic_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_xref(&self, xref: &NewXref) -> Result<i64> {
        let (description, _truncated) = xref
            .description
            .as_deref()
            .map(crate::model::truncate_description)
            .unwrap_or((String::new(), false));
        let description = xref.description.as_ref().map(|_| description);

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO xref (xref_id, external_db_id, accession, label, version, description, info_type, info_text)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (accession, external_db_id, info_type, info_text, version)
            DO UPDATE SET label = EXCLUDED.label
            RETURNING xref_id
            "#,
        )
        .bind(xref.xref_id)
        .bind(xref.external_db_id)
        .bind(&xref.accession)
        .bind(&xref.label)
        .bind(xref.version)
        .bind(description)
        .bind(xref.info_type.to_string())
        .bind(&xref.info_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_object_xref(&self, object_xref: &NewObjectXref) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO object_xref (object_xref_id, xref_id, ensembl_id, ensembl_object_type, analysis_id, master_xref_id, linkage_annotation)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (xref_id, ensembl_id, ensembl_object_type)
            DO UPDATE SET linkage_annotation = EXCLUDED.linkage_annotation
            RETURNING object_xref_id
            "#,
        )
        .bind(object_xref.object_xref_id)
        .bind(object_xref.xref_id)
        .bind(object_xref.ensembl_id)
        .bind(object_xref.ensembl_object_type.to_string())
        .bind(object_xref.analysis_id)
        .bind(object_xref.master_xref_id)
        .bind(&object_xref.linkage_annotation)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn add_identity_xref(&self, identity: &NewIdentityXref) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO identity_xref
                (object_xref_id, query_identity, target_identity, hit_start, hit_end,
                 translation_start, translation_end, cigar_line, score, evalue)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (object_xref_id) DO NOTHING
            "#,
        )
        .bind(identity.object_xref_id)
        .bind(identity.query_identity)
        .bind(identity.target_identity)
        .bind(identity.hit_start)
        .bind(identity.hit_end)
        .bind(identity.translation_start)
        .bind(identity.translation_end)
        .bind(&identity.cigar_line)
        .bind(identity.score)
        .bind(identity.evalue)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_dependent_xref(&self, dependent: &NewDependentXref) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dependent_xref (master_xref_id, dependent_xref_id, linkage_annotation, linkage_source_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (master_xref_id, dependent_xref_id) DO NOTHING
            "#,
        )
        .bind(dependent.master_xref_id)
        .bind(dependent.dependent_xref_id)
        .bind(&dependent.linkage_annotation)
        .bind(dependent.linkage_source_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn add_synonym(&self, xref_id: i64, synonym: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO external_synonym (xref_id, synonym) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(xref_id)
        .bind(synonym)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_unmapped_reason(&self, description_like: &str) -> Result<Option<UnmappedReason>> {
        let row = sqlx::query_as::<_, UnmappedReason>(
            "SELECT unmapped_reason_id, summary, full_description FROM unmapped_reason WHERE full_description LIKE $1",
        )
        .bind(description_like)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn add_unmapped_reason(&self, summary: &str, full_description: &str) -> Result<i32> {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO unmapped_reason (summary, full_description) VALUES ($1, $2) RETURNING unmapped_reason_id",
        )
        .bind(summary)
        .bind(full_description)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn add_unmapped_object(&self, unmapped: &NewUnmappedObject) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO unmapped_object
                (analysis_id, external_db_id, identifier, unmapped_reason_id, query_score,
                 target_score, ensembl_id, ensembl_object_type, parent)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING unmapped_object_id
            "#,
        )
        .bind(unmapped.analysis_id)
        .bind(unmapped.external_db_id)
        .bind(&unmapped.identifier)
        .bind(unmapped.unmapped_reason_id)
        .bind(unmapped.query_score)
        .bind(unmapped.target_score)
        .bind(unmapped.ensembl_id)
        .bind(unmapped.ensembl_object_type.map(|t| t.to_string()))
        .bind(&unmapped.parent)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn sources_with_multiple_types(&self) -> Result<Vec<SourceWithMultipleTypes>> {
        let rows = sqlx::query_as::<_, SourceWithMultipleTypes>(
            r#"
            SELECT x.external_db_id, d.db_name
            FROM xref x
            JOIN object_xref ox ON ox.xref_id = x.xref_id
            JOIN external_db d ON d.external_db_id = x.external_db_id
            GROUP BY x.external_db_id, d.db_name
            HAVING COUNT(DISTINCT ox.ensembl_object_type) > 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn object_xrefs_for_external_db(
        &self,
        external_db_id: i32,
    ) -> Result<Vec<(i64, i64, EnsemblObjectType)>> {
        let rows = sqlx::query(
            r#"
            SELECT ox.object_xref_id, ox.xref_id, ox.ensembl_object_type
            FROM object_xref ox
            JOIN xref x ON x.xref_id = ox.xref_id
            WHERE x.external_db_id = $1
            "#,
        )
        .bind(external_db_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                let object_xref_id: i64 = row.try_get("object_xref_id")?;
                let xref_id: i64 = row.try_get("xref_id")?;
                let object_type: String = row.try_get("ensembl_object_type")?;
                let object_type = object_type
                    .parse()
                    .map_err(|_| anyhow!("unknown ensembl_object_type {object_type}"))?;
                Ok((object_xref_id, xref_id, object_type))
            })
            .collect()
    }

    async fn retype_object_xrefs(
        &self,
        object_xref_ids: &[i64],
        to: EnsemblObjectType,
    ) -> Result<()> {
        sqlx::query("UPDATE object_xref SET ensembl_object_type = $1 WHERE object_xref_id = ANY($2)")
            .bind(to.to_string())
            .bind(object_xref_ids.to_vec())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_object_xrefs(&self, object_xref_ids: &[i64]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM identity_xref WHERE object_xref_id = ANY($1)")
            .bind(object_xref_ids.to_vec())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM go_xref WHERE object_xref_id = ANY($1)")
            .bind(object_xref_ids.to_vec())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM object_xref WHERE object_xref_id = ANY($1)")
            .bind(object_xref_ids.to_vec())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn genes_for_alt_allele_move(
        &self,
        gene_ids: &[i64],
        gene_specific_sources: &[String],
    ) -> Result<Vec<AltAlleleObjectXref>> {
        let rows = sqlx::query_as::<_, AltAlleleObjectXref>(
            r#"
            SELECT ox.object_xref_id, gtt.gene_id, x.external_db_id, x.accession
            FROM object_xref ox
            JOIN xref x ON x.xref_id = ox.xref_id
            JOIN external_db d ON d.external_db_id = x.external_db_id
            JOIN gene_transcript_translation gtt ON
                (ox.ensembl_object_type = 'Gene' AND gtt.gene_id = ox.ensembl_id)
                OR (ox.ensembl_object_type = 'Transcript' AND gtt.transcript_id = ox.ensembl_id)
                OR (ox.ensembl_object_type = 'Translation' AND gtt.translation_id = ox.ensembl_id)
            WHERE d.db_name = ANY($1) AND gtt.gene_id = ANY($2)
            "#,
        )
        .bind(gene_specific_sources.to_vec())
        .bind(gene_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn move_object_xref_gene(&self, object_xref_id: i64, new_gene_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE object_xref SET ensembl_id = $1, ensembl_object_type = 'Gene' WHERE object_xref_id = $2",
        )
        .bind(new_gene_id)
        .bind(object_xref_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn copy_object_xref(&self, object_xref_id: i64, target_gene_id: i64) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO object_xref (xref_id, ensembl_id, ensembl_object_type, analysis_id, master_xref_id, linkage_annotation)
            SELECT xref_id, $2, ensembl_object_type, analysis_id, master_xref_id, linkage_annotation
            FROM object_xref WHERE object_xref_id = $1
            ON CONFLICT (xref_id, ensembl_id, ensembl_object_type) DO UPDATE SET linkage_annotation = EXCLUDED.linkage_annotation
            RETURNING object_xref_id
            "#,
        )
        .bind(object_xref_id)
        .bind(target_gene_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO identity_xref
                (object_xref_id, query_identity, target_identity, hit_start, hit_end,
                 translation_start, translation_end, cigar_line, score, evalue)
            SELECT $2, query_identity, target_identity, hit_start, hit_end,
                   translation_start, translation_end, cigar_line, score, evalue
            FROM identity_xref WHERE object_xref_id = $1
            ON CONFLICT (object_xref_id) DO NOTHING
            "#,
        )
        .bind(object_xref_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(id)
    }

    async fn unlinked_entries(&self) -> Result<Vec<UnlinkedEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT ox.object_xref_id AS id
            FROM object_xref ox
            LEFT JOIN xref x ON x.xref_id = ox.xref_id
            WHERE x.xref_id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        let mut out = Vec::new();
        for row in rows {
            out.push(UnlinkedEntry {
                table: "object_xref",
                id: row.try_get::<i64, _>("id")?,
                missing_reference: "xref",
                missing_id: 0,
            });
        }
        Ok(out)
    }
}
