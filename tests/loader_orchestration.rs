//! End-to-end `Loader::update` runs against the in-memory fakes in
//! `tests/common` - no live Postgres involved.

mod common;

use common::{FakeCore, FakeStaging};
use std::sync::Arc;
use xref_loader::config::{DatabaseConnectionSpec, LoaderConfig};
use xref_loader::model::staging::{Source, StagingIdentityXref, StagingObjectXref, StagingXref};
use xref_loader::Loader;

fn config() -> LoaderConfig {
    LoaderConfig {
        staging: DatabaseConnectionSpec {
            url: "postgres://localhost/staging".into(),
            user: None,
            password: None,
        },
        core: DatabaseConnectionSpec {
            url: "postgres://localhost/core".into(),
            user: None,
            password: None,
        },
        species_id: 9606,
        verbose: false,
        dumpcheck: false,
        nofarm: true,
        queue: None,
        exonerate: None,
    }
}

fn source(id: i32, name: &str) -> Source {
    Source {
        source_id: id,
        name: name.to_string(),
        priority: 1,
        priority_description: "DIRECT".to_string(),
        release: None,
    }
}

fn direct_xref(xref_id: i64, source_id: i32, accession: &str) -> StagingXref {
    StagingXref {
        xref_id,
        accession: accession.to_string(),
        label: Some(accession.to_string()),
        version: 1,
        description: Some("a test xref".to_string()),
        info_type: "DIRECT".to_string(),
        info_text: String::new(),
        source_id,
        species_id: 9606,
        dumped: None,
    }
}

fn object_xref(object_xref_id: i64, xref_id: i64, ensembl_id: i64) -> StagingObjectXref {
    StagingObjectXref {
        object_xref_id,
        xref_id,
        ensembl_id,
        ensembl_object_type: "Gene".to_string(),
        ox_status: "DUMP_OUT".to_string(),
        master_xref_id: None,
        linkage_annotation: None,
    }
}

#[tokio::test]
async fn direct_xref_is_mapped_onto_its_gene() {
    let staging = FakeStaging {
        sources: vec![source(1, "HGNC")],
        ..Default::default()
    };
    staging
        .xrefs
        .lock()
        .unwrap()
        .insert(100, direct_xref(100, 1, "HGNC:1"));
    staging
        .object_xrefs
        .lock()
        .unwrap()
        .insert(1, object_xref(1, 100, 5000));

    let core = FakeCore::default().with_external_db("HGNC");

    let loader = Loader::new(Arc::new(staging), Arc::new(core.clone()), config());
    let stats = loader.update().await.unwrap();

    assert_eq!(stats.num_mapped.get(), 1);
    assert_eq!(core.xrefs.lock().unwrap().len(), 1);
    let (_, new_xref) = core.xrefs.lock().unwrap().values().next().unwrap().clone();
    assert_eq!(new_xref.accession, "HGNC:1");
    assert_eq!(core.object_xrefs.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dependent_xref_links_to_its_already_mapped_master() {
    let staging = FakeStaging {
        sources: vec![source(1, "HGNC"), source(2, "RefSeq_dna")],
        ..Default::default()
    };
    staging
        .xrefs
        .lock()
        .unwrap()
        .insert(100, direct_xref(100, 1, "HGNC:1"));
    staging
        .object_xrefs
        .lock()
        .unwrap()
        .insert(1, object_xref(1, 100, 5000));

    let mut dependent = direct_xref(200, 2, "NM_000001");
    dependent.info_type = "DEPENDENT".to_string();
    staging.xrefs.lock().unwrap().insert(200, dependent);
    staging
        .object_xrefs
        .lock()
        .unwrap()
        .insert(2, object_xref(2, 200, 5000));
    staging
        .dependent_links
        .lock()
        .unwrap()
        .insert(200, (Some(100), Some(2)));

    let core = FakeCore::default()
        .with_external_db("HGNC")
        .with_external_db("RefSeq_dna");

    let loader = Loader::new(Arc::new(staging), Arc::new(core.clone()), config());
    let stats = loader.update().await.unwrap();

    assert_eq!(stats.num_mapped.get(), 2);
    assert_eq!(stats.num_dependent_edges.get(), 1);
    let deps = core.dependent_xrefs.lock().unwrap();
    assert_eq!(deps.len(), 1);
    // master_xref_id on the dependent edge must equal the master's own core xref id.
    let master_core_id = *core
        .xrefs
        .lock()
        .unwrap()
        .iter()
        .find(|(_, (key, _))| key.accession == "HGNC:1")
        .unwrap()
        .0;
    assert_eq!(deps[0].master_xref_id, master_core_id);
}

#[tokio::test]
async fn xref_without_an_object_xref_falls_through_to_unmapped() {
    let staging = FakeStaging {
        sources: vec![source(1, "HGNC")],
        ..Default::default()
    };
    staging
        .xrefs
        .lock()
        .unwrap()
        .insert(100, direct_xref(100, 1, "HGNC:1"));
    // Deliberately no matching object_xref row - nothing to map it onto.

    let core = FakeCore::default().with_external_db("HGNC");

    let loader = Loader::new(Arc::new(staging.clone()), Arc::new(core.clone()), config());
    let stats = loader.update().await.unwrap();

    assert_eq!(stats.num_mapped.get(), 0);
    assert_eq!(stats.num_unmapped.get(), 1);
    assert_eq!(core.unmapped_objects.lock().unwrap().len(), 1);
    assert_eq!(core.unmapped_objects.lock().unwrap()[0].identifier, "HGNC:1");
    // DIRECT xrefs with no object_xref to hang off are "no stable id", not
    // any of the other four unmapped reasons.
    assert_eq!(core.unmapped_objects.lock().unwrap()[0].unmapped_reason_id, 1);
    let staging_xref = staging.xrefs.lock().unwrap().get(&100).unwrap().clone();
    assert_eq!(staging_xref.dumped.as_deref(), Some("UNMAPPED_NO_STABLE_ID"));
}

#[tokio::test]
async fn identity_xref_row_is_recorded_alongside_the_object_xref() {
    let staging = FakeStaging {
        sources: vec![source(1, "UniProt")],
        ..Default::default()
    };
    let mut xref = direct_xref(100, 1, "P12345");
    xref.info_type = "SEQUENCE_MATCH".to_string();
    staging.xrefs.lock().unwrap().insert(100, xref);
    staging
        .object_xrefs
        .lock()
        .unwrap()
        .insert(1, object_xref(1, 100, 7000));
    staging.identities.lock().unwrap().insert(
        1,
        StagingIdentityXref {
            object_xref_id: 1,
            query_identity: 98,
            target_identity: 97,
            hit_start: 1,
            hit_end: 100,
            translation_start: 1,
            translation_end: 100,
            cigar_line: Some("100M".to_string()),
            score: Some(450.0),
            evalue: None,
        },
    );

    let core = FakeCore::default().with_external_db("UniProt");
    let loader = Loader::new(Arc::new(staging), Arc::new(core.clone()), config());
    let stats = loader.update().await.unwrap();

    assert_eq!(stats.num_mapped.get(), 1);
    assert_eq!(core.identity_xrefs.lock().unwrap().len(), 1);
    assert_eq!(core.identity_xrefs.lock().unwrap()[0].1.query_identity, 98);
}

#[tokio::test]
async fn a_clean_run_records_every_phase_through_core_loaded() {
    let staging = FakeStaging {
        sources: vec![source(1, "HGNC")],
        ..Default::default()
    };
    let core = FakeCore::default().with_external_db("HGNC");

    let loader = Loader::new(Arc::new(staging.clone()), Arc::new(core.clone()), config());
    loader.update().await.unwrap();

    let phases: Vec<String> = staging
        .process_status
        .lock()
        .unwrap()
        .iter()
        .map(|row| row.status.clone())
        .collect();
    assert_eq!(
        phases,
        vec![
            "parsing_finished",
            "mapping_finished",
            "alt_alleles_added",
            "alt_alleles_processed",
            "biomart_test_finished",
            "source_level_move_finished",
            "core_loaded",
        ]
    );
}
