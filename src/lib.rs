//! Syncs xref annotations from a staging database into a core
//! genome-annotation database: per-source mapped/unmapped classification,
//! alt-allele propagation, and BioMart type normalisation.

pub mod alt_allele;
pub mod biomart;
pub mod config;
pub mod core_store;
pub mod error;
pub mod loader;
pub mod model;
pub mod namespace;
pub mod offsets;
pub mod prelude;
pub mod process_status;
pub mod quality;
pub mod staging_store;
pub mod stats;
pub mod unmapped_reasons;
pub mod warnings;

pub use config::LoaderConfig;
pub use error::{LoaderError, Result};
pub use loader::Loader;
