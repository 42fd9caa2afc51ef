//! Immutable, typed configuration, validated and built once at startup
//! rather than accumulated through getters and setters, then passed by
//! reference to everything that needs it.

use crate::prelude::*;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConnectionSpec {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl DatabaseConnectionSpec {
    /// Returns a connection string with `user`/`password` overlaid onto
    /// `url` when present, so callers never have to special-case the two
    /// ways a database can be addressed.
    pub fn connection_string(&self) -> String {
        let (user, password) = match (&self.user, &self.password) {
            (None, None) => return self.url.clone(),
            (user, password) => (
                user.clone().unwrap_or_default(),
                password.clone().unwrap_or_default(),
            ),
        };
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let host_part = match rest.split_once('@') {
            Some((_, host)) => host,
            None => rest,
        };
        format!("{scheme}://{user}:{password}@{host_part}")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoaderConfig {
    pub staging: DatabaseConnectionSpec,
    pub core: DatabaseConnectionSpec,
    pub species_id: i32,

    #[serde(default)]
    pub verbose: bool,
    /// When true, only report what would be loaded; no writes are made.
    #[serde(default)]
    pub dumpcheck: bool,
    /// When true, do not farm work out to a job queue (single-process run).
    #[serde(default = "default_true")]
    pub nofarm: bool,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub exonerate: Option<String>,
}

fn default_true() -> bool {
    true
}

impl LoaderConfig {
    /// `analysis.logic_name` the loader's `object_xref` rows are attached
    /// to. Derived from `exonerate` when set (a distinct exonerate run gets
    /// its own analysis), otherwise a fixed name.
    pub fn analysis_logic_name(&self) -> &str {
        self.exonerate.as_deref().unwrap_or("xrefexoneratedna")
    }

    pub fn validate(&self) -> Result<()> {
        if self.staging.url.is_empty() {
            return Err(LoaderError::config("staging database url is required"));
        }
        if self.core.url.is_empty() {
            return Err(LoaderError::config("core database url is required"));
        }
        if self.species_id <= 0 {
            return Err(LoaderError::config("species_id must be a positive integer"));
        }
        Ok(())
    }

    /// Loads configuration from a layered source: built-in defaults, an
    /// optional file, then environment variables prefixed `XREF_LOADER`
    /// (e.g. `XREF_LOADER_CORE__URL`), mirroring `settings::Settings` in
    /// spirit but widened to this crate's two-database shape.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("nofarm", true)?
            .set_default("verbose", false)?
            .set_default("dumpcheck", false)?;
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("XREF_LOADER")
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder.build()?;
        let this: LoaderConfig = settings.try_deserialize()?;
        this.validate()?;
        Ok(this)
    }
}
