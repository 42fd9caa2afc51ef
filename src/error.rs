//! Typed error kinds for the loader.
//!
//! Call sites use `anyhow::Result` (re-exported here as [`Result`]) so that
//! `?` composes freely with `sqlx`/`std::io` errors; [`LoaderError`] is the
//! subset of failures the orchestrator needs to distinguish by kind (e.g. a
//! `Config` error must abort before any write, while a `DataWarning` never
//! becomes an `Err` at all - see [`crate::warnings`]).

pub type Result<T> = anyhow::Result<T>;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Missing required DB params, missing `external_db` for a transferable
    /// source, missing mandatory parser fields. Fatal before any write.
    #[error("configuration error: {0}")]
    Config(String),

    /// Failed upsert, unlinked entries detected by QC, duplicate-type source
    /// after the biomart fix. Rolls back the current phase, fatal.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Connection drop or similar I/O failure. Not auto-retried; the phase
    /// rolls back and the operator restarts the run.
    #[error("transient I/O error: {0}")]
    TransientIo(#[source] sqlx::Error),
}

impl LoaderError {
    pub fn config(msg: impl Into<String>) -> anyhow::Error {
        LoaderError::Config(msg.into()).into()
    }

    pub fn integrity(msg: impl Into<String>) -> anyhow::Error {
        LoaderError::Integrity(msg.into()).into()
    }
}

impl From<sqlx::Error> for LoaderError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                LoaderError::TransientIo(err)
            }
            _ => LoaderError::Integrity(err.to_string()),
        }
    }
}
