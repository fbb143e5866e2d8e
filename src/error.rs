// Error type for the unification library
//
// Storage failures are passed through untouched. Data inconsistencies are
// never errors here: they shrink a resolved set or show up as repair findings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnifyError {
    /// SQLite failure (connectivity, constraint, malformed SQL)
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A store lock was poisoned by a panicking writer
    #[error("store lock poisoned: {0}")]
    Poisoned(String),
}

impl UnifyError {
    pub(crate) fn poisoned<T>(err: std::sync::PoisonError<T>) -> Self {
        UnifyError::Poisoned(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, UnifyError>;
