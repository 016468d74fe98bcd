use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid period format: {0}")]
    PeriodParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Dependency cycle involving metric {0}")]
    DependencyCycle(String),

    #[error("Metric {metric} is evaluated before its dependency {dependency}")]
    DependencyOrder { metric: String, dependency: String },

    #[error("Invalid label filter: {0}")]
    InvalidFilter(String),

    #[error("{report} requires the {capability} capability to be enabled")]
    MissingCapability { report: String, capability: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::InvalidFilter(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
