use thiserror::Error;

#[derive(Debug, Error)]
pub enum RsvError {
    /// The scheduler or resource manager could not answer a query.
    #[error("Query error: {0}")]
    Query(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RsvError {
    /// Wraps a failure of the scheduler/resource manager transport, keeping its full context.
    pub fn query(error: anyhow::Error) -> Self {
        Self::Query(format!("{error:#}"))
    }
}

impl From<toml::de::Error> for RsvError {
    fn from(error: toml::de::Error) -> Self {
        Self::Config(error.to_string())
    }
}
