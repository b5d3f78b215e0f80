use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

/// Failure of one source adapter. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("source {source_id} unavailable: {reason}")]
    Unavailable { source_id: String, reason: String },

    #[error("could not parse source {source_id}: {reason}")]
    Parse { source_id: String, reason: String },
}

impl SourceError {
    pub fn unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn source_id(&self) -> &str {
        match self {
            Self::Unavailable { source_id, .. } | Self::Parse { source_id, .. } => source_id,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("record from {0} has neither a resolvable URL nor a title")]
    MissingIdentity(String),

    #[error("record from {source_id} has no title and an unusable URL {url:?}")]
    InvalidUrl { source_id: String, url: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    /// Timeouts, rate limiting, server errors, unparseable model output.
    #[error("transient enrichment failure: {0}")]
    Transient(String),

    /// Malformed input, rejected credentials, definitive quota exhaustion.
    #[error("permanent enrichment failure: {0}")]
    Permanent(String),
}

impl EnrichmentError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for EnrichmentError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) if is_transient_status(status.as_u16()) => Self::Transient(e.to_string()),
            Some(_) => Self::Permanent(e.to_string()),
            // timeouts, connect failures, truncated bodies
            None => Self::Transient(e.to_string()),
        }
    }
}

/// HTTP statuses worth retrying against an AI endpoint.
pub fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(503));
        assert!(is_transient_status(408));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(401));
        assert!(!is_transient_status(404));
    }

    #[test]
    fn test_source_error_id() {
        let err = SourceError::unavailable("appworks", "connection refused");
        assert_eq!(err.source_id(), "appworks");
        assert_eq!(err.to_string(), "source appworks unavailable: connection refused");
    }
}
