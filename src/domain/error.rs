use std::fmt;

use thiserror::Error;

/// Stage of a billing query pass that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStage {
    /// Resolving the identity the report location is derived from
    Identity,
    /// Listing or downloading report objects
    Fetch,
    /// Parsing a downloaded report
    Parse,
}

impl fmt::Display for QueryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => write!(f, "identity"),
            Self::Fetch => write!(f, "fetch"),
            Self::Parse => write!(f, "parse"),
        }
    }
}

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Object store error: {message}")]
    ObjectStore { message: String },

    #[error("Directory service error: {message}")]
    Directory { message: String },

    #[error("Parse error: {message}")]
    Parse { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Authentication error: {message}")]
    Authentication { message: String },

    #[error("Metrics error: {message}")]
    Metrics { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("{provider} query failed during {stage}: {source}")]
    Query {
        provider: String,
        stage: QueryStage,
        #[source]
        source: Box<DomainError>,
    },
}

impl DomainError {
    pub fn object_store(message: impl Into<String>) -> Self {
        Self::ObjectStore {
            message: message.into(),
        }
    }

    pub fn directory(message: impl Into<String>) -> Self {
        Self::Directory {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn metrics(message: impl Into<String>) -> Self {
        Self::Metrics {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wrap an error with the provider and query stage it surfaced from
    pub fn query(provider: impl Into<String>, stage: QueryStage, source: DomainError) -> Self {
        Self::Query {
            provider: provider.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// Stage of the query pass, if this error was raised by one
    pub fn stage(&self) -> Option<QueryStage> {
        match self {
            Self::Query { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<prometheus::Error> for DomainError {
    fn from(e: prometheus::Error) -> Self {
        Self::metrics(e.to_string())
    }
}
