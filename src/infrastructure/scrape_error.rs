//! Error types for target construction, rendering and fetching
//!
//! Every variant carries the identity of the target it concerns so a failure
//! can be traced back to its source document.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("target has no content: {target}")]
    ContentMissing { target: String },

    #[error("failed deserializing content of {target}: {reason}")]
    Marshalling { target: String, reason: String },

    #[error("failed rendering the node hierarchy to text: {target}")]
    Rendering {
        target: String,
        #[source]
        source: std::fmt::Error,
    },

    #[error("cannot render empty target")]
    EmptyTarget,

    #[error("target must be loaded before use: {target}")]
    NotLoaded { target: String },

    #[error("cannot locate root for given target: {target} (found {roots} roots)")]
    AmbiguousTarget { target: String, roots: usize },

    #[error("unknown target type to scrape: {kind}")]
    UnknownTargetType { kind: String },

    #[error("invalid URI {uri}")]
    InvalidUri {
        uri: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed reaching URI: {uri}")]
    Uri {
        uri: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP request failed with status {status}: {uri}")]
    HttpStatus { uri: String, status: u16 },

    #[error("failed reading content from {target}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl ScrapeError {
    pub fn content_missing(target: impl Into<String>) -> Self {
        Self::ContentMissing {
            target: target.into(),
        }
    }

    pub fn marshalling(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Marshalling {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub fn unknown_target_type(kind: impl Into<String>) -> Self {
        Self::UnknownTargetType { kind: kind.into() }
    }

    /// Whether a scraper may fall back to the empty target instead of failing
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ContentMissing { .. } => true,
            Self::Marshalling { .. } => true,
            Self::AmbiguousTarget { .. } => true,
            Self::HttpStatus { status, .. } => *status < 500,
            Self::Rendering { .. } => false,
            Self::EmptyTarget => false,
            Self::NotLoaded { .. } => false,
            Self::UnknownTargetType { .. } => false,
            Self::InvalidUri { .. } => false,
            Self::Uri { .. } => false,
            Self::Io { .. } => false,
            Self::Configuration { .. } => false,
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_target_identity() {
        let err = ScrapeError::content_missing("https://example.com[200]");
        assert_eq!(err.to_string(), "target has no content: https://example.com[200]");

        let err = ScrapeError::AmbiguousTarget {
            target: "node <tr>".into(),
            roots: 0,
        };
        assert!(err.to_string().contains("node <tr>"));
        assert_eq!(ScrapeError::EmptyTarget.to_string(), "cannot render empty target");
    }

    #[test]
    fn test_recoverability() {
        assert!(ScrapeError::content_missing("buffer").is_recoverable());
        assert!(ScrapeError::marshalling("buffer", "invalid utf-8").is_recoverable());
        assert!(!ScrapeError::unknown_target_type("ftp").is_recoverable());
        assert!(!ScrapeError::EmptyTarget.is_recoverable());
        assert!(!ScrapeError::NotLoaded { target: "u[200]".into() }.is_recoverable());
        assert!(ScrapeError::HttpStatus { uri: "u".into(), status: 404 }.is_recoverable());
        assert!(!ScrapeError::HttpStatus { uri: "u".into(), status: 503 }.is_recoverable());
    }
}
