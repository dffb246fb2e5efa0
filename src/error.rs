//! Error types for ryt-resolver

use thiserror::Error;

/// Main error type for resolution operations
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The embedded player response could not be located or parsed.
    /// Aborts the whole resolution.
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// A cipher string lacked `url` or `s`. Only that stream is affected.
    #[error("Cipher parse error: {0}")]
    CipherParse(String),

    /// No structural pattern matched the player script
    #[error("Transform function not found: {0}")]
    PatternNotFound(String),

    /// A located function or helper could not be cut out of the script
    #[error("Function extraction error: {0}")]
    FunctionExtraction(String),

    /// The sandbox failed to evaluate or call the transform
    #[error("Execution error: {0}")]
    Execution(String),

    /// The decipherer for this script version is unusable
    #[error("Decipherer unusable: {0}")]
    EngineUnusable(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("No playable stream matches the criteria")]
    NoStreamFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl ResolveError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolveError::Network(e) => e.is_timeout() || e.is_connect(),
            ResolveError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if error only degrades a single stream rather than the whole catalog
    pub fn is_stream_scoped(&self) -> bool {
        matches!(
            self,
            ResolveError::CipherParse(_)
                | ResolveError::PatternNotFound(_)
                | ResolveError::FunctionExtraction(_)
                | ResolveError::Execution(_)
                | ResolveError::EngineUnusable(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_scoped_errors() {
        assert!(ResolveError::CipherParse("missing s".into()).is_stream_scoped());
        assert!(ResolveError::Execution("boom".into()).is_stream_scoped());
        assert!(!ResolveError::Extraction("no anchor".into()).is_stream_scoped());
        assert!(!ResolveError::NoStreamFound.is_stream_scoped());
    }

    #[test]
    fn test_retryable_status() {
        let err = ResolveError::HttpStatus {
            status: 503,
            url: "https://example.com".into(),
        };
        assert!(err.is_retryable());

        let err = ResolveError::HttpStatus {
            status: 404,
            url: "https://example.com".into(),
        };
        assert!(!err.is_retryable());
        assert!(!ResolveError::CipherParse("x".into()).is_retryable());
    }
}
