//! Error types for quill-ai

use thiserror::Error;

/// Result type alias using quill-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the completion endpoint
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Endpoint answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Bearer credential is not present in the environment
    #[error("Missing {0}")]
    MissingCredential(String),

    /// The response body ended abnormally
    #[error("Stream error: {0}")]
    Stream(String),
}

impl Error {
    /// Create an API error from a status code and response body
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Whether the error means the request never reached the model
    pub fn is_credential(&self) -> bool {
        matches!(self, Error::MissingCredential(_))
            || matches!(self, Error::Api { status, .. } if *status == 401 || *status == 403)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let e = Error::api(429, "Too Many Requests");
        assert_eq!(e.to_string(), "HTTP 429: Too Many Requests");
    }

    #[test]
    fn test_missing_credential_display() {
        let e = Error::MissingCredential("OPENAI_API_KEY".into());
        assert_eq!(e.to_string(), "Missing OPENAI_API_KEY");
        assert!(e.is_credential());
    }

    #[test]
    fn test_credential_statuses() {
        assert!(Error::api(401, "Unauthorized").is_credential());
        assert!(Error::api(403, "Forbidden").is_credential());
        assert!(!Error::api(500, "Internal").is_credential());
        assert!(!Error::Stream("reset".into()).is_credential());
    }
}
