//! Error type shared by every handle, the ORM layer and the formula helpers.

use reqwest::Method;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Constructor arguments were mixed in a combination that is not allowed,
    /// e.g. an `Api` instance together with a `Base` instance.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A request option failed validation before anything was sent.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    #[error("no API key provided (set AIRTABLE_API_KEY or pass one explicitly)")]
    MissingApiKey,

    /// The API answered with a non-success status.
    #[error("{method} {url} failed with status {status}: {message}")]
    Api {
        method: Method,
        url: String,
        status: u16,
        kind: Option<String>,
        message: String,
    },

    /// Every retry was answered with HTTP 429.
    #[error("rate limited by {url}: gave up after {attempts} attempts")]
    RateLimited { url: String, attempts: u32 },

    #[error("model error: {0}")]
    Model(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::RateLimited { .. } => Some(429),
            Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_of_api_error() {
        let err = Error::Api {
            method: Method::GET,
            url: "https://api.airtable.com/v0/app/tbl/rec".to_string(),
            status: 404,
            kind: Some("NOT_FOUND".to_string()),
            message: "Could not find what you are looking for".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(err.is_not_found());
        assert!(err.to_string().contains("status 404"));
    }

    #[test]
    fn test_rate_limited_reports_429() {
        let err = Error::RateLimited {
            url: "https://api.airtable.com/v0/app/tbl".to_string(),
            attempts: 6,
        };
        assert_eq!(err.status(), Some(429));
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("6 attempts"));
    }
}
