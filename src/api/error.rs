use reqwest::StatusCode;
use thiserror::Error;

/// Failures that end a request to the chat service or repo manager.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot reach '{url}': {source}. Is the service running?")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to '{url}' timed out: {source}")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("'{url}' returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("failed to decode JSON response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("response stream ended inside a JSON object ({pending} bytes pending)")]
    Truncated { pending: usize },

    #[error("API error: {0}")]
    Server(String),
}

impl ApiError {
    pub(crate) fn from_reqwest(error: reqwest::Error, url: &str) -> Self {
        let url = url.to_string();
        if error.is_connect() {
            ApiError::Connect { url, source: error }
        } else if error.is_timeout() {
            ApiError::Timeout { url, source: error }
        } else {
            ApiError::Request { url, source: error }
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
