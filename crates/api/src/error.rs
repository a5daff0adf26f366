//! Error types for the remote API client.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    /// A response parsed but lacked something the client needs.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("export failed on the server")]
    ExportFailed,

    #[error("export not ready after {waited_secs}s")]
    ExportTimeout { waited_secs: u64 },
}

pub type Result<T> = std::result::Result<T, ApiError>;
