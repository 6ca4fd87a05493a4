//! Error types shared by the ingestion pipeline

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Network failure: refused connection, DNS, timeout, broken body stream
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    /// Unparseable playlist, XML or JSON payload
    #[error("format error: {0}")]
    Format(String),

    /// The Xtream panel rejected the credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Fewer bytes arrived than the server declared
    #[error("incomplete download: {written} of {expected} bytes")]
    Integrity { written: u64, expected: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
