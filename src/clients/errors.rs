use rspotify::ClientError;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the clients and the genre pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Transport failure talking to the Web API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Web API answered with a non-2xx status
    #[error("Unexpected status {status} from {url}")]
    Status {
        /// Requested URL, without query
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Failure inside rspotify, used for sign-in and token refresh
    #[error("Spotify error: {0}")]
    Spotify(#[from] ClientError),

    /// Response or file body is not valid JSON
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// Invalid or missing settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Local file access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No usable Spotify token
    #[error("Authorization error: {0}")]
    Authorization(String),

    /// The genre table is invalid
    #[error("Genre map error: {0}")]
    GenreMap(String),

    /// Fatal failure of a genre extraction
    #[error("Failed to extract genres: {0}")]
    GenreExtraction(#[source] Box<Error>),
}

impl Error {
    /// Wraps a pipeline failure, leaving an already wrapped error untouched.
    #[must_use]
    pub fn extraction(err: Error) -> Self {
        match err {
            Error::GenreExtraction(_) => err,
            other => Error::GenreExtraction(Box::new(other)),
        }
    }
}
