use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimpleTsdbError {
    /// The server rejected the request (HTTP 400). Carries the server's message verbatim.
    #[error("{0}")]
    BadRequest(String),

    #[error("internal server error")]
    InternalServerError,

    #[error("unexpected status code: {0}")]
    UnexpectedStatus(u16),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SimpleTsdbError {
    /// True for failures below the HTTP status layer: connection, I/O,
    /// timeouts and malformed response bodies. Body stream I/O errors arrive
    /// wrapped in `Http`.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            SimpleTsdbError::Http(_) | SimpleTsdbError::Serialization(_)
        )
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            SimpleTsdbError::BadRequest(_) => Some(400),
            SimpleTsdbError::InternalServerError => Some(500),
            SimpleTsdbError::UnexpectedStatus(code) => Some(*code),
            SimpleTsdbError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type SimpleTsdbResult<T> = Result<T, SimpleTsdbError>;
