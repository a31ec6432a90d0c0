// Error types for the Trellis router

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Invalid route pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Response already sent")]
    ResponseAlreadySent,

    #[error("{0}")]
    Handler(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Handler panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a handler failure from any displayable message.
    pub fn handler(message: impl Into<String>) -> Self {
        Error::Handler(message.into())
    }

    /// HTTP status the dispatcher reports for this error.
    ///
    /// Only a missed route maps to 404; every failure raised while the
    /// pipeline runs is reported as 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::RouteNotFound(_) => 404,
            _ => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Error::Deserialization(err.to_string())
        } else {
            Error::Serialization(err.to_string())
        }
    }
}
