//! Error types for the admin console

use thiserror::Error;

/// Shown when the server did not send a readable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "요청을 처리하지 못했습니다. 잠시 후 다시 시도해 주세요.";

/// Shown for 401/403 responses without a body message.
pub const AUTH_FAILURE_MESSAGE: &str = "권한이 없습니다. 다시 로그인해 주세요.";

#[derive(Error, Debug)]
pub enum Error {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Authorization required: {0}")]
    AuthorizationRequired(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Spreadsheet format error: {0}")]
    SpreadsheetFormat(String),

    #[error("Failed to read spreadsheet: {0}")]
    SpreadsheetRead(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short text suitable for an inline section error.
    ///
    /// Server-provided messages are passed through untouched; transport and
    /// decoding failures collapse into the generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            Error::Api { message, .. } if !message.is_empty() => message.clone(),
            Error::AuthorizationRequired(message) if !message.is_empty() => message.clone(),
            Error::AuthorizationRequired(_) => AUTH_FAILURE_MESSAGE.to_string(),
            Error::SpreadsheetFormat(message) => message.clone(),
            Error::SpreadsheetRead(message) => format!("파일을 읽을 수 없습니다: {}", message),
            Error::InvalidArgument(message) => message.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// True for failures a re-login would fix.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::AuthorizationRequired(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::SerializationError(err.to_string())
        } else {
            Error::ConnectionError(err.to_string())
        }
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::SpreadsheetRead(err.to_string())
    }
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::SpreadsheetRead(err.to_string())
    }
}
