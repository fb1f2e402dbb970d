//! Error handling module

use thiserror::Error;

/// Errors raised by calls against the tado API
#[derive(Error, Debug)]
pub enum TadoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Server replied with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Account has no homes")]
    NoHome,

    #[error("Unexpected presence value: {0}")]
    UnexpectedPresence(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl TadoError {
    /// Whether the session should be discarded before the next call
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, TadoError::Unauthorized)
    }
}

/// Errors raised while reading a single mobile device record
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Device {device}: malformed record: {source}")]
    Malformed {
        device: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Device {device}: missing field '{field}'")]
    MissingField { device: String, field: &'static str },
}
