use thiserror::Error;

use sealpost_crypto::CryptoError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The server refused the auth proof. Retry with a fresh one.
    #[error("Server refused authentication")]
    Unauthorized,

    #[error("Not a usable server URL: {0:?}")]
    InvalidServerUrl(String),

    #[error("No user named {0:?} on the server")]
    UnknownRecipient(String),

    #[error("Unexpected response status {0}")]
    UnexpectedStatus(reqwest::StatusCode),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
