use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(#[source] rsa::Error),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    /// Wrong or missing passphrase for a protected private key.
    #[error("Could not unlock private key")]
    KeyUnlock,

    #[error("Key too small to encrypt any payload ({0} bytes modulus)")]
    KeyTooSmall(usize),

    #[error("Encryption failed: {0}")]
    Encryption(#[source] rsa::Error),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}
