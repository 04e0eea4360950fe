use std::collections::HashMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use rsa::{Oaep, Pss};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use sealpost_types::time;

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Separator between encrypted chunks. Never produced by base64.
pub const CHUNK_DELIMITER: &str = "|";

const DIGEST_LEN: usize = 32;

/// Username → public key, as known to one party.
pub trait PeerDirectory {
    fn public_key(&self, username: &str) -> Option<&PublicKey>;
}

impl PeerDirectory for HashMap<String, PublicKey> {
    fn public_key(&self, username: &str) -> Option<&PublicKey> {
        self.get(username)
    }
}

/// Wire form of a sealed message: base64 RSA-OAEP chunks joined by `|`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherEnvelope(String);

impl CipherEnvelope {
    /// Accept text from the wire if its framing is well formed: at least one
    /// chunk, every chunk non-empty base64. Contents are not decrypted.
    pub fn from_wire(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        let well_formed = !text.is_empty()
            && text
                .split(CHUNK_DELIMITER)
                .all(|chunk| !chunk.is_empty() && BASE64.decode(chunk).is_ok());
        well_formed.then_some(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn chunk_count(&self) -> usize {
        self.0.split(CHUNK_DELIMITER).count()
    }
}

impl fmt::Display for CipherEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A verified, decrypted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainEnvelope {
    pub sender: String,
    pub recipient: String,
    pub timestamp: DateTime<Utc>,
    pub body: String,
    /// SHA-256 over `sender recipient timestamp body`.
    pub digest: Vec<u8>,
    /// Sender's RSA-PSS signature over `digest`.
    pub signature: Vec<u8>,
}

/// Why an envelope was not accepted. A rejected envelope carries no content.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("envelope could not be decoded")]
    Malformed,

    /// Retry once after fetching `sender`'s key.
    #[error("sender {sender:?} is not in the peer directory")]
    UnknownSender { sender: String },

    #[error("integrity digest mismatch")]
    IntegrityMismatch,

    #[error("sender signature does not verify")]
    AuthenticityFailure,
}

/// Canonical serialization, encrypted chunk by chunk. Field order is fixed.
#[derive(Serialize, Deserialize)]
struct SealedFields {
    sender: String,
    recipient: String,
    #[serde(with = "sealpost_types::time::iso")]
    time: DateTime<Utc>,
    body: String,
    digest: String,
    signature: String,
}

/// Sign-then-encrypt `body` from `sender` to `recipient`.
pub fn seal(
    sender_key: &KeyPair,
    recipient_key: &PublicKey,
    sender: &str,
    recipient: &str,
    timestamp: DateTime<Utc>,
    body: &str,
) -> Result<CipherEnvelope, CryptoError> {
    let timestamp = time::normalize(timestamp);
    let digest = integrity_digest(sender, recipient, &timestamp, body);

    // PSS over the digest itself; the scheme does not hash again
    let signature = sender_key
        .rsa_private()
        .sign_with_rng(&mut OsRng, Pss::new::<Sha256>(), &digest)
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    let fields = SealedFields {
        sender: sender.to_string(),
        recipient: recipient.to_string(),
        time: timestamp,
        body: body.to_string(),
        digest: BASE64.encode(digest),
        signature: BASE64.encode(signature),
    };

    encrypt_payload(recipient_key, &serde_json::to_vec(&fields)?)
}

/// Decrypt and verify an envelope addressed to `receiver_key`.
pub fn open<P>(
    receiver_key: &KeyPair,
    peers: &P,
    cipher: &CipherEnvelope,
) -> Result<PlainEnvelope, Rejection>
where
    P: PeerDirectory + ?Sized,
{
    let payload = decrypt_payload(receiver_key, cipher)?;
    let fields: SealedFields = serde_json::from_slice(&payload).map_err(|_| Rejection::Malformed)?;
    let digest = BASE64.decode(&fields.digest).map_err(|_| Rejection::Malformed)?;
    let signature = BASE64.decode(&fields.signature).map_err(|_| Rejection::Malformed)?;

    let sender_key = peers
        .public_key(&fields.sender)
        .ok_or_else(|| Rejection::UnknownSender {
            sender: fields.sender.clone(),
        })?;

    let expected = integrity_digest(&fields.sender, &fields.recipient, &fields.time, &fields.body);
    if expected.as_slice() != digest.as_slice() {
        return Err(Rejection::IntegrityMismatch);
    }

    sender_key
        .rsa()
        .verify(Pss::new::<Sha256>(), &expected, &signature)
        .map_err(|_| Rejection::AuthenticityFailure)?;

    Ok(PlainEnvelope {
        sender: fields.sender,
        recipient: fields.recipient,
        timestamp: fields.time,
        body: fields.body,
        digest,
        signature,
    })
}

/// Largest chunk encrypted in one RSA-OAEP-SHA256 operation under `key`:
/// one byte below the scheme's `k - 2·hLen - 2` capacity.
pub fn chunk_len(key: &PublicKey) -> Result<usize, CryptoError> {
    let capacity = key.modulus_len().saturating_sub(2 * DIGEST_LEN + 2);
    if capacity < 2 {
        return Err(CryptoError::KeyTooSmall(key.modulus_len()));
    }
    Ok(capacity - 1)
}

fn integrity_digest(
    sender: &str,
    recipient: &str,
    timestamp: &DateTime<Utc>,
    body: &str,
) -> [u8; DIGEST_LEN] {
    let canonical = format!("{} {} {} {}", sender, recipient, time::to_iso(timestamp), body);
    Sha256::digest(canonical.as_bytes()).into()
}

fn encrypt_payload(key: &PublicKey, payload: &[u8]) -> Result<CipherEnvelope, CryptoError> {
    let chunk_len = chunk_len(key)?;
    let chunks = payload
        .chunks(chunk_len)
        .map(|chunk| {
            key.rsa()
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), chunk)
                .map(|ciphertext| BASE64.encode(ciphertext))
                .map_err(CryptoError::Encryption)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CipherEnvelope(chunks.join(CHUNK_DELIMITER)))
}

fn decrypt_payload(key: &KeyPair, cipher: &CipherEnvelope) -> Result<Vec<u8>, Rejection> {
    let mut payload = Vec::new();
    for chunk in cipher.as_str().split(CHUNK_DELIMITER) {
        let ciphertext = BASE64.decode(chunk).map_err(|_| Rejection::Malformed)?;
        let plaintext = key
            .rsa_private()
            .decrypt(Oaep::new::<Sha256>(), &ciphertext)
            .map_err(|_| Rejection::Malformed)?;
        payload.extend_from_slice(&plaintext);
    }
    Ok(payload)
}
