use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use rand_core::OsRng;
use rsa::pss::{BlindedSigningKey, Signature, VerifyingKey};
use rsa::signature::{RandomizedSigner, SignatureEncoding, Verifier};
use sha2::Sha256;

use sealpost_types::time;

use crate::error::CryptoError;
use crate::keys::{KeyPair, PublicKey};

/// Proof that the holder of `username`'s private key asked for something at
/// `timestamp`. The server accepts each timestamp at most once per user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthProof {
    pub username: String,
    pub timestamp: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl AuthProof {
    /// Rebuild a proof from its wire fields.
    pub fn from_wire(
        username: impl Into<String>,
        timestamp: DateTime<Utc>,
        signature_b64: &str,
    ) -> Result<Self, CryptoError> {
        Ok(Self {
            username: username.into(),
            timestamp: time::normalize(timestamp),
            signature: BASE64.decode(signature_b64)?,
        })
    }

    pub fn signature_b64(&self) -> String {
        BASE64.encode(&self.signature)
    }
}

/// The signed string: `"<username> <iso timestamp>"`.
fn proof_message(username: &str, timestamp: &DateTime<Utc>) -> String {
    format!("{} {}", username, time::to_iso(timestamp))
}

/// Sign `username` and `now` with RSA-PSS over the message itself.
///
/// Unlike envelopes, the short message is handed to the signer whole and
/// hashed there.
pub fn prove(key: &KeyPair, username: &str, now: DateTime<Utc>) -> Result<AuthProof, CryptoError> {
    let timestamp = time::normalize(now);
    let signing_key = BlindedSigningKey::<Sha256>::new(key.rsa_private().clone());
    let signature = signing_key
        .try_sign_with_rng(&mut OsRng, proof_message(username, &timestamp).as_bytes())
        .map_err(|e| CryptoError::Signing(e.to_string()))?;

    Ok(AuthProof {
        username: username.to_string(),
        timestamp,
        signature: signature.to_vec(),
    })
}

pub fn verify(key: &PublicKey, proof: &AuthProof) -> bool {
    let Ok(signature) = Signature::try_from(proof.signature.as_slice()) else {
        return false;
    };
    VerifyingKey::<Sha256>::new(key.rsa().clone())
        .verify(proof_message(&proof.username, &proof.timestamp).as_bytes(), &signature)
        .is_ok()
}
