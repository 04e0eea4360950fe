use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use sealpost_crypto::{AuthProof, CipherEnvelope, PublicKey};
use sealpost_types::time;

use crate::backend::MailboxBackend;
use crate::memory::MemoryBackend;

const MAX_USERNAME_LEN: usize = 64;

/// Why an auth proof was refused. Retrying requires a fresh timestamp and a new signature.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unknown user")]
    UnknownUser,

    #[error("timestamp is not after the last accepted one")]
    ReplayedOrStale,

    #[error("signature does not verify")]
    BadSignature,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Usernames appear in URL path segments and in the space-delimited proof
/// string: ASCII letters, digits, `.`, `_` and `-`, starting with a letter or
/// digit so that `.` and `..` can never name a user.
pub fn valid_username(username: &str) -> bool {
    let Some(first) = username.chars().next() else {
        return false;
    };
    username.len() <= MAX_USERNAME_LEN
        && first.is_ascii_alphanumeric()
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Registry and store-and-forward queues over an injected backend.
#[derive(Clone)]
pub struct Mailbox {
    backend: Arc<dyn MailboxBackend>,
}

impl Mailbox {
    pub fn new<B: MailboxBackend + 'static>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Register `username`. `false` means the name is taken.
    pub fn register(&self, username: &str, public_key: &PublicKey, now: DateTime<Utc>) -> Result<bool> {
        let pem = public_key.to_pem()?;
        let created = self
            .backend
            .insert_user(username, &pem, time::normalize(now))?;
        if created {
            info!("Registered user {}", username);
        } else {
            debug!("Registration refused, username {} taken", username);
        }
        Ok(created)
    }

    /// Public key PEM for `username`.
    pub fn lookup(&self, username: &str) -> Result<Option<String>> {
        Ok(self.backend.credentials(username)?.map(|c| c.public_key))
    }

    /// Accept `proof` at most once, and only if its timestamp is later than
    /// every previously accepted one for that user.
    pub fn authenticate(&self, proof: &AuthProof) -> Result<(), AuthError> {
        let credentials = self
            .backend
            .credentials(&proof.username)?
            .ok_or(AuthError::UnknownUser)?;

        if proof.timestamp <= credentials.last_authenticated {
            return Err(AuthError::ReplayedOrStale);
        }

        let key = PublicKey::from_pem(&credentials.public_key)
            .map_err(|e| anyhow::anyhow!("stored key for {} unreadable: {}", proof.username, e))?;
        if !sealpost_crypto::verify(&key, proof) {
            return Err(AuthError::BadSignature);
        }

        // A concurrent caller with the same or a later timestamp may have won
        if !self
            .backend
            .advance_watermark(&proof.username, proof.timestamp)?
        {
            warn!("Lost watermark race for {}", proof.username);
            return Err(AuthError::ReplayedOrStale);
        }

        Ok(())
    }

    /// Queue `envelope` for `recipient`. Unknown recipients are ignored.
    pub fn enqueue(&self, recipient: &str, envelope: CipherEnvelope) -> Result<()> {
        if self.backend.append(recipient, envelope)? {
            debug!("Queued envelope for {}", recipient);
        } else {
            debug!("Dropped envelope for unknown recipient {}", recipient);
        }
        Ok(())
    }

    /// Everything queued for `username` since the last drain, oldest first.
    pub fn drain(&self, username: &str) -> Result<Vec<CipherEnvelope>> {
        let envelopes = self.backend.take_all(username)?;
        debug!("Drained {} envelope(s) for {}", envelopes.len(), username);
        Ok(envelopes)
    }
}
