use anyhow::Result;
use chrono::{DateTime, Utc};

use sealpost_crypto::CipherEnvelope;

/// What the server knows about a registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Canonical SubjectPublicKeyInfo PEM.
    pub public_key: String,
    /// Timestamp of the last accepted auth proof, or the registration time.
    pub last_authenticated: DateTime<Utc>,
}

/// Storage for mailbox state.
///
/// Implementations must make each method atomic with respect to concurrent
/// calls for the same username. Calls for different users should not contend.
pub trait MailboxBackend: Send + Sync {
    /// Create a user with its watermark at `registered_at`. Returns `false`
    /// if the username exists; exactly one concurrent caller may win.
    fn insert_user(&self, username: &str, public_key: &str, registered_at: DateTime<Utc>) -> Result<bool>;

    fn credentials(&self, username: &str) -> Result<Option<Credentials>>;

    /// Move the watermark to `to` iff `to` is strictly greater than the stored
    /// value. Returns whether it moved; `false` for unknown users.
    fn advance_watermark(&self, username: &str, to: DateTime<Utc>) -> Result<bool>;

    /// Queue an envelope. Returns `false` (and stores nothing) if the
    /// recipient is unknown.
    fn append(&self, recipient: &str, envelope: CipherEnvelope) -> Result<bool>;

    /// Return every queued envelope in append order and clear the queue in
    /// the same step.
    fn take_all(&self, username: &str) -> Result<Vec<CipherEnvelope>>;
}
