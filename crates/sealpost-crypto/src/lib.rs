//! Sealpost end-to-end crypto.
//!
//! - [`keys`]: RSA key pairs and their PEM/passphrase-protected encodings
//! - [`envelope`]: sign-then-encrypt message envelopes, chunked to fit RSA-OAEP
//! - [`proof`]: timestamp-bound auth proofs for mailbox operations
//!
//! The relay only ever handles [`CipherEnvelope`] text and verifies
//! [`AuthProof`]s; opening an envelope needs the recipient's private key.

pub mod envelope;
pub mod error;
pub mod keys;
pub mod proof;

pub use envelope::{CipherEnvelope, PeerDirectory, PlainEnvelope, Rejection, open, seal};
pub use error::CryptoError;
pub use keys::{KeyPair, PublicKey};
pub use proof::{AuthProof, prove, verify};
