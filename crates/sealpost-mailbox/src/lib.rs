//! Server-side mailbox: user registry, replay-protected authentication and
//! per-user store-and-forward queues.
//!
//! [`Mailbox`] holds the protocol rules. Persistence is a [`MailboxBackend`]
//! handed in at construction; [`MemoryBackend`] lives here, the SQLite one in
//! `sealpost-db`.

pub mod backend;
pub mod memory;
pub mod store;

pub use backend::{Credentials, MailboxBackend};
pub use memory::MemoryBackend;
pub use store::{AuthError, Mailbox, valid_username};
