//! Client side of the relay: talks HTTP to the server, seals outgoing
//! messages, and opens and verifies what it pulls.

pub mod client;
pub mod conversations;
pub mod error;
pub mod peers;
pub mod profile;

pub use client::Client;
pub use conversations::{Conversations, Entry};
pub use error::ClientError;
pub use peers::Peers;
pub use profile::Profile;
