use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// One line of a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// True for messages we sent, false for ones we received.
    pub sent: bool,
    #[serde(with = "sealpost_types::time::iso")]
    pub time: DateTime<Utc>,
    pub body: String,
}

/// Local transcripts, keyed by the other party's username. Entries keep the
/// order in which they were recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversations {
    threads: BTreeMap<String, Vec<Entry>>,
}

impl Conversations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&mut self, peer: &str, time: DateTime<Utc>, body: impl Into<String>) {
        self.push(peer, true, time, body.into());
    }

    pub fn record_received(&mut self, peer: &str, time: DateTime<Utc>, body: impl Into<String>) {
        self.push(peer, false, time, body.into());
    }

    fn push(&mut self, peer: &str, sent: bool, time: DateTime<Utc>, body: String) {
        self.threads
            .entry(peer.to_string())
            .or_default()
            .push(Entry { sent, time, body });
    }

    /// Transcript with `peer`, empty if we never talked.
    pub fn with(&self, peer: &str) -> &[Entry] {
        self.threads.get(peer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Usernames we have a transcript with, sorted.
    pub fn peers(&self) -> Vec<&str> {
        self.threads.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }

    /// A missing file is an empty set of transcripts.
    pub async fn load(path: &Path) -> Result<Self, ClientError> {
        match tokio::fs::read(path).await {
            Ok(contents) => Ok(serde_json::from_slice(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn save(&self, path: &Path) -> Result<(), ClientError> {
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        Ok(())
    }
}
