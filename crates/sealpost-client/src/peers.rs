use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use sealpost_crypto::{PeerDirectory, PublicKey};

use crate::error::ClientError;

/// Locally known peers. Only ever filled from server lookups.
#[derive(Debug, Clone, Default)]
pub struct Peers {
    keys: HashMap<String, PublicKey>,
}

impl Peers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, username: impl Into<String>, key: PublicKey) {
        self.keys.insert(username.into(), key);
    }

    pub fn contains(&self, username: &str) -> bool {
        self.keys.contains_key(username)
    }

    pub fn get(&self, username: &str) -> Option<&PublicKey> {
        self.keys.get(username)
    }

    /// Usernames in sorted order.
    pub fn usernames(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.keys.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Load from a JSON file of username → PEM. A missing file is an empty directory.
    pub async fn load(path: &Path) -> Result<Self, ClientError> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };

        let stored: BTreeMap<String, String> = serde_json::from_slice(&contents)?;
        let mut peers = Self::new();
        for (username, pem) in stored {
            peers.insert(username, PublicKey::from_pem(&pem)?);
        }
        Ok(peers)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ClientError> {
        let stored = self
            .keys
            .iter()
            .map(|(username, key)| Ok((username.clone(), key.to_pem()?)))
            .collect::<Result<BTreeMap<_, _>, ClientError>>()?;
        tokio::fs::write(path, serde_json::to_vec_pretty(&stored)?).await?;
        Ok(())
    }
}

impl PeerDirectory for Peers {
    fn public_key(&self, username: &str) -> Option<&PublicKey> {
        self.get(username)
    }
}
