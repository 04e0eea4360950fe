use std::path::Path;

use serde::{Deserialize, Serialize};

use sealpost_crypto::KeyPair;

use crate::error::ClientError;

/// Local account: where the server is, who we are there, and our private
/// key. The key is always stored passphrase-protected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub server_url: String,
    pub username: String,
    pub private_key: String,
}

impl Profile {
    pub fn new(
        server_url: impl Into<String>,
        username: impl Into<String>,
        keys: &KeyPair,
        passphrase: &str,
    ) -> Result<Self, ClientError> {
        Ok(Self {
            server_url: server_url.into(),
            username: username.into(),
            private_key: keys.export_private(Some(passphrase))?,
        })
    }

    /// Decrypt the stored key. A wrong passphrase is
    /// `ClientError::Crypto(CryptoError::KeyUnlock)`; prompt again.
    pub fn unlock(&self, passphrase: &str) -> Result<KeyPair, ClientError> {
        Ok(KeyPair::import_private(&self.private_key, Some(passphrase))?)
    }

    /// `None` if no profile has been saved yet.
    pub async fn load(path: &Path) -> Result<Option<Self>, ClientError> {
        match tokio::fs::read(path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the profile, readable by the owner only on unix.
    pub async fn save(&self, path: &Path) -> Result<(), ClientError> {
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealpost_crypto::CryptoError;

    #[tokio::test]
    async fn saved_profile_unlocks_with_passphrase() {
        let path = std::env::temp_dir().join(format!("sealpost_profile_{}.json", std::process::id()));
        let keys = KeyPair::generate_with_bits(1024).unwrap();

        let profile = Profile::new("http://localhost:8000", "alice", &keys, "hunter2").unwrap();
        assert!(!profile.private_key.contains("RSA PRIVATE KEY"));
        profile.save(&path).await.unwrap();

        let loaded = Profile::load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, profile);
        assert_eq!(loaded.unlock("hunter2").unwrap(), keys);
        assert!(matches!(
            loaded.unlock("hunter3"),
            Err(ClientError::Crypto(CryptoError::KeyUnlock))
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn no_profile_yet() {
        let path = std::env::temp_dir().join("sealpost_profile_does_not_exist.json");
        assert!(Profile::load(&path).await.unwrap().is_none());
    }
}
