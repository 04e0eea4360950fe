use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Result, anyhow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Sqlite(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub addr: SocketAddr,
    pub store: StoreKind,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("SEALPOST_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("SEALPOST_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()?;
        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

        let store = match lookup("SEALPOST_STORE").as_deref().unwrap_or("sqlite") {
            "sqlite" => StoreKind::Sqlite(
                lookup("SEALPOST_DB_PATH")
                    .unwrap_or_else(|| "sealpost.db".into())
                    .into(),
            ),
            "memory" => StoreKind::Memory,
            other => return Err(anyhow!("SEALPOST_STORE must be sqlite or memory, got {:?}", other)),
        };

        Ok(Self { addr, store })
    }
}
