use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

use sealpost_crypto::CipherEnvelope;

use crate::backend::{Credentials, MailboxBackend};

struct UserRecord {
    public_key: String,
    last_authenticated: DateTime<Utc>,
    pending: Vec<CipherEnvelope>,
}

/// Process-local backend. State is lost on drop.
///
/// The user table lock is only taken for writing by `insert_user`; every
/// other operation clones the user's `Arc` under a read lock and then locks
/// just that record.
#[derive(Default)]
pub struct MemoryBackend {
    users: RwLock<HashMap<String, Arc<Mutex<UserRecord>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn user(&self, username: &str) -> Result<Option<Arc<Mutex<UserRecord>>>> {
        let users = self
            .users
            .read()
            .map_err(|e| anyhow!("User table lock poisoned: {}", e))?;
        Ok(users.get(username).cloned())
    }
}

fn lock(record: &Mutex<UserRecord>) -> Result<MutexGuard<'_, UserRecord>> {
    record
        .lock()
        .map_err(|e| anyhow!("User record lock poisoned: {}", e))
}

impl MailboxBackend for MemoryBackend {
    fn insert_user(&self, username: &str, public_key: &str, registered_at: DateTime<Utc>) -> Result<bool> {
        let mut users = self
            .users
            .write()
            .map_err(|e| anyhow!("User table lock poisoned: {}", e))?;

        match users.entry(username.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(UserRecord {
                    public_key: public_key.to_string(),
                    last_authenticated: registered_at,
                    pending: Vec::new(),
                })));
                Ok(true)
            }
        }
    }

    fn credentials(&self, username: &str) -> Result<Option<Credentials>> {
        let Some(record) = self.user(username)? else {
            return Ok(None);
        };
        let record = lock(&record)?;
        Ok(Some(Credentials {
            public_key: record.public_key.clone(),
            last_authenticated: record.last_authenticated,
        }))
    }

    fn advance_watermark(&self, username: &str, to: DateTime<Utc>) -> Result<bool> {
        let Some(record) = self.user(username)? else {
            return Ok(false);
        };
        let mut record = lock(&record)?;
        if to <= record.last_authenticated {
            return Ok(false);
        }
        record.last_authenticated = to;
        Ok(true)
    }

    fn append(&self, recipient: &str, envelope: CipherEnvelope) -> Result<bool> {
        let Some(record) = self.user(recipient)? else {
            return Ok(false);
        };
        lock(&record)?.pending.push(envelope);
        Ok(true)
    }

    fn take_all(&self, username: &str) -> Result<Vec<CipherEnvelope>> {
        let Some(record) = self.user(username)? else {
            return Ok(Vec::new());
        };
        Ok(std::mem::take(&mut lock(&record)?.pending))
    }
}
