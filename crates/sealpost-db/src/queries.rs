use crate::models::{PendingRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::warn;

use sealpost_crypto::CipherEnvelope;
use sealpost_mailbox::{Credentials, MailboxBackend};

impl Database {
    // -- Users --

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    pub fn pending_count(&self, username: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM pending WHERE recipient = ?1",
                [username],
                |row| row.get(0),
            )?)
        })
    }
}

impl MailboxBackend for Database {
    fn insert_user(&self, username: &str, public_key: &str, registered_at: DateTime<Utc>) -> Result<bool> {
        let at = registered_at.timestamp_micros();
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, public_key, last_auth_us, registered_at_us)
                 VALUES (?1, ?2, ?3, ?3)",
                rusqlite::params![username, public_key, at],
            )?;
            Ok(inserted == 1)
        })
    }

    fn credentials(&self, username: &str) -> Result<Option<Credentials>> {
        self.get_user(username)?
            .map(|row| -> Result<Credentials> {
                Ok(Credentials {
                    public_key: row.public_key,
                    last_authenticated: from_micros(row.last_auth_us)?,
                })
            })
            .transpose()
    }

    fn advance_watermark(&self, username: &str, to: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET last_auth_us = ?2 WHERE username = ?1 AND last_auth_us < ?2",
                rusqlite::params![username, to.timestamp_micros()],
            )?;
            Ok(updated == 1)
        })
    }

    fn append(&self, recipient: &str, envelope: CipherEnvelope) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO pending (recipient, envelope)
                 SELECT ?1, ?2 WHERE EXISTS (SELECT 1 FROM users WHERE username = ?1)",
                rusqlite::params![recipient, envelope.as_str()],
            )?;
            Ok(inserted == 1)
        })
    }

    fn take_all(&self, username: &str) -> Result<Vec<CipherEnvelope>> {
        let rows = self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;
            let rows = query_pending(&tx, username)?;
            tx.execute("DELETE FROM pending WHERE recipient = ?1", [username])?;
            tx.commit()?;
            Ok(rows)
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id;
                CipherEnvelope::from_wire(row.envelope).or_else(|| {
                    warn!("Discarding corrupt pending envelope {} for {}", id, row.recipient);
                    None
                })
            })
            .collect())
    }
}

fn from_micros(us: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).ok_or_else(|| anyhow!("Timestamp out of range: {}", us))
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, public_key, last_auth_us, registered_at_us FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                public_key: row.get(1)?,
                last_auth_us: row.get(2)?,
                registered_at_us: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_pending(conn: &Connection, recipient: &str) -> Result<Vec<PendingRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, recipient, envelope FROM pending WHERE recipient = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([recipient], |row| {
            Ok(PendingRow {
                id: row.get(0)?,
                recipient: row.get(1)?,
                envelope: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
