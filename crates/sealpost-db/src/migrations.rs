use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, pending)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                username          TEXT PRIMARY KEY,
                public_key        TEXT NOT NULL,
                last_auth_us      INTEGER NOT NULL,
                registered_at_us  INTEGER NOT NULL
            );

            CREATE TABLE pending (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient   TEXT NOT NULL REFERENCES users(username),
                envelope    TEXT NOT NULL
            );

            CREATE INDEX idx_pending_recipient
                ON pending(recipient, id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
