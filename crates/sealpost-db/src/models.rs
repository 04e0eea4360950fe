/// Rows as stored in SQLite.
/// Timestamps are microseconds since the Unix epoch.

pub struct UserRow {
    pub username: String,
    pub public_key: String,
    pub last_auth_us: i64,
    pub registered_at_us: i64,
}

pub struct PendingRow {
    pub id: i64,
    pub recipient: String,
    pub envelope: String,
}
