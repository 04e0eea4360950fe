use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Users --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    /// SubjectPublicKeyInfo PEM.
    pub public_key: String,
    #[serde(with = "crate::time::iso")]
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub username: String,
    pub public_key: String,
}

// -- Auth --

/// Timestamp-bound signature authorizing one mailbox operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthRequest {
    pub username: String,
    #[serde(with = "crate::time::iso")]
    pub time: DateTime<Utc>,
    /// Base64 signature over `"<username> <time>"`.
    pub signature: String,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub auth: AuthRequest,
    pub recipient: String,
    /// `|`-joined base64 chunks; opaque to the server.
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullResponse {
    pub messages: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_uses_canonical_time() {
        let req: AuthRequest = serde_json::from_str(
            r#"{"username":"alice","time":"2026-10-14T09:30:00.25Z","signature":"c2ln"}"#,
        )
        .unwrap();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["time"], "2026-10-14T09:30:00.250000Z");
    }

    #[test]
    fn send_request_rejects_unknown_fields() {
        let body = r#"{
            "auth": {"username":"bob","time":"2026-10-14T09:30:00Z","signature":""},
            "recipient": "alice",
            "message": "AAAA",
            "sender": "mallory"
        }"#;
        assert!(serde_json::from_str::<SendMessageRequest>(body).is_err());
    }
}
