use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{error, warn};

use sealpost_crypto::CipherEnvelope;
use sealpost_types::api::{AuthRequest, PullResponse, SendMessageRequest};

use crate::auth::{AppState, authorize, blocking};

/// PUT /v1/user/{username}/message/send: queue an envelope for the recipient.
///
/// Unknown recipients still get 204: delivery is store-and-forward and the
/// sender learns nothing about who exists from this endpoint.
pub async fn send_message(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<StatusCode, StatusCode> {
    // Framing first: a bad envelope must not spend the proof
    let envelope = CipherEnvelope::from_wire(req.message).ok_or_else(|| {
        warn!("Malformed envelope from {}", username);
        StatusCode::BAD_REQUEST
    })?;

    authorize(&state, &username, req.auth).await?;

    let mailbox = state.mailbox.clone();
    let recipient = req.recipient;
    blocking(move || mailbox.enqueue(&recipient, envelope))
        .await?
        .map_err(|e| {
            error!("Mailbox enqueue error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/user/{username}/message/pull: hand over and clear the mailbox.
pub async fn pull_messages(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(auth): Json<AuthRequest>,
) -> Result<Json<PullResponse>, StatusCode> {
    authorize(&state, &username, auth).await?;

    let mailbox = state.mailbox.clone();
    let envelopes = blocking(move || mailbox.drain(&username))
        .await?
        .map_err(|e| {
            error!("Mailbox drain error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(PullResponse {
        messages: envelopes.into_iter().map(CipherEnvelope::into_string).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::StatusCode;
    use chrono::Duration;
    use sealpost_crypto::{open, prove, seal};
    use sealpost_types::time;

    use crate::testing::{TestServer, auth_body, register_body};

    #[tokio::test]
    async fn send_and_pull_roundtrip() {
        let server = TestServer::new();
        let alice = server.keys();
        let bob = server.keys();
        server.put("/v1/user/register", register_body("alice", &alice)).await;
        server.put("/v1/user/register", register_body("bob", &bob)).await;

        let sent_at = time::now() + Duration::milliseconds(1);
        let sealed = seal(&bob, alice.public(), "bob", "alice", sent_at, "Hello world!").unwrap();
        let body = serde_json::json!({
            "auth": auth_body(&prove(&bob, "bob", sent_at).unwrap()),
            "recipient": "alice",
            "message": sealed.as_str(),
        });
        let (status, _) = server.put("/v1/user/bob/message/send", body).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let pull = auth_body(&prove(&alice, "alice", sent_at + Duration::milliseconds(1)).unwrap());
        let (status, body) = server.post("/v1/user/alice/message/pull", pull.clone()).await;
        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);

        let wire = sealpost_crypto::CipherEnvelope::from_wire(messages[0].as_str().unwrap()).unwrap();
        let peers = HashMap::from([("bob".to_string(), bob.public().clone())]);
        let plain = open(&alice, &peers, &wire).unwrap();
        assert_eq!(plain.body, "Hello world!");

        // Same proof again is a replay
        let (status, _) = server.post("/v1/user/alice/message/pull", pull).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let fresh = auth_body(&prove(&alice, "alice", sent_at + Duration::milliseconds(2)).unwrap());
        let (status, body) = server.post("/v1/user/alice/message/pull", fresh).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["messages"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_requires_valid_proof() {
        let server = TestServer::new();
        let bob = server.keys();
        server.put("/v1/user/register", register_body("bob", &bob)).await;
        let at = time::now() + Duration::milliseconds(1);

        // Signed by another key
        let forged = prove(&server.keys(), "bob", at).unwrap();
        let body = serde_json::json!({
            "auth": auth_body(&forged),
            "recipient": "alice",
            "message": "QUFB",
        });
        assert_eq!(server.put("/v1/user/bob/message/send", body).await.0, StatusCode::UNAUTHORIZED);

        // Valid proof, wrong path
        let body = serde_json::json!({
            "auth": auth_body(&prove(&bob, "bob", at).unwrap()),
            "recipient": "alice",
            "message": "QUFB",
        });
        assert_eq!(server.put("/v1/user/carol/message/send", body).await.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn malformed_envelope_is_bad_request() {
        let server = TestServer::new();
        let bob = server.keys();
        server.put("/v1/user/register", register_body("bob", &bob)).await;

        let auth = auth_body(&prove(&bob, "bob", time::now() + Duration::milliseconds(1)).unwrap());
        let body = serde_json::json!({
            "auth": auth.clone(),
            "recipient": "bob",
            "message": "QUFB||",
        });
        assert_eq!(server.put("/v1/user/bob/message/send", body).await.0, StatusCode::BAD_REQUEST);

        // The rejected request did not use up the proof
        let body = serde_json::json!({
            "auth": auth,
            "recipient": "bob",
            "message": "QUFB",
        });
        assert_eq!(server.put("/v1/user/bob/message/send", body).await.0, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn send_to_unknown_recipient_is_accepted() {
        let server = TestServer::new();
        let bob = server.keys();
        server.put("/v1/user/register", register_body("bob", &bob)).await;

        let body = serde_json::json!({
            "auth": auth_body(&prove(&bob, "bob", time::now() + Duration::milliseconds(1)).unwrap()),
            "recipient": "nobody",
            "message": "QUFB",
        });
        assert_eq!(server.put("/v1/user/bob/message/send", body).await.0, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn pull_for_unknown_user_is_unauthorized() {
        let server = TestServer::new();
        let ghost = server.keys();
        let pull = auth_body(&prove(&ghost, "ghost", time::now()).unwrap());
        assert_eq!(
            server.post("/v1/user/ghost/message/pull", pull).await.0,
            StatusCode::UNAUTHORIZED
        );
    }
}
