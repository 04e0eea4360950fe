use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, warn};

use sealpost_crypto::{PublicKey, envelope::chunk_len};
use sealpost_mailbox::valid_username;
use sealpost_types::api::{RegisterRequest, UserResponse};

use crate::auth::{AppState, blocking};

/// PUT /v1/user/register: 204 on success, 409 if the username is taken.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<StatusCode, StatusCode> {
    // Validate input
    if !valid_username(&req.username) {
        warn!("Rejected username {:?}", req.username);
        return Err(StatusCode::BAD_REQUEST);
    }

    let key = PublicKey::from_pem(&req.public_key).map_err(|e| {
        warn!("Rejected public key for {}: {}", req.username, e);
        StatusCode::BAD_REQUEST
    })?;
    // Peers must be able to seal envelopes to this key
    if chunk_len(&key).is_err() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mailbox = state.mailbox.clone();
    let created = blocking(move || mailbox.register(&req.username, &key, req.time))
        .await?
        .map_err(|e| {
            error!("Mailbox register error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if created {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::CONFLICT)
    }
}

/// GET /v1/user/{username}: the user's public key.
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let mailbox = state.mailbox.clone();
    let lookup_name = username.clone();
    let public_key = blocking(move || mailbox.lookup(&lookup_name))
        .await?
        .map_err(|e| {
            error!("Mailbox lookup error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(UserResponse {
        username,
        public_key,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use sealpost_types::time;

    use crate::testing::{TestServer, register_body};

    #[tokio::test]
    async fn register_then_conflict() {
        let server = TestServer::new();
        let keys = server.keys();

        let status = server.put("/v1/user/register", register_body("alice", &keys)).await.0;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let status = server.put("/v1/user/register", register_body("alice", &server.keys())).await.0;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn register_validates_username_and_key() {
        let server = TestServer::new();
        let keys = server.keys();

        let status = server.put("/v1/user/register", register_body("al ice", &keys)).await.0;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let body = serde_json::json!({
            "username": "alice",
            "public_key": "-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----\n",
            "time": time::to_iso(&time::now()),
        });
        let status = server.put("/v1/user/register", body).await.0;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn register_refuses_names_unusable_in_paths() {
        let server = TestServer::new();
        let keys = server.keys();

        for name in ["a/b", "a?b", "a#b", "a%2Fb", ".."] {
            let status = server.put("/v1/user/register", register_body(name, &keys)).await.0;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{name:?}");
        }

        // Percent-encoded lookup reaches the handler and finds nobody
        let (status, _) = server.get("/v1/user/a%2Fb").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lookup_returns_registered_key() {
        let server = TestServer::new();
        let keys = server.keys();
        server.put("/v1/user/register", register_body("alice", &keys)).await;

        let (status, body) = server.get("/v1/user/alice").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["public_key"], keys.public().to_pem().unwrap());

        let (status, _) = server.get("/v1/user/bob").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let server = TestServer::new();
        assert_eq!(server.get("/v1/health").await.0, StatusCode::OK);
    }
}
