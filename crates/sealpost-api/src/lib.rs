//! HTTP surface of the relay. Handlers only move opaque envelopes and
//! check auth proofs; the protocol rules live in `sealpost-mailbox`.

pub mod auth;
pub mod messages;
pub mod users;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post, put},
};

pub use auth::{AppState, AppStateInner};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/user/register", put(users::register))
        .route("/v1/user/{username}", get(users::get_user))
        .route("/v1/user/{username}/message/send", put(messages::send_message))
        .route("/v1/user/{username}/message/pull", post(messages::pull_messages))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}
