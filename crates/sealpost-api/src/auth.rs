use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{error, warn};

use sealpost_crypto::AuthProof;
use sealpost_mailbox::{AuthError, Mailbox};
use sealpost_types::api::AuthRequest;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub mailbox: Mailbox,
}

impl AppStateInner {
    pub fn new(mailbox: Mailbox) -> AppState {
        Arc::new(Self { mailbox })
    }
}

/// Run CPU-bound verification or SQLite work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Check `auth` for the user named in the request path.
///
/// Every refusal is a bare 401; only the log says why.
pub(crate) async fn authorize(
    state: &AppState,
    path_username: &str,
    auth: AuthRequest,
) -> Result<(), StatusCode> {
    if auth.username != path_username {
        warn!("Auth for {} presented on path of {}", auth.username, path_username);
        return Err(StatusCode::UNAUTHORIZED);
    }

    let proof = AuthProof::from_wire(auth.username, auth.time, &auth.signature).map_err(|e| {
        warn!("Undecodable auth signature for {}: {}", path_username, e);
        StatusCode::UNAUTHORIZED
    })?;

    let mailbox = state.mailbox.clone();
    match blocking(move || mailbox.authenticate(&proof)).await? {
        Ok(()) => Ok(()),
        Err(AuthError::Backend(e)) => {
            error!("Mailbox error authenticating {}: {}", path_username, e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(refused) => {
            warn!("Refused auth for {}: {}", path_username, refused);
            Err(StatusCode::UNAUTHORIZED)
        }
    }
}
