mod config;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use sealpost_api::AppStateInner;
use sealpost_db::Database;
use sealpost_mailbox::Mailbox;

use crate::config::{Config, StoreKind};

const DEFAULT_FILTER: &str =
    "sealpost=debug,sealpost_api=debug,sealpost_mailbox=debug,sealpost_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .init();

    let config = Config::from_env()?;

    let mailbox = match &config.store {
        StoreKind::Sqlite(path) => Mailbox::new(Database::open(path)?),
        StoreKind::Memory => {
            info!("Using in-memory mailbox; state is lost on exit");
            Mailbox::in_memory()
        }
    };

    let app = sealpost_api::router(AppStateInner::new(mailbox))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Sealpost relay listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            ctrl_c.await.ok();
            info!("Received Ctrl+C, shutting down...");
            return;
        };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
