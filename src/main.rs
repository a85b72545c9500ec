//! habit-db server entry point.
//!
//! Loads settings, builds the session provider, and serves the health
//! endpoint until Ctrl-C.

use anyhow::Context;
use axum::http::StatusCode;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use habit_db::api;
use habit_db::app_state::AppState;
use habit_db::config::Settings;
use habit_db::database::SessionProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Configuration errors abort startup.
    let settings = Settings::from_env().context("loading settings")?;
    tracing::info!(
        project = %settings.project_name,
        version = %settings.version,
        addr = %settings.listen_addr,
        "starting"
    );

    let sessions = SessionProvider::connect(&settings)
        .await
        .context("connecting to database")?;

    let listen_addr = settings.listen_addr;
    let request_timeout = settings.request_timeout();
    let app_state = AppState::new(settings, sessions.clone());

    let app = api::build_router()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.close().await;
    Ok(())
}

/// `RUST_LOG` selects levels (default `info`); `LOG_FORMAT=json` switches
/// to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
