use anyhow::Result;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mailtrack::config::Config;
use mailtrack::smtp::SmtpMailer;
use mailtrack::{db, routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,mailtrack=debug")),
        )
        .init();

    let config = Arc::new(Config::from_env()?);
    if let Err(e) = config.ensure_public_base_url() {
        // Sends will be refused until BASE_URL points somewhere reachable;
        // the tracking endpoint itself still works.
        tracing::warn!("{e}");
    }

    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let mailer = Arc::new(SmtpMailer::new(Duration::from_secs(config.smtp_timeout_secs)));

    let state = AppState {
        pool,
        config: config.clone(),
        mailer,
    };

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(routes::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;
    let ctrl_c = async {
        signal::ctrl_c().await.ok();
    };
    #[cfg(unix)]
    let term = async {
        if let Ok(mut s) = signal::unix::signal(signal::unix::SignalKind::terminate()) {
            s.recv().await;
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();
    tokio::select! { _ = ctrl_c => {}, _ = term => {} }
}
