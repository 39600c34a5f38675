pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use postmortem_core::config::ServerConfig;
use postmortem_core::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        // Report stream (SSE)
        .route(
            "/api/generate_report",
            post(routes::reports::generate_report),
        )
        // Formats
        .route("/api/formats", get(routes::formats::list_formats))
        .route("/api/formats/{key}", get(routes::formats::get_format))
        // Health
        .route("/api/health", get(routes::health::health))
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router.with_state(state)
}

/// Start the report server on the host and port from `config`.
pub async fn serve(config: Config, open_browser: bool) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(config, listener, open_browser).await
}

/// Start the report server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    config: Config,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let local = listener.local_addr()?;

    tracing::info!(
        command = %state.config.generator.command,
        formats = state.templates.len(),
        default_format = %state.templates.default_key(),
        "postmortem server listening on http://{local}"
    );

    if open_browser {
        match browser_url(&state.config.server) {
            Some(url) => {
                if let Err(e) = open::that(url) {
                    tracing::warn!(url, error = %e, "failed to open browser");
                }
            }
            None => tracing::warn!("--open needs server.open_url; not opening a browser"),
        }
    }

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("postmortem server stopped");
    Ok(())
}

/// The page `--open` should show. The server itself only speaks JSON and
/// SSE, so this is the frontend configured in `server.open_url`.
fn browser_url(server: &ServerConfig) -> Option<&str> {
    server
        .open_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_url_comes_from_config() {
        let mut server = ServerConfig::default();
        assert_eq!(browser_url(&server), None);

        server.open_url = Some("  ".to_string());
        assert_eq!(browser_url(&server), None);

        server.open_url = Some("http://localhost:3000/".to_string());
        assert_eq!(browser_url(&server), Some("http://localhost:3000/"));
    }
}
