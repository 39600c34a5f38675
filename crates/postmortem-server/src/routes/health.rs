use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/health — liveness plus whether the report CLI can be found.
pub async fn health(State(app): State<AppState>) -> Json<serde_json::Value> {
    let command = app.config.generator.command.clone();
    let lookup = command.clone();
    let resolved = tokio::task::spawn_blocking(move || which::which(lookup).ok())
        .await
        .ok()
        .flatten()
        .map(|p| p.display().to_string());

    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "generator": {
            "command": command,
            "resolved": resolved,
        },
        "formats": app.templates.len(),
    }))
}
