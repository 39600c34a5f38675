use axum::extract::{Path, State};
use axum::Json;
use postmortem_core::CoreError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/formats — every report format the server can produce.
pub async fn list_formats(State(app): State<AppState>) -> Json<serde_json::Value> {
    let default_key = app.templates.default_key();
    let formats: Vec<serde_json::Value> = app
        .templates
        .iter()
        .map(|t| {
            serde_json::json!({
                "key": t.key,
                "label": t.label,
                "default": t.key == default_key,
                "builtin": t.builtin,
            })
        })
        .collect();
    Json(serde_json::json!(formats))
}

/// GET /api/formats/{key} — the prompt template behind one format.
pub async fn get_format(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let template = app
        .templates
        .lookup(&key)
        .ok_or(CoreError::UnknownFormat(key.clone()))?;
    Ok(Json(serde_json::json!({
        "key": template.key,
        "label": template.label,
        "default": template.key == app.templates.default_key(),
        "builtin": template.builtin,
        "template": template.body,
    })))
}
