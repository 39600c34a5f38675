use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use postmortem_agent::{GenerationError, GenerationSession, StreamEvent};
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::StreamExt as _;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    #[serde(default)]
    pub incident_notes: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// POST /api/generate_report — stream a report for the posted incident notes.
///
/// The response is always `text/event-stream`. Bad input, including a body
/// that is not JSON or is over `server.max_body_bytes`, comes back as a
/// single `error` event rather than an HTTP error status.
pub async fn generate_report(State(app): State<AppState>, body: Body) -> Response {
    let id = Uuid::new_v4();
    let session = match read_body(body, app.config.server.max_body_bytes)
        .await
        .and_then(|bytes| start_session(&app, &bytes, id))
    {
        Ok(session) => session,
        Err(e) => {
            warn!(session = %id, error = %e, "report request rejected");
            GenerationSession::rejected(e.to_string())
        }
    };
    event_stream(session, id)
}

/// Buffer the request body, refusing anything over `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, GenerationError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        GenerationError::Validation(format!(
            "failed to read request body (limit {limit} bytes): {e}"
        ))
    })
}

fn start_session(
    app: &AppState,
    body: &[u8],
    id: Uuid,
) -> Result<GenerationSession, GenerationError> {
    let req: GenerateReportRequest = serde_json::from_slice(body)
        .map_err(|e| GenerationError::Validation(format!("invalid request body: {e}")))?;

    let notes = req.incident_notes.as_deref().unwrap_or_default().trim();
    if notes.is_empty() {
        return Err(GenerationError::Validation(
            "No incident notes provided".to_string(),
        ));
    }

    let template = app.templates.get(req.format.as_deref());
    if let Some(requested) = req.format.as_deref() {
        if requested != template.key {
            warn!(session = %id, requested, fallback = %template.key, "unknown format; using default");
        }
    }

    let prompt = template.render(notes);
    info!(
        session = %id,
        format = %template.key,
        notes_chars = notes.chars().count(),
        "starting report generation"
    );
    Ok(GenerationSession::start(prompt, app.generate_options()))
}

fn event_stream(session: GenerationSession, id: Uuid) -> Response {
    let stream = session.map(move |event| {
        if event.is_terminal() {
            info!(session = %id, outcome = event.kind(), "report stream finished");
        }
        Ok::<Event, Infallible>(to_sse(&event))
    });
    // No keep-alive comments: idle periods are covered by heartbeat events.
    Sse::new(stream).into_response()
}

/// Frame one event as `data: <json>`.
fn to_sse(event: &StreamEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(json) => Event::default().data(json),
        Err(e) => Event::default().data(
            serde_json::json!({
                "type": "error",
                "error": format!("failed to encode event: {e}"),
            })
            .to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_are_optional() {
        let req: GenerateReportRequest = serde_json::from_str("{}").unwrap();
        assert!(req.incident_notes.is_none());
        assert!(req.format.is_none());

        let req: GenerateReportRequest =
            serde_json::from_str(r#"{"incident_notes": null, "format": "action_items"}"#).unwrap();
        assert!(req.incident_notes.is_none());
        assert_eq!(req.format.as_deref(), Some("action_items"));
    }

    #[tokio::test]
    async fn body_over_limit_is_refused() {
        let err = read_body(Body::from(vec![b'x'; 64]), 16).await.unwrap_err();
        assert!(err.to_string().contains("limit 16 bytes"));

        let bytes = read_body(Body::from("{}"), 16).await.unwrap();
        assert_eq!(&bytes[..], b"{}");
    }

    #[test]
    fn non_string_notes_are_a_parse_error() {
        let res = serde_json::from_str::<GenerateReportRequest>(r#"{"incident_notes": 42}"#);
        assert!(res.is_err());
    }
}
