use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use postmortem_core::CoreError;

/// Unified error type for the JSON endpoints.
///
/// The report stream never uses this: its failures travel as `error` events
/// inside a well-formed event stream.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<CoreError>() {
            Some(CoreError::UnknownFormat(_)) | Some(CoreError::ConfigNotFound(_)) => {
                StatusCode::NOT_FOUND
            }
            Some(CoreError::InvalidConfig(_)) | Some(CoreError::MissingNotesSlot(_)) => {
                StatusCode::BAD_REQUEST
            }
            Some(CoreError::FileExists(_)) => StatusCode::CONFLICT,
            Some(CoreError::Io(_))
            | Some(CoreError::Yaml(_))
            | Some(CoreError::Json(_))
            | None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_format_maps_to_404() {
        let err = AppError::from(CoreError::UnknownFormat("haiku".into()));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn untyped_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something broke"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
