//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use guildwarden_domain::error::WardenError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`WardenError`] to an HTTP response with appropriate status code.
pub struct ApiError(WardenError);

impl From<WardenError> for ApiError {
    fn from(err: WardenError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            WardenError::Validation(_) => StatusCode::BAD_REQUEST,
            WardenError::NotFound(_) => StatusCode::NOT_FOUND,
            WardenError::StateConflict(_) => StatusCode::CONFLICT,
            WardenError::ExpiredDeferral(_) => StatusCode::GONE,
            WardenError::ExternalApi(_) => StatusCode::BAD_GATEWAY,
            WardenError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WardenError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            WardenError::Validation(err) => err.to_string(),
            WardenError::NotFound(err) => err.to_string(),
            WardenError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildwarden_domain::error::{NotFoundError, ValidationError};

    #[test]
    fn should_map_errors_to_status_codes() {
        let cases = [
            (WardenError::from(ValidationError::ZeroDuration), StatusCode::BAD_REQUEST),
            (
                NotFoundError {
                    entity: "ScheduledTask",
                    id: "x".into(),
                }
                .into(),
                StatusCode::NOT_FOUND,
            ),
            (
                WardenError::Timeout(std::time::Duration::from_secs(30)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                WardenError::storage(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
