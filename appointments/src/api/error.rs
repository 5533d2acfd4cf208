//! HTTP rendering of [`BookingError`].

use crate::error::BookingError;
use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned by appointment handlers.
///
/// Wraps a [`BookingError`] and renders it as `{ code, message, fields }` with
/// the matching status code. Requests the handlers could not even decode
/// (missing caller header, malformed JSON or query) are validation errors
/// answered with 400 instead of 422.
#[derive(Debug)]
pub struct ApiError {
    error: BookingError,
    status: StatusCode,
}

impl ApiError {
    /// A validation failure in the request envelope rather than its content
    #[must_use]
    pub fn bad_request(message: impl Into<String>, fields: &[&str]) -> Self {
        Self {
            error: BookingError::validation(message, fields.iter().copied()),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// Status code for the response
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The wrapped domain error
    #[must_use]
    pub const fn error(&self) -> &BookingError {
        &self.error
    }
}

/// Status code for a domain error
#[must_use]
pub const fn status_for(error: &BookingError) -> StatusCode {
    match error {
        BookingError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BookingError::NotFound { .. } => StatusCode::NOT_FOUND,
        BookingError::Conflict { .. } | BookingError::InvalidTransition { .. } => {
            StatusCode::CONFLICT
        },
        BookingError::Permission { .. } => StatusCode::FORBIDDEN,
        BookingError::DependencyTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        BookingError::Dependency { .. } => StatusCode::BAD_GATEWAY,
        BookingError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error.code(), self.error)
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<BookingError> for ApiError {
    fn from(error: BookingError) -> Self {
        let status = status_for(&error);
        Self { error, status }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(format!("invalid request body: {}", rejection.body_text()), &[])
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(format!("invalid query: {}", rejection.body_text()), &[])
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Offending input fields
    pub fields: Vec<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let Self { error, status } = self;

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(%status, code = error.code(), %error, "Internal server error");
        } else if status.is_server_error() {
            tracing::warn!(%status, code = error.code(), %error, "Upstream failure");
        }

        let body = ErrorBody {
            code: error.code().to_string(),
            message: error.to_string(),
            fields: error.fields(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Dependency;
    use crate::types::AppointmentStatus;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (BookingError::validation("bad", ["title"]), StatusCode::UNPROCESSABLE_ENTITY),
            (BookingError::event_not_found("E1"), StatusCode::NOT_FOUND),
            (BookingError::slot_taken("E1/X1"), StatusCode::CONFLICT),
            (
                BookingError::InvalidTransition {
                    from: AppointmentStatus::Cancelled,
                    to: AppointmentStatus::Confirmed,
                },
                StatusCode::CONFLICT,
            ),
            (
                BookingError::Permission {
                    user_id: "U9".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                BookingError::DependencyTimeout {
                    dependency: Dependency::IdentityLookup,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                BookingError::Dependency {
                    dependency: Dependency::EventRegistry,
                    message: "503".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                BookingError::Storage {
                    message: "disk".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }

    #[test]
    fn test_display_includes_code() {
        let err = ApiError::from(BookingError::validation("title is required", ["title"]));
        assert_eq!(err.to_string(), "[VALIDATION_ERROR] title is required");
    }

    #[test]
    fn test_bad_request_keeps_validation_code() {
        let err = ApiError::bad_request("X-User-Id header is required", &["X-User-Id"]);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error().code(), "VALIDATION_ERROR");
        assert_eq!(err.error().fields(), vec!["X-User-Id".to_string()]);
    }
}
