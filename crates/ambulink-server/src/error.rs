use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use ambulink_core::MatchError;
use ambulink_storage::{ErrorCategory, StorageError};

use crate::accounts::AccountError;
use crate::registry::RegistryError;
use crate::responder::ResponderError;

/// HTTP-facing error. Serialized as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err.category() {
            ErrorCategory::Conflict => Self::Conflict(err.to_string()),
            ErrorCategory::Validation => Self::BadRequest(err.to_string()),
            ErrorCategory::Persistence => Self::Internal(err.to_string()),
        }
    }
}

impl From<MatchError> for ApiError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::RequestedDoctorNotFound { .. } => Self::NotFound(err.to_string()),
            MatchError::RequestedDoctorUnavailable { .. } | MatchError::NoCandidate { .. } => {
                Self::Conflict(err.to_string())
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::DoctorNotFound { .. } => Self::NotFound(err.to_string()),
            RegistryError::Match(e) => e.into(),
            RegistryError::Storage(e) => Self::Internal(format!("Failed to update doctors: {e}")),
        }
    }
}

impl From<ResponderError> for ApiError {
    fn from(err: ResponderError) -> Self {
        match err {
            ResponderError::Upstream(_) => Self::Upstream("Failed to get AI response".into()),
            ResponderError::Context(e) => e.into(),
            ResponderError::PatientNotFound { .. } => Self::not_found("Patient not found"),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Duplicate
            | AccountError::InvalidCredentials
            | AccountError::MissingField(_) => Self::BadRequest(err.to_string()),
            AccountError::Hashing(_) => Self::Internal(err.to_string()),
            AccountError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                RegistryError::DoctorNotFound { id: "9".into() }.into(),
                StatusCode::NOT_FOUND,
            ),
            (
                MatchError::RequestedDoctorUnavailable {
                    name: "Dr. Smith".into(),
                    availability: "Busy".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                MatchError::NoCandidate {
                    condition: "Burns".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                StorageError::io(std::path::Path::new("x"), "denied").into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AccountError::InvalidCredentials.into(), StatusCode::BAD_REQUEST),
            (
                ResponderError::PatientNotFound { id: "ghost".into() }.into(),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn upstream_message_is_generic() {
        let err: ApiError = ResponderError::Upstream(
            ambulink_notifications::NotificationError::RequestFailed("timeout".into()),
        )
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "Failed to get AI response");
    }
}
