use thiserror::Error;

/// Core error types for Ambulink domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid emergency payload: {message}")]
    InvalidPayload { message: String },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Time formatting error: {0}")]
    TimeError(#[from] time::error::Format),
}

impl CoreError {
    /// Create a new InvalidPayload error
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failures of the doctor matching step.
///
/// Every variant is a distinct, typed outcome; matching never degrades into
/// handing back an arbitrary doctor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("Requested doctor not found: {name}")]
    RequestedDoctorNotFound { name: String },

    #[error("Requested doctor unavailable: {name} is {availability}")]
    RequestedDoctorUnavailable { name: String, availability: String },

    #[error("No available doctor for condition '{condition}'")]
    NoCandidate { condition: String },
}
