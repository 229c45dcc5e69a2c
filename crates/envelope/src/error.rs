use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EnvelopeError>;

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Errors raised while decoding an inbound webhook body. Both variants are
/// the caller's signal to respond with a 4xx so the broker does not
/// redeliver a message the core could never make sense of.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed push envelope: {0}")]
    MalformedEnvelope(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

impl IntoResponse for EnvelopeError {
    fn into_response(self) -> Response {
        let (code, message) = match &self {
            Self::MalformedEnvelope(msg) => ("malformed_envelope", msg.clone()),
            Self::MissingField(msg) => ("missing_field", msg.clone()),
        };

        tracing::warn!(error = %self, "envelope_decode_failed");

        let body = Json(ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
            },
        });

        (StatusCode::BAD_REQUEST, body).into_response()
    }
}
