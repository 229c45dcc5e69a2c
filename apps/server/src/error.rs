use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Errors surfaced at the HTTP boundary. Business-level failures inside
/// a webhook (a failed analysis call, a finalize retry) never reach this
/// type — they are recorded as error sub-results and the handler still
/// returns 200, per spec §4.8/§7's "the broker should not redeliver a
/// message the system has durably recorded" rule. Only malformed input
/// and not-found reads flow through here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Envelope(#[from] envelope::EnvelopeError),
    #[error("not found: {0}")]
    NotFound(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            Self::Envelope(err) => err.into_response(),
            Self::NotFound(message) => {
                let body = Json(ErrorResponse {
                    error: ErrorDetails {
                        code: "not_found".to_string(),
                        message,
                    },
                });
                (StatusCode::NOT_FOUND, body).into_response()
            }
        }
    }
}
