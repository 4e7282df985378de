//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::client::ClientError;

/// Application error type
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
        }));

        (self.status, body).into_response()
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        let status = match &err {
            ClientError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            ClientError::TorrentNotFound(_) => StatusCode::NOT_FOUND,
            ClientError::NotSupported { .. } => StatusCode::NOT_IMPLEMENTED,
            ClientError::Transport { .. }
            | ClientError::Backend { .. }
            | ClientError::InvalidResponse { .. } => {
                tracing::error!("Backend error: {}", err);
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, err.to_string())
    }
}
