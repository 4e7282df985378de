//! Backend listing and connectivity handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::{AppError, AppState};
use crate::client::BackendKind;

#[derive(Debug, Serialize)]
pub struct BackendResponse {
    pub name: String,
    pub kind: BackendKind,
}

/// List all configured backends
pub async fn list(State(state): State<AppState>) -> Json<Vec<BackendResponse>> {
    Json(
        state
            .backends()
            .map(|client| BackendResponse {
                name: client.name().to_string(),
                kind: client.backend(),
            })
            .collect(),
    )
}

/// Test a backend connection
pub async fn test(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let client = state.backend(&name)?;
    let connected = client.test_connection().await?;
    let message = if connected {
        "Connection successful"
    } else {
        "Connection failed"
    };

    Ok(Json(json!({
        "success": connected,
        "message": message,
    })))
}
