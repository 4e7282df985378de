//! Uniform `{result, error}` response envelope

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ClientError, Result};

/// Decoded RPC response body
///
/// A non-null `error` means the call failed at the backend level even when
/// the HTTP exchange itself succeeded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ResponseEnvelope {
    pub fn success(result: Value) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.error, Some(ref e) if !e.is_null())
    }

    /// Human-readable form of `error`, preferring a `message` field
    pub fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref().filter(|e| !e.is_null())?;
        Some(match error {
            Value::String(s) => s.clone(),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(message)) => message.clone(),
                _ => error.to_string(),
            },
            other => other.to_string(),
        })
    }

    /// `result` for per-call operations, where any envelope error fails the call
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error_message() {
            Some(message) => Err(ClientError::Backend {
                method: method.to_string(),
                message,
            }),
            None => Ok(self.result),
        }
    }
}
