//! Client error types

/// Failure inside the two-phase RPC protocol
///
/// Only carries strings, so no HTTP or JSON library error type leaves the
/// transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("unexpected HTTP status {status}, body: {body}")]
    Status { status: u16, body: String },

    #[error("did not get back a JSON response body, got \"{body}\" instead")]
    NotJson { body: String },
}

/// Unified error type for client operations
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{method}: {source}")]
    Transport {
        method: String,
        #[source]
        source: TransportError,
    },

    #[error("{method}: backend returned an error: {message}")]
    Backend { method: String, message: String },

    #[error("{method}: expected exactly one of a torrent or a torrent id")]
    InvalidArgument { method: String },

    #[error("{method}: invalid response: {message}")]
    InvalidResponse { method: String, message: String },

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Operation not supported by {backend}: {operation}")]
    NotSupported {
        backend: &'static str,
        operation: &'static str,
    },
}

impl ClientError {
    pub(crate) fn transport(method: &str, source: TransportError) -> Self {
        Self::Transport {
            method: method.to_string(),
            source,
        }
    }

    pub(crate) fn invalid_response(method: &str, message: impl ToString) -> Self {
        Self::InvalidResponse {
            method: method.to_string(),
            message: message.to_string(),
        }
    }

    /// The RPC method that was being attempted, when one was
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Transport { method, .. }
            | Self::Backend { method, .. }
            | Self::InvalidArgument { method }
            | Self::InvalidResponse { method, .. } => Some(method),
            Self::TorrentNotFound(_) | Self::NotSupported { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
