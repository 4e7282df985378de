//! Two-phase RPC transport
//!
//! Every call authenticates first and then issues the real method with the
//! session artifact the backend handed out. The backends differ only in how
//! those two requests look, which is what [`RpcProtocol`] captures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::http::{HttpClient, HttpRequest, HttpResponse};
use super::{BackendKind, ClientError, ResponseEnvelope, Result, TransportError};
use crate::config::ConnectionConfig;

/// Whether the session artifact survives between calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Authenticate again before every call
    #[default]
    PerCall,
    /// Reuse the last session until the backend reports it stale
    Cached,
}

/// Backend-specific shape of the auth and domain requests
pub trait RpcProtocol: Send + Sync + 'static {
    const BACKEND: BackendKind;

    /// The request that opens a session
    fn auth_request(&self, config: &ConnectionConfig, id: u64) -> HttpRequest;

    /// Pull the session artifact (cookie or token) out of the auth response
    fn session_from_auth(&self, response: &HttpResponse) -> std::result::Result<String, TransportError>;

    /// The domain call, carrying `session`
    fn call_request(
        &self,
        config: &ConnectionConfig,
        session: &str,
        method: &str,
        params: &Value,
        id: u64,
    ) -> HttpRequest;

    /// Map a parsed response body onto the uniform envelope
    fn decode(&self, body: Value) -> ResponseEnvelope;

    /// True when the backend rejected a reused session
    fn is_stale_session(&self, response: &HttpResponse) -> bool;
}

enum RpcState {
    Unauthenticated,
    AuthPending(HttpResponse),
    Authenticated { session: String, reused: bool },
    Completed(HttpResponse),
}

/// A validated response: status 200 and a JSON body
#[derive(Debug, Clone)]
pub struct RpcReply {
    pub body: String,
    pub json: Value,
}

/// Runs the authenticate-then-call protocol of one backend connection
pub struct RpcTransport<P: RpcProtocol> {
    config: ConnectionConfig,
    http: Arc<dyn HttpClient>,
    protocol: P,
    mode: SessionMode,
    next_id: AtomicU64,
    session: RwLock<Option<String>>,
}

impl<P: RpcProtocol> RpcTransport<P> {
    pub fn new(config: ConnectionConfig, http: Arc<dyn HttpClient>, protocol: P) -> Self {
        Self {
            config,
            http,
            protocol,
            mode: SessionMode::PerCall,
            next_id: AtomicU64::new(1),
            session: RwLock::new(None),
        }
    }

    pub fn with_session_mode(mut self, mode: SessionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn session_mode(&self) -> SessionMode {
        self.mode
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run `method` and decode the body into a [`ResponseEnvelope`]
    pub async fn perform_rpc_request(&self, method: &str, params: Value) -> Result<ResponseEnvelope> {
        let reply = self
            .execute(method, &params)
            .await
            .map_err(|e| ClientError::transport(method, e))?;

        Ok(self.protocol.decode(reply.json))
    }

    /// Run `method` and hand back the raw, already validated body
    pub async fn perform_raw(&self, method: &str, params: Value) -> Result<String> {
        self.execute(method, &params)
            .await
            .map(|reply| reply.body)
            .map_err(|e| ClientError::transport(method, e))
    }

    async fn execute(&self, method: &str, params: &Value) -> std::result::Result<RpcReply, TransportError> {
        let mut state = match self.cached_session().await {
            Some(session) => RpcState::Authenticated {
                session,
                reused: true,
            },
            None => RpcState::Unauthenticated,
        };

        loop {
            state = match state {
                RpcState::Unauthenticated => {
                    let request = self.protocol.auth_request(&self.config, self.next_id());
                    debug!(backend = %P::BACKEND, url = %request.url, "Authenticating");
                    RpcState::AuthPending(self.http.send(request).await?)
                }
                RpcState::AuthPending(response) => {
                    let session = self.protocol.session_from_auth(&response).map_err(|e| {
                        warn!(backend = %P::BACKEND, status = response.status, "Authentication failed: {}", e);
                        e
                    })?;
                    if self.mode == SessionMode::Cached {
                        *self.session.write().await = Some(session.clone());
                    }
                    RpcState::Authenticated {
                        session,
                        reused: false,
                    }
                }
                RpcState::Authenticated { session, reused } => {
                    let request =
                        self.protocol
                            .call_request(&self.config, &session, method, params, self.next_id());
                    debug!(backend = %P::BACKEND, method, "Calling");
                    let response = self.http.send(request).await?;

                    if reused && self.protocol.is_stale_session(&response) {
                        debug!(backend = %P::BACKEND, "Cached session rejected, authenticating again");
                        *self.session.write().await = None;
                        RpcState::Unauthenticated
                    } else {
                        RpcState::Completed(response)
                    }
                }
                RpcState::Completed(response) => return validate(method, response),
            };
        }
    }

    async fn cached_session(&self) -> Option<String> {
        match self.mode {
            SessionMode::PerCall => None,
            SessionMode::Cached => self.session.read().await.clone(),
        }
    }
}

fn validate(method: &str, response: HttpResponse) -> std::result::Result<RpcReply, TransportError> {
    if response.status != 200 {
        debug!(method, status = response.status, "Unexpected status");
        return Err(TransportError::Status {
            status: response.status,
            body: response.body,
        });
    }

    match serde_json::from_str(&response.body) {
        Ok(json) => Ok(RpcReply {
            body: response.body,
            json,
        }),
        Err(_) => Err(TransportError::NotJson {
            body: response.body,
        }),
    }
}
