//! BitTorrent daemon abstraction layer
//!
//! This module provides a unified interface for driving different torrent
//! daemons (Deluge, Transmission) over their JSON-RPC endpoints.

mod deluge;
mod envelope;
mod error;
pub mod http;
mod strategy;
mod transmission;
mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use deluge::{DelugeClient, DelugeProtocol, DelugeTransport};
pub use envelope::ResponseEnvelope;
pub use error::{ClientError, Result, TransportError};
pub use strategy::{BlockingClient, EventLoop};
pub use transmission::{TransmissionClient, TransmissionProtocol, TransmissionTransport};
pub use transport::{RpcProtocol, RpcReply, RpcTransport, SessionMode};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::model::{Torrent, TorrentInfo};
use http::HttpClient;

/// Supported daemon families
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Deluge,
    Transmission,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Deluge => "deluge",
            BackendKind::Transmission => "transmission",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "deluge" | "de" => Ok(BackendKind::Deluge),
            "transmission" | "tr" => Ok(BackendKind::Transmission),
            _ => Err(format!("Unknown backend type: {}", s)),
        }
    }
}

/// Where a torrent to add (or inspect) comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentSource {
    /// A `.torrent` URL, or a path the daemon can read
    Url(String),
    Magnet(String),
    /// Raw `.torrent` contents
    File { name: String, bytes: Vec<u8> },
}

impl TorrentSource {
    /// Magnet links are recognised by scheme; anything else is a URL
    pub fn parse(source: &str) -> Self {
        if source.to_ascii_lowercase().starts_with("magnet:") {
            TorrentSource::Magnet(source.to_string())
        } else {
            TorrentSource::Url(source.to_string())
        }
    }
}

/// Either a torrent snapshot or its raw id, for operations on one torrent
///
/// Exactly one of the two must be present; [`TorrentRef::resolve`] enforces
/// that before anything goes over the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct TorrentRef<'a> {
    torrent: Option<&'a Torrent>,
    id: Option<&'a str>,
}

impl<'a> TorrentRef<'a> {
    pub fn new(torrent: Option<&'a Torrent>, id: Option<&'a str>) -> Self {
        Self { torrent, id }
    }

    pub fn resolve(&self, method: &str) -> Result<&'a str> {
        match (self.torrent, self.id) {
            (Some(torrent), None) if !torrent.hash_string.is_empty() => Ok(&torrent.hash_string),
            (None, Some(id)) if !id.is_empty() => Ok(id),
            _ => Err(ClientError::InvalidArgument {
                method: method.to_string(),
            }),
        }
    }
}

impl<'a> From<&'a Torrent> for TorrentRef<'a> {
    fn from(torrent: &'a Torrent) -> Self {
        Self::new(Some(torrent), None)
    }
}

impl<'a> From<&'a str> for TorrentRef<'a> {
    fn from(id: &'a str) -> Self {
        Self::new(None, Some(id))
    }
}

/// Unified interface for torrent daemons
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Get the backend family
    fn backend(&self) -> BackendKind;

    /// Get the configured connection name
    fn name(&self) -> &str;

    /// Check that the daemon is reachable and accepts the credential
    async fn test_connection(&self) -> Result<bool>;

    /// Add a torrent and return its normalized snapshot
    async fn add_torrent(&self, source: TorrentSource) -> Result<Torrent>;

    /// Get a specific torrent by hash
    async fn get_torrent(&self, id: &str) -> Result<Torrent>;

    /// Get the given torrents, or all of them when `ids` is empty
    async fn get_torrents(&self, ids: &[String]) -> Result<Vec<Torrent>>;

    /// Start (resume) a torrent and return its updated snapshot
    async fn start_torrent(&self, target: TorrentRef<'_>) -> Result<Torrent>;

    /// Pause a torrent and return its updated snapshot
    async fn pause_torrent(&self, target: TorrentRef<'_>) -> Result<Torrent>;

    /// Remove a torrent with its data; returns the daemon's raw confirmation
    async fn delete_torrent(&self, target: TorrentRef<'_>) -> Result<Value>;

    /// Inspect a torrent's file tree without adding it
    async fn get_torrent_info(&self, _source: TorrentSource) -> Result<TorrentInfo> {
        Err(ClientError::NotSupported {
            backend: self.backend().as_str(),
            operation: "get_torrent_info",
        })
    }
}

/// Create a client for `kind` over the given HTTP collaborator
pub fn create_client(
    name: impl Into<String>,
    kind: BackendKind,
    config: ConnectionConfig,
    http: Arc<dyn HttpClient>,
    mode: SessionMode,
) -> Arc<dyn TorrentClient> {
    let name = name.into();
    match kind {
        BackendKind::Deluge => Arc::new(DelugeClient::new(
            name,
            RpcTransport::new(config, http, DelugeProtocol).with_session_mode(mode),
        )),
        BackendKind::Transmission => Arc::new(TransmissionClient::new(
            name,
            RpcTransport::new(config, http, TransmissionProtocol).with_session_mode(mode),
        )),
    }
}
