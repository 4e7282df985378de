//! Transmission RPC client
//!
//! Implements the Transmission RPC protocol. The session token is fetched
//! with a plain GET before the real call instead of waiting for a 409.
//! Reference: https://github.com/transmission/transmission/blob/main/docs/rpc-spec.md

use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http::{HttpRequest, HttpResponse};
use super::{
    BackendKind, ClientError, ResponseEnvelope, Result, RpcProtocol, RpcTransport, TorrentClient,
    TorrentRef, TorrentSource, TransportError,
};
use crate::config::ConnectionConfig;
use crate::model::{File, Torrent};

const SESSION_HEADER: &str = "x-transmission-session-id";

const METHOD_GET: &str = "torrent-get";
const METHOD_ADD: &str = "torrent-add";
const METHOD_START: &str = "torrent-start";
const METHOD_STOP: &str = "torrent-stop";
const METHOD_REMOVE: &str = "torrent-remove";
const METHOD_SESSION_STATS: &str = "session-stats";

const TORRENT_FIELDS: [&str; 12] = [
    "hashString",
    "name",
    "sizeWhenDone",
    "status",
    "rateDownload",
    "rateUpload",
    "downloadedEver",
    "uploadedEver",
    "files",
    "errorString",
    "eta",
    "downloadDir",
];

/// Request shapes of the `/transmission/rpc` endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct TransmissionProtocol;

pub type TransmissionTransport = RpcTransport<TransmissionProtocol>;

fn rpc_url(config: &ConnectionConfig) -> String {
    format!("{}/transmission/rpc", config.base_url())
}

fn with_credentials(request: HttpRequest, config: &ConnectionConfig) -> HttpRequest {
    match config.username() {
        Some(username) => request.basic_auth(username, config.credential()),
        None => request,
    }
}

impl RpcProtocol for TransmissionProtocol {
    const BACKEND: BackendKind = BackendKind::Transmission;

    fn auth_request(&self, config: &ConnectionConfig, _id: u64) -> HttpRequest {
        with_credentials(HttpRequest::new(Method::GET, rpc_url(config)), config)
    }

    /// The daemon answers the token probe with 409 Conflict plus the header
    fn session_from_auth(&self, response: &HttpResponse) -> std::result::Result<String, TransportError> {
        if !response.is_success() && response.status != 409 {
            return Err(TransportError::AuthenticationFailed(format!(
                "session probe returned HTTP {}",
                response.status
            )));
        }

        response
            .header(SESSION_HEADER)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                TransportError::AuthenticationFailed(
                    "response did not include an X-Transmission-Session-Id header".to_string(),
                )
            })
    }

    fn call_request(
        &self,
        config: &ConnectionConfig,
        session: &str,
        method: &str,
        params: &Value,
        id: u64,
    ) -> HttpRequest {
        let mut arguments = match params {
            Value::Object(args) => args.clone(),
            _ => Map::new(),
        };
        if method == METHOD_GET {
            arguments
                .entry("fields")
                .or_insert_with(|| json!(TORRENT_FIELDS));
        }

        let request = HttpRequest::new(Method::POST, rpc_url(config))
            .header(SESSION_HEADER, session)
            .json(&json!({
                "method": method,
                "arguments": arguments,
                "tag": id,
            }));
        with_credentials(request, config)
    }

    /// `{"result": "success", "arguments": {...}}` becomes `{result: arguments}`;
    /// any other result string becomes the envelope error
    fn decode(&self, body: Value) -> ResponseEnvelope {
        let raw: TrResponse = match serde_json::from_value(body) {
            Ok(raw) => raw,
            Err(e) => {
                return ResponseEnvelope {
                    result: Value::Null,
                    error: Some(Value::String(format!("malformed response: {}", e))),
                }
            }
        };

        if raw.result == "success" {
            ResponseEnvelope::success(raw.arguments)
        } else {
            ResponseEnvelope {
                result: raw.arguments,
                error: Some(Value::String(raw.result)),
            }
        }
    }

    fn is_stale_session(&self, response: &HttpResponse) -> bool {
        response.status == 409
    }
}

impl RpcTransport<TransmissionProtocol> {
    fn ids_arguments(ids: &[String]) -> Value {
        if ids.is_empty() {
            json!({})
        } else {
            json!({ "ids": ids })
        }
    }

    pub async fn get_torrents(&self, ids: &[String]) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_GET, Self::ids_arguments(ids))
            .await
    }

    /// Same call as [`get_torrents`](Self::get_torrents), raw body included
    pub async fn get_torrents_raw(&self, ids: &[String]) -> Result<String> {
        self.perform_raw(METHOD_GET, Self::ids_arguments(ids)).await
    }

    pub async fn add_torrent(&self, source: &TorrentSource) -> Result<ResponseEnvelope> {
        let args = match source {
            TorrentSource::Url(url) | TorrentSource::Magnet(url) => json!({
                "filename": url,
                "paused": false,
            }),
            TorrentSource::File { bytes, .. } => json!({
                "metainfo": base64::engine::general_purpose::STANDARD.encode(bytes),
                "paused": false,
            }),
        };
        self.perform_rpc_request(METHOD_ADD, args).await
    }

    pub async fn start_torrent(&self, id: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_START, json!({ "ids": [id] }))
            .await
    }

    pub async fn stop_torrent(&self, id: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_STOP, json!({ "ids": [id] }))
            .await
    }

    pub async fn remove_torrent(&self, id: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(
            METHOD_REMOVE,
            json!({ "ids": [id], "delete-local-data": true }),
        )
        .await
    }

    pub async fn session_stats(&self) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_SESSION_STATS, json!({}))
            .await
    }
}

/// Transmission adapter implementing [`TorrentClient`]
pub struct TransmissionClient {
    name: String,
    transport: TransmissionTransport,
}

impl TransmissionClient {
    pub fn new(name: impl Into<String>, transport: TransmissionTransport) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn transport(&self) -> &TransmissionTransport {
        &self.transport
    }

    async fn refetch(&self, id: &str) -> Result<Torrent> {
        self.get_torrents(&[id.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::TorrentNotFound(id.to_string()))
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Transmission
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn test_connection(&self) -> Result<bool> {
        self.transport
            .session_stats()
            .await?
            .into_result(METHOD_SESSION_STATS)?;
        Ok(true)
    }

    async fn add_torrent(&self, source: TorrentSource) -> Result<Torrent> {
        let result = self
            .transport
            .add_torrent(&source)
            .await?
            .into_result(METHOD_ADD)?;

        let response: AddTorrentResponse = serde_json::from_value(result)
            .map_err(|e| ClientError::invalid_response(METHOD_ADD, e))?;
        let hash = response
            .torrent_added
            .or(response.torrent_duplicate)
            .map(|t| t.hash_string)
            .ok_or_else(|| ClientError::invalid_response(METHOD_ADD, "no torrent id returned"))?;
        debug!("Added torrent {hash}");

        self.get_torrent(&hash).await
    }

    async fn get_torrent(&self, id: &str) -> Result<Torrent> {
        self.refetch(id).await
    }

    async fn get_torrents(&self, ids: &[String]) -> Result<Vec<Torrent>> {
        let result = self
            .transport
            .get_torrents(ids)
            .await?
            .into_result(METHOD_GET)?;

        let response: TorrentsResponse = serde_json::from_value(result)
            .map_err(|e| ClientError::invalid_response(METHOD_GET, e))?;
        debug!("Fetched {} torrents", response.torrents.len());

        Ok(response.torrents.into_iter().map(Torrent::from).collect())
    }

    async fn start_torrent(&self, target: TorrentRef<'_>) -> Result<Torrent> {
        let id = target.resolve(METHOD_START)?;
        self.transport
            .start_torrent(id)
            .await?
            .into_result(METHOD_START)?;
        self.refetch(id).await
    }

    async fn pause_torrent(&self, target: TorrentRef<'_>) -> Result<Torrent> {
        let id = target.resolve(METHOD_STOP)?;
        self.transport
            .stop_torrent(id)
            .await?
            .into_result(METHOD_STOP)?;
        self.refetch(id).await
    }

    async fn delete_torrent(&self, target: TorrentRef<'_>) -> Result<Value> {
        let id = target.resolve(METHOD_REMOVE)?;
        debug!("Removing torrent {id}");
        self.transport
            .remove_torrent(id)
            .await?
            .into_result(METHOD_REMOVE)
    }
}

// Transmission RPC response types

#[derive(Debug, Deserialize)]
struct TrResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct TorrentsResponse {
    #[serde(default)]
    torrents: Vec<TrTorrent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrTorrent {
    hash_string: String,
    name: String,
    #[serde(default)]
    size_when_done: u64,
    #[serde(default)]
    status: i32,
    #[serde(default)]
    rate_download: u64,
    #[serde(default)]
    rate_upload: u64,
    #[serde(default)]
    downloaded_ever: u64,
    #[serde(default)]
    uploaded_ever: u64,
    #[serde(default)]
    error_string: String,
    eta: Option<i64>,
    download_dir: Option<String>,
    #[serde(default)]
    files: Vec<TrFile>,
}

#[derive(Debug, Deserialize)]
struct TrFile {
    name: String,
    length: u64,
}

#[derive(Debug, Deserialize)]
struct AddTorrentResponse {
    #[serde(rename = "torrent-added")]
    torrent_added: Option<AddedTorrent>,
    #[serde(rename = "torrent-duplicate")]
    torrent_duplicate: Option<AddedTorrent>,
}

#[derive(Debug, Deserialize)]
struct AddedTorrent {
    #[serde(rename = "hashString")]
    hash_string: String,
}

/// Transmission status codes as display names
fn status_name(code: i32) -> &'static str {
    match code {
        0 => "Stopped",
        1 => "Check pending",
        2 => "Checking",
        3 => "Download pending",
        4 => "Downloading",
        5 => "Seed pending",
        6 => "Seeding",
        _ => "Unknown",
    }
}

impl From<TrTorrent> for Torrent {
    fn from(t: TrTorrent) -> Self {
        let mut torrent = Torrent::build(t.hash_string, t.name, t.size_when_done);
        torrent.download_speed = t.rate_download;
        torrent.upload_speed = t.rate_upload;
        torrent.bytes_downloaded = t.downloaded_ever;
        torrent.bytes_uploaded = t.uploaded_ever;
        torrent.status = status_name(t.status).to_string();
        torrent.error_string = t.error_string;
        // -1 means not available, -2 unknown
        torrent.eta = t.eta.filter(|eta| *eta >= 0);
        torrent.path = t.download_dir;

        for f in t.files {
            torrent.add_file(File::build(f.name, f.length));
        }

        torrent
    }
}
