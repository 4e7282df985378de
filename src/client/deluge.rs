//! Deluge Web JSON-RPC client
//!
//! Authenticates with `auth.login` and carries the `_session_id` cookie into
//! the real call.
//! Reference: https://deluge.readthedocs.io/en/latest/reference/api.html

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine;
use regex::Regex;
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
use crate::model::{File, Torrent, TorrentInfo};

const METHOD_AUTH: &str = "auth.login";
const METHOD_SESSION_STATE: &str = "core.get_session_state";
const METHOD_WEB_UI: &str = "web.update_ui";
const METHOD_GET: &str = "core.get_torrent_status";
const METHOD_GET_ALL: &str = "core.get_torrents_status";
const METHOD_ADD_URL: &str = "core.add_torrent_url";
const METHOD_ADD_MAGNET: &str = "core.add_torrent_magnet";
const METHOD_ADD_FILE: &str = "core.add_torrent_file";
const METHOD_START: &str = "core.resume_torrent";
const METHOD_PAUSE: &str = "core.pause_torrent";
const METHOD_DELETE: &str = "core.remove_torrent";
/// Needs the Label plugin enabled on the daemon
const METHOD_SET_LABEL: &str = "label.set_torrent";
const METHOD_TORRENT_INFO: &str = "web.get_torrent_info";
const METHOD_MAGNET_INFO: &str = "web.get_magnet_info";

/// Deluge's "Not authenticated" error code
const ERROR_NOT_AUTHENTICATED: i64 = 1;

const TORRENT_FIELDS: [&str; 12] = [
    "name",
    "state",
    "files",
    "eta",
    "hash",
    "download_payload_rate",
    "upload_payload_rate",
    "total_wanted",
    "total_uploaded",
    "total_done",
    "save_path",
    "label",
];

/// Columns the Web UI's torrent grid asks for
const WEB_UI_FIELDS: [&str; 24] = [
    "queue",
    "name",
    "total_wanted",
    "state",
    "progress",
    "num_seeds",
    "total_seeds",
    "num_peers",
    "total_peers",
    "download_payload_rate",
    "upload_payload_rate",
    "eta",
    "ratio",
    "distributed_copies",
    "is_auto_managed",
    "time_added",
    "tracker_host",
    "save_path",
    "total_done",
    "total_uploaded",
    "max_download_speed",
    "max_upload_speed",
    "seeds_peers_ratio",
    "label",
];

static SESSION_COOKIE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_session_id=([^;\s]+)").expect("valid regex"));

/// Request shapes of the Deluge Web UI `/json` endpoint
#[derive(Debug, Clone, Copy, Default)]
pub struct DelugeProtocol;

pub type DelugeTransport = RpcTransport<DelugeProtocol>;

fn rpc_url(config: &ConnectionConfig) -> String {
    format!("{}/json", config.base_url())
}

impl RpcProtocol for DelugeProtocol {
    const BACKEND: BackendKind = BackendKind::Deluge;

    fn auth_request(&self, config: &ConnectionConfig, id: u64) -> HttpRequest {
        HttpRequest::new(Method::POST, rpc_url(config)).json(&json!({
            "method": METHOD_AUTH,
            "params": [config.credential()],
            "id": id,
        }))
    }

    fn session_from_auth(&self, response: &HttpResponse) -> std::result::Result<String, TransportError> {
        if !response.is_success() {
            return Err(TransportError::AuthenticationFailed(format!(
                "{} returned HTTP {}",
                METHOD_AUTH, response.status
            )));
        }

        let envelope: ResponseEnvelope = serde_json::from_str(&response.body).map_err(|_| {
            TransportError::AuthenticationFailed(format!(
                "{} did not return JSON, got \"{}\"",
                METHOD_AUTH, response.body
            ))
        })?;
        if envelope.result != Value::Bool(true) {
            return Err(TransportError::AuthenticationFailed(
                envelope
                    .error_message()
                    .unwrap_or_else(|| "credential rejected".to_string()),
            ));
        }

        response
            .header_all("set-cookie")
            .into_iter()
            .find_map(|cookie| SESSION_COOKIE.captures(cookie))
            .map(|caps| format!("_session_id={}", &caps[1]))
            .ok_or_else(|| {
                TransportError::AuthenticationFailed(
                    "response did not set a _session_id cookie".to_string(),
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
        HttpRequest::new(Method::POST, rpc_url(config))
            .header("cookie", session)
            .json(&json!({
                "method": method,
                "params": params,
                "id": id,
            }))
    }

    fn decode(&self, body: Value) -> ResponseEnvelope {
        match serde_json::from_value(body) {
            Ok(envelope) => envelope,
            Err(e) => ResponseEnvelope {
                result: Value::Null,
                error: Some(Value::String(format!("malformed envelope: {}", e))),
            },
        }
    }

    fn is_stale_session(&self, response: &HttpResponse) -> bool {
        if response.status == 401 || response.status == 403 {
            return true;
        }
        serde_json::from_str::<Value>(&response.body)
            .ok()
            .and_then(|body| body["error"]["code"].as_i64())
            == Some(ERROR_NOT_AUTHENTICATED)
    }
}

impl RpcTransport<DelugeProtocol> {
    /// All torrents when `ids` is empty, otherwise just those ids
    pub async fn get_torrents(&self, ids: &[String]) -> Result<ResponseEnvelope> {
        match ids {
            [] => {
                self.perform_rpc_request(METHOD_GET_ALL, json!([null, TORRENT_FIELDS]))
                    .await
            }
            [id] => {
                self.perform_rpc_request(METHOD_GET, json!([id, TORRENT_FIELDS]))
                    .await
            }
            _ => {
                self.perform_rpc_request(METHOD_GET_ALL, json!([{ "id": ids }, TORRENT_FIELDS]))
                    .await
            }
        }
    }

    pub async fn add_torrent(&self, source: &TorrentSource) -> Result<ResponseEnvelope> {
        match source {
            TorrentSource::Url(url) => {
                self.perform_rpc_request(METHOD_ADD_URL, json!([url, {}]))
                    .await
            }
            TorrentSource::Magnet(uri) => {
                self.perform_rpc_request(METHOD_ADD_MAGNET, json!([uri, { "add_paused": false }]))
                    .await
            }
            TorrentSource::File { name, bytes } => {
                let dump = base64::engine::general_purpose::STANDARD.encode(bytes);
                self.perform_rpc_request(METHOD_ADD_FILE, json!([name, dump, {}]))
                    .await
            }
        }
    }

    pub async fn start_torrent(&self, id: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_START, json!([[id]])).await
    }

    pub async fn pause_torrent(&self, id: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_PAUSE, json!([[id]])).await
    }

    /// Removes the torrent together with its downloaded data
    pub async fn delete_torrent(&self, id: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_DELETE, json!([id, true]))
            .await
    }

    pub async fn get_session_state(&self) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_SESSION_STATE, json!([]))
            .await
    }

    /// Torrents, filters and daemon stats in one call, as the Web UI polls them
    pub async fn get_web_ui(&self) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_WEB_UI, json!([WEB_UI_FIELDS, {}]))
            .await
    }

    pub async fn set_label(&self, id: &str, label: &str) -> Result<ResponseEnvelope> {
        self.perform_rpc_request(METHOD_SET_LABEL, json!([id, label]))
            .await
    }

    pub async fn get_torrent_info(&self, source: &TorrentSource) -> Result<ResponseEnvelope> {
        match source {
            TorrentSource::Url(path) => {
                self.perform_rpc_request(METHOD_TORRENT_INFO, json!([path]))
                    .await
            }
            TorrentSource::Magnet(uri) => {
                self.perform_rpc_request(METHOD_MAGNET_INFO, json!([uri]))
                    .await
            }
            TorrentSource::File { .. } => Err(ClientError::NotSupported {
                backend: "deluge",
                operation: "get_torrent_info from file contents",
            }),
        }
    }
}

/// Deluge adapter implementing [`TorrentClient`]
pub struct DelugeClient {
    name: String,
    transport: DelugeTransport,
}

impl DelugeClient {
    pub fn new(name: impl Into<String>, transport: DelugeTransport) -> Self {
        Self {
            name: name.into(),
            transport,
        }
    }

    pub fn transport(&self) -> &DelugeTransport {
        &self.transport
    }

    /// Hashes of every torrent in the session
    pub async fn session_state(&self) -> Result<Vec<String>> {
        let result = self
            .transport
            .get_session_state()
            .await?
            .into_result(METHOD_SESSION_STATE)?;

        serde_json::from_value(result).map_err(|e| ClientError::invalid_response(METHOD_SESSION_STATE, e))
    }

    /// Raw `web.update_ui` snapshot: `{torrents, filters, stats, connected}`
    pub async fn web_ui(&self) -> Result<Value> {
        self.transport
            .get_web_ui()
            .await?
            .into_result(METHOD_WEB_UI)
    }

    pub async fn set_label(&self, target: TorrentRef<'_>, label: &str) -> Result<()> {
        let id = target.resolve(METHOD_SET_LABEL)?;
        debug!("Labelling torrent {id} as {label:?}");
        self.transport
            .set_label(id, label)
            .await?
            .into_result(METHOD_SET_LABEL)?;
        Ok(())
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
impl TorrentClient for DelugeClient {
    fn backend(&self) -> BackendKind {
        BackendKind::Deluge
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn test_connection(&self) -> Result<bool> {
        self.session_state().await?;
        Ok(true)
    }

    async fn add_torrent(&self, source: TorrentSource) -> Result<Torrent> {
        debug!("Adding torrent from {:?}", source_kind(&source));
        let method = match source {
            TorrentSource::Url(_) => METHOD_ADD_URL,
            TorrentSource::Magnet(_) => METHOD_ADD_MAGNET,
            TorrentSource::File { .. } => METHOD_ADD_FILE,
        };

        let result = self
            .transport
            .add_torrent(&source)
            .await?
            .into_result(method)?;

        let hash = result
            .as_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ClientError::invalid_response(method, "no torrent id returned"))?
            .to_string();
        debug!("Added torrent {hash}");

        self.get_torrent(&hash).await
    }

    async fn get_torrent(&self, id: &str) -> Result<Torrent> {
        self.refetch(id).await
    }

    async fn get_torrents(&self, ids: &[String]) -> Result<Vec<Torrent>> {
        let envelope = self.transport.get_torrents(ids).await?;
        let method = if ids.len() == 1 { METHOD_GET } else { METHOD_GET_ALL };
        let torrents = normalize_torrents(method, ids, envelope)?;
        debug!("Fetched {} torrents", torrents.len());
        Ok(torrents)
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
        let id = target.resolve(METHOD_PAUSE)?;
        self.transport
            .pause_torrent(id)
            .await?
            .into_result(METHOD_PAUSE)?;
        self.refetch(id).await
    }

    async fn delete_torrent(&self, target: TorrentRef<'_>) -> Result<Value> {
        let id = target.resolve(METHOD_DELETE)?;
        debug!("Removing torrent {id}");
        self.transport
            .delete_torrent(id)
            .await?
            .into_result(METHOD_DELETE)
    }

    async fn get_torrent_info(&self, source: TorrentSource) -> Result<TorrentInfo> {
        let method = match source {
            TorrentSource::Magnet(_) => METHOD_MAGNET_INFO,
            _ => METHOD_TORRENT_INFO,
        };
        let result = self
            .transport
            .get_torrent_info(&source)
            .await?
            .into_result(method)?;

        TorrentInfo::build(result).map_err(|e| ClientError::invalid_response(method, e))
    }
}

fn source_kind(source: &TorrentSource) -> &'static str {
    match source {
        TorrentSource::Url(_) => "url",
        TorrentSource::Magnet(_) => "magnet",
        TorrentSource::File { .. } => "file",
    }
}

// Deluge RPC response types

#[derive(Debug, Deserialize)]
struct DelugeTorrent {
    hash: String,
    name: String,
    total_wanted: u64,
    #[serde(default)]
    download_payload_rate: u64,
    #[serde(default)]
    upload_payload_rate: u64,
    #[serde(default)]
    total_done: u64,
    #[serde(default)]
    total_uploaded: u64,
    #[serde(default)]
    state: String,
    eta: Option<i64>,
    save_path: Option<String>,
    #[serde(default)]
    files: Vec<DelugeFile>,
}

#[derive(Debug, Deserialize)]
struct DelugeFile {
    path: String,
    size: u64,
}

impl From<DelugeTorrent> for Torrent {
    fn from(t: DelugeTorrent) -> Self {
        let mut torrent = Torrent::build(t.hash, t.name, t.total_wanted);
        torrent.download_speed = t.download_payload_rate;
        torrent.upload_speed = t.upload_payload_rate;
        torrent.status = t.state;
        torrent.bytes_downloaded = t.total_done;
        torrent.bytes_uploaded = t.total_uploaded;
        torrent.eta = t.eta;
        torrent.path = t.save_path;

        for f in t.files {
            torrent.add_file(File::build(f.path, f.size));
        }

        torrent
    }
}

/// Map a status envelope onto torrents
///
/// Single-id lookups answer with one unkeyed record; it is re-keyed under
/// the requested id so both shapes share one path. Deluge has no per-torrent
/// error string, so a global envelope error is copied onto every torrent.
fn normalize_torrents(
    method: &str,
    ids: &[String],
    envelope: ResponseEnvelope,
) -> Result<Vec<Torrent>> {
    let error_string = envelope.error_message().unwrap_or_default();
    let failed = envelope.is_error();

    let records: Map<String, Value> = match envelope.result {
        Value::Null if failed => {
            return Err(ClientError::Backend {
                method: method.to_string(),
                message: error_string,
            })
        }
        Value::Null => Map::new(),
        Value::Object(record) if !ids.is_empty() && record.contains_key("hash") => {
            let mut keyed = Map::new();
            keyed.insert(ids[0].clone(), Value::Object(record));
            keyed
        }
        Value::Object(keyed) => keyed,
        other => {
            return Err(ClientError::invalid_response(
                method,
                format!("expected a mapping of torrents, got {}", other),
            ))
        }
    };

    records
        .into_iter()
        .map(|(_, record)| {
            let raw: DelugeTorrent = serde_json::from_value(record)
                .map_err(|e| ClientError::invalid_response(method, e))?;
            let mut torrent = Torrent::from(raw);
            torrent.error_string = error_string.clone();
            Ok(torrent)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testutil::{connection, response, response_with_header, ScriptedHttp};
    use crate::client::SessionMode;
    use std::sync::Arc;

    const AUTH_OK: &str = r#"{"result": true, "error": null, "id": 1}"#;
    const COOKIE: &str = "_session_id=5f1ecbd2; Expires=Tue, 20 Oct 2026 12:00:00 GMT; Path=/json";

    fn record(hash: &str, files: Value) -> Value {
        json!({
            "hash": hash,
            "name": "foo",
            "total_wanted": 100,
            "download_payload_rate": 10,
            "upload_payload_rate": 5,
            "state": "Paused",
            "total_done": 40,
            "total_uploaded": 7,
            "eta": 60,
            "save_path": "/downloads",
            "files": files,
        })
    }

    fn client(http: &Arc<ScriptedHttp>) -> DelugeClient {
        DelugeClient::new("home", RpcTransport::new(connection(), http.clone(), DelugeProtocol))
    }

    fn push_auth(http: &ScriptedHttp) {
        http.push(response_with_header(200, AUTH_OK, "set-cookie", COOKIE));
    }

    fn push_result(http: &ScriptedHttp, result: Value) {
        http.push(response(200, &json!({"result": result, "error": null, "id": 2}).to_string()));
    }

    #[tokio::test]
    async fn test_get_all_torrents() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(
            &http,
            json!({"abc123": record("abc123", json!([{"path": "foo.txt", "size": 100}]))}),
        );

        let torrents = client(&http).get_torrents(&[]).await.unwrap();

        assert_eq!(torrents.len(), 1);
        let t = &torrents[0];
        assert_eq!(t.hash_string, "abc123");
        assert_eq!(t.total_size, 100);
        assert_eq!(t.download_speed, 10);
        assert_eq!(t.upload_speed, 5);
        assert_eq!(t.bytes_downloaded, 40);
        assert_eq!(t.bytes_uploaded, 7);
        assert_eq!(t.status, "Paused");
        assert_eq!(t.error_string, "");
        assert_eq!(t.eta, Some(60));
        assert_eq!(t.path.as_deref(), Some("/downloads"));
        assert_eq!(t.files, vec![File::build("foo.txt", 100)]);

        let auth = http.body(0);
        assert_eq!(auth["method"], "auth.login");
        assert_eq!(auth["params"], json!(["deluge"]));

        let call = http.body(1);
        assert_eq!(call["method"], METHOD_GET_ALL);
        assert_eq!(call["params"][0], Value::Null);
        assert_eq!(
            http.requests()[1].headers.get("cookie").unwrap(),
            "_session_id=5f1ecbd2"
        );
    }

    #[tokio::test]
    async fn test_files_keep_order() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(
            &http,
            json!({"h": record("h", json!([
                {"path": "c", "size": 3},
                {"path": "a", "size": 1},
                {"path": "b", "size": 2},
            ]))}),
        );

        let torrents = client(&http).get_torrents(&[]).await.unwrap();
        let paths: Vec<_> = torrents[0].files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn test_single_record_is_rekeyed() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, record("abc123", json!([])));

        let torrents = client(&http)
            .get_torrents(&["abc123".to_string()])
            .await
            .unwrap();

        assert_eq!(torrents.len(), 1);
        assert_eq!(torrents[0].hash_string, "abc123");
        assert!(torrents[0].files.is_empty());
        assert_eq!(http.body(1)["method"], METHOD_GET);
    }

    #[tokio::test]
    async fn test_global_error_lands_in_error_string() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        http.push(response(
            200,
            &json!({
                "result": {"h": record("h", json!([]))},
                "error": {"message": "tracker unreachable", "code": 4},
            })
            .to_string(),
        ));

        let torrents = client(&http).get_torrents(&[]).await.unwrap();
        assert_eq!(torrents[0].error_string, "tracker unreachable");
    }

    #[tokio::test]
    async fn test_error_without_result_fails_listing() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        http.push(response(
            200,
            r#"{"result": null, "error": {"message": "boom", "code": 3}}"#,
        ));

        let err = client(&http).get_torrents(&[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Backend { .. }));
    }

    #[tokio::test]
    async fn test_rejected_password() {
        let http = ScriptedHttp::new();
        http.push(response_with_header(
            200,
            r#"{"result": false, "error": null, "id": 1}"#,
            "set-cookie",
            COOKIE,
        ));

        let err = client(&http).get_torrents(&[]).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport {
                source: TransportError::AuthenticationFailed(_),
                ..
            }
        ));
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_cookie_fails_auth() {
        let http = ScriptedHttp::new();
        http.push(response(200, AUTH_OK));

        let err = client(&http).get_torrents(&[]).await.unwrap_err();
        assert!(err.to_string().contains("_session_id"));
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_start_without_target_makes_no_call() {
        let http = ScriptedHttp::new();
        let client = client(&http);

        let err = client.start_torrent(TorrentRef::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { .. }));

        let err = client.pause_torrent(TorrentRef::new(None, None)).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { .. }));

        let err = client.delete_torrent(TorrentRef::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument { .. }));

        assert_eq!(http.calls(), 0);
    }

    #[tokio::test]
    async fn test_pause_refetches() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, Value::Null);
        push_auth(&http);
        push_result(&http, record("abc123", json!([])));

        let torrent = Torrent::build("abc123", "foo", 100);
        let updated = client(&http).pause_torrent((&torrent).into()).await.unwrap();

        assert_eq!(updated.status, "Paused");
        assert_eq!(http.body(1)["method"], METHOD_PAUSE);
        assert_eq!(http.body(1)["params"], json!([["abc123"]]));
        assert_eq!(http.body(3)["method"], METHOD_GET);
        assert_eq!(http.calls(), 4);
    }

    #[tokio::test]
    async fn test_start_backend_error_is_propagated() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        http.push(response(
            200,
            r#"{"result": null, "error": {"message": "Unknown torrent", "code": 2}}"#,
        ));

        let err = client(&http).start_torrent("abc123".into()).await.unwrap_err();
        match err {
            ClientError::Backend { method, message } => {
                assert_eq!(method, METHOD_START);
                assert_eq!(message, "Unknown torrent");
            }
            other => panic!("Expected Backend error, got {:?}", other),
        }
        assert_eq!(http.calls(), 2);
    }

    #[tokio::test]
    async fn test_delete_returns_raw_result() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, json!(true));

        let result = client(&http).delete_torrent("abc123".into()).await.unwrap();
        assert_eq!(result, json!(true));
        assert_eq!(http.body(1)["params"], json!(["abc123", true]));
    }

    #[tokio::test]
    async fn test_add_magnet_then_fetch() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, json!("abc123"));
        push_auth(&http);
        push_result(&http, record("abc123", json!([])));

        let torrent = client(&http)
            .add_torrent(TorrentSource::parse("magnet:?xt=urn:btih:abc123"))
            .await
            .unwrap();

        assert_eq!(torrent.hash_string, "abc123");
        let add = http.body(1);
        assert_eq!(add["method"], METHOD_ADD_MAGNET);
        assert_eq!(add["params"][1], json!({"add_paused": false}));
    }

    #[tokio::test]
    async fn test_add_file_sends_base64() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, Value::Null);

        let err = client(&http)
            .add_torrent(TorrentSource::File {
                name: "a.torrent".to_string(),
                bytes: b"d4:infoe".to_vec(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::InvalidResponse { .. }));
        assert_eq!(http.body(1)["params"], json!(["a.torrent", "ZDQ6aW5mb2U=", {}]));
    }

    #[tokio::test]
    async fn test_torrent_info() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(
            &http,
            json!({
                "name": "foo",
                "info_hash": "abc123",
                "files_tree": {"contents": {
                    "foo.txt": {"type": "file", "index": 0, "length": 100, "download": true}
                }}
            }),
        );

        let info = client(&http)
            .get_torrent_info(TorrentSource::Url("/tmp/foo.torrent".to_string()))
            .await
            .unwrap();

        assert_eq!(info.info_hash, "abc123");
        assert_eq!(info.file_count(), 1);
        assert_eq!(http.body(1)["method"], METHOD_TORRENT_INFO);
    }

    #[tokio::test]
    async fn test_session_state_and_label() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, json!(["abc123", "def456"]));
        push_auth(&http);
        push_result(&http, Value::Null);

        let client = client(&http);
        assert_eq!(client.session_state().await.unwrap(), vec!["abc123", "def456"]);
        client.set_label("abc123".into(), "movies").await.unwrap();
        assert_eq!(http.body(3)["params"], json!(["abc123", "movies"]));
    }

    #[tokio::test]
    async fn test_web_ui_snapshot() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(
            &http,
            json!({"connected": true, "torrents": {}, "filters": {}, "stats": {"num_connections": 3}}),
        );

        let snapshot = client(&http).web_ui().await.unwrap();

        assert_eq!(snapshot["connected"], json!(true));
        assert_eq!(snapshot["stats"]["num_connections"], 3);
        let body = http.body(1);
        assert_eq!(body["method"], "web.update_ui");
        assert_eq!(body["params"][0].as_array().unwrap().len(), 24);
        assert_eq!(body["params"][0][0], "queue");
        assert_eq!(body["params"][1], json!({}));
    }

    #[tokio::test]
    async fn test_cached_session_skips_login() {
        let http = ScriptedHttp::new();
        push_auth(&http);
        push_result(&http, json!([]));
        push_result(&http, json!([]));

        let client = DelugeClient::new(
            "home",
            RpcTransport::new(connection(), http.clone(), DelugeProtocol)
                .with_session_mode(SessionMode::Cached),
        );
        client.session_state().await.unwrap();
        client.session_state().await.unwrap();

        assert_eq!(http.calls(), 3);
    }

    #[test]
    fn test_stale_session_detection() {
        let stale = response(
            200,
            r#"{"result": null, "error": {"message": "Not authenticated", "code": 1}, "id": 3}"#,
        );
        assert!(DelugeProtocol.is_stale_session(&stale));
        assert!(!DelugeProtocol.is_stale_session(&response(200, r#"{"result": true, "error": null}"#)));
    }
}
