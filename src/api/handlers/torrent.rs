//! Torrent handlers, one per uniform client operation

use axum::{
    extract::{Path, Query, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::Value;

use crate::api::{AppError, AppState};
use crate::client::{TorrentRef, TorrentSource};
use crate::model::{Torrent, TorrentInfo};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma separated torrent ids
    pub ids: Option<String>,
}

impl ListQuery {
    fn ids(&self) -> Vec<String> {
        self.ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}

/// Where to take a torrent from; exactly one of `url`, `magnet`, `metainfo`
#[derive(Debug, Default, Deserialize)]
pub struct SourceRequest {
    pub url: Option<String>,
    pub magnet: Option<String>,
    pub filename: Option<String>,
    /// Base64 encoded `.torrent` contents
    pub metainfo: Option<String>,
}

impl SourceRequest {
    pub fn into_source(self) -> Result<TorrentSource, AppError> {
        match (self.url, self.magnet, self.metainfo) {
            (Some(url), None, None) => Ok(TorrentSource::Url(url)),
            (None, Some(magnet), None) => Ok(TorrentSource::Magnet(magnet)),
            (None, None, Some(metainfo)) => {
                let bytes = BASE64
                    .decode(metainfo.trim())
                    .map_err(|e| AppError::bad_request(format!("Invalid metainfo: {}", e)))?;
                Ok(TorrentSource::File {
                    name: self.filename.unwrap_or_else(|| "upload.torrent".to_string()),
                    bytes,
                })
            }
            _ => Err(AppError::bad_request(
                "Exactly one of url, magnet or metainfo is required",
            )),
        }
    }
}

/// List torrents, optionally restricted to `?ids=a,b`
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Torrent>>, AppError> {
    let client = state.backend(&name)?;
    let torrents = client.get_torrents(&query.ids()).await?;
    Ok(Json(torrents))
}

/// Add a torrent
pub async fn add(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SourceRequest>,
) -> Result<Json<Torrent>, AppError> {
    let client = state.backend(&name)?;
    let source = req.into_source()?;
    let torrent = client.add_torrent(source).await?;

    tracing::info!("Added torrent {} to {}", torrent.hash_string, name);
    Ok(Json(torrent))
}

/// Get a single torrent
pub async fn get_one(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Torrent>, AppError> {
    let client = state.backend(&name)?;
    Ok(Json(client.get_torrent(&id).await?))
}

/// Remove a torrent together with its data
pub async fn remove(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let client = state.backend(&name)?;
    let result = client.delete_torrent(TorrentRef::from(id.as_str())).await?;

    tracing::info!("Removed torrent {} from {}", id, name);
    Ok(Json(result))
}

pub async fn start(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Torrent>, AppError> {
    let client = state.backend(&name)?;
    Ok(Json(client.start_torrent(TorrentRef::from(id.as_str())).await?))
}

pub async fn pause(
    State(state): State<AppState>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Json<Torrent>, AppError> {
    let client = state.backend(&name)?;
    Ok(Json(client.pause_torrent(TorrentRef::from(id.as_str())).await?))
}

/// Inspect a torrent's file tree without adding it
pub async fn info(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<SourceRequest>,
) -> Result<Json<TorrentInfo>, AppError> {
    let client = state.backend(&name)?;
    let source = req.into_source()?;
    Ok(Json(client.get_torrent_info(source).await?))
}
