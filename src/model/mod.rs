//! Canonical torrent domain model
//!
//! Every backend adapter normalizes its own payloads into these types, so
//! callers never see daemon-specific field names.

mod info;

pub use info::{FileInfo, TorrentInfo};

use serde::{Deserialize, Serialize};

/// Snapshot of a torrent as reported by a backend
///
/// Built fresh on every fetch; it holds no handle back to the client that
/// produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Torrent {
    pub hash_string: String,
    pub name: String,
    pub total_size: u64,
    pub download_speed: u64,
    pub upload_speed: u64,
    pub bytes_downloaded: u64,
    pub bytes_uploaded: u64,
    pub status: String,
    pub error_string: String,
    pub eta: Option<i64>,
    pub path: Option<String>,
    pub files: Vec<File>,
}

/// A single file inside a torrent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    pub size: u64,
}

impl File {
    pub fn build(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
        }
    }
}

impl Torrent {
    /// Start a torrent from its required fields; everything else is zeroed
    pub fn build(hash_string: impl Into<String>, name: impl Into<String>, total_size: u64) -> Self {
        Self {
            hash_string: hash_string.into(),
            name: name.into(),
            total_size,
            download_speed: 0,
            upload_speed: 0,
            bytes_downloaded: 0,
            bytes_uploaded: 0,
            status: String::new(),
            error_string: String::new(),
            eta: None,
            path: None,
            files: Vec::new(),
        }
    }

    pub fn add_file(&mut self, file: File) {
        self.files.push(file);
    }

    /// Total bytes of all files, which may differ from `total_size` when
    /// some files are deselected
    pub fn files_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }
}
