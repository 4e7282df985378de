//! Torrent metadata trees, as returned before a torrent is added

use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name, hash and file tree of a torrent that has not been added yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentInfo {
    pub info_hash: String,
    pub name: String,
    pub files: Vec<FileInfo>,
}

/// A node of a torrent's file tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileInfo {
    File {
        name: String,
        index: u64,
        size: u64,
    },
    Dir {
        name: String,
        size: u64,
        contents: Vec<FileInfo>,
    },
}

#[derive(Debug, Deserialize)]
struct RawTorrentInfo {
    name: String,
    info_hash: String,
    /// Magnet lookups may leave this empty until metadata arrives
    #[serde(default)]
    files_tree: Value,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    #[serde(rename = "type", default = "default_node_type")]
    kind: String,
    index: Option<u64>,
    #[serde(default)]
    length: u64,
    #[serde(default)]
    contents: Map<String, Value>,
}

fn default_node_type() -> String {
    "file".to_string()
}

impl TorrentInfo {
    /// Build from a `{name, info_hash, files_tree: {contents}}` record
    pub fn build(data: Value) -> Result<Self, serde_json::Error> {
        let raw: RawTorrentInfo = serde_json::from_value(data)?;

        let contents = match raw.files_tree {
            Value::Object(mut tree) => match tree.remove("contents") {
                Some(Value::Object(contents)) => contents,
                _ => Map::new(),
            },
            _ => Map::new(),
        };

        Ok(Self {
            info_hash: raw.info_hash,
            name: raw.name,
            files: FileInfo::build_all(contents)?,
        })
    }

    /// Number of file leaves in the whole tree
    pub fn file_count(&self) -> usize {
        self.files.iter().map(FileInfo::file_count).sum()
    }
}

impl FileInfo {
    /// Build one node per key of `contents`, keeping key order
    pub fn build_all(contents: Map<String, Value>) -> Result<Vec<Self>, serde_json::Error> {
        contents
            .into_iter()
            .map(|(name, data)| Self::build_by_type(name, data))
            .collect()
    }

    fn build_by_type(name: String, data: Value) -> Result<Self, serde_json::Error> {
        let raw: RawNode = serde_json::from_value(data)?;

        if raw.kind.eq_ignore_ascii_case("file") {
            let index = raw
                .index
                .ok_or_else(|| serde_json::Error::custom(format!("file `{name}` has no index")))?;
            return Ok(FileInfo::File {
                name,
                index,
                size: raw.length,
            });
        }

        Ok(FileInfo::Dir {
            name,
            size: raw.length,
            contents: Self::build_all(raw.contents)?,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            FileInfo::File { name, .. } | FileInfo::Dir { name, .. } => name,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            FileInfo::File { size, .. } | FileInfo::Dir { size, .. } => *size,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, FileInfo::Dir { .. })
    }

    fn file_count(&self) -> usize {
        match self {
            FileInfo::File { .. } => 1,
            FileInfo::Dir { contents, .. } => contents.iter().map(Self::file_count).sum(),
        }
    }
}
