pub mod files;
pub mod tracker_url;

pub use files::DownloadInfo;
pub use tracker_url::TrackerUrl;

use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// sha1 of one piece's bytes; the integrity check for every piece.
pub type PieceHash = [u8; 20];

/// A parsed `.torrent` file.
#[derive(Debug, Deserialize)]
pub struct Metainfo {
    pub announce: TrackerUrl,

    #[serde(rename = "info")]
    pub info: DownloadInfo,

    #[serde(default)]
    #[serde(rename = "announce-list")]
    pub announce_list: Option<Vec<Vec<String>>>,

    #[serde(default)]
    #[serde(rename = "creation date")]
    pub creation_date: Option<u64>, // seconds since unix epoch

    #[serde(default)]
    #[serde(rename = "created by")]
    pub created_by: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub encoding: Option<String>,
}

impl Metainfo {
    pub async fn from_bencode_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = fs::read(path).await?;
        serde_bencode::from_bytes(&contents).map_err(anyhow::Error::msg)
    }
}
