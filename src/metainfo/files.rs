use super::PieceHash;
use crate::torrent::InfoHash;
use serde::{Deserialize, Serialize};
use sha1_smol::Sha1;

/// One file entry of a multi-file torrent.
#[derive(Debug, Deserialize, Serialize)]
pub struct FileEntry {
    pub path: Vec<String>,
    pub length: usize,

    #[serde(default)]
    pub md5sum: Option<String>,
}

/// The `info` dictionary of a torrent, covering both the single-file and
/// the multi-file shape.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DownloadInfo {
    MultiFile {
        #[serde(rename = "name")]
        dirname: String,

        files: Vec<FileEntry>,

        #[serde(rename = "piece length")]
        piece_length: usize,

        #[serde(with = "piece_hashes")]
        pieces: Vec<PieceHash>,

        #[serde(default)]
        private: Option<i64>,
    },

    SingleFile {
        #[serde(rename = "name")]
        filename: String,
        length: usize,

        #[serde(default)]
        md5sum: Option<String>,

        #[serde(rename = "piece length")]
        piece_length: usize,

        #[serde(with = "piece_hashes")]
        pieces: Vec<PieceHash>,

        #[serde(default)]
        private: Option<i64>,
    },
}

impl DownloadInfo {
    /// sha1 of the re-encoded info dictionary. serde_bencode writes map
    /// keys in sorted order, so the encoding is reproducible and the hash
    /// stable.
    pub fn info_hash(&self) -> anyhow::Result<InfoHash> {
        let encoded = serde_bencode::to_bytes(self)?;
        Ok(InfoHash::new(Sha1::from(encoded).digest().bytes()))
    }

    pub fn total_length(&self) -> usize {
        match self {
            Self::SingleFile { length, .. } => *length,
            Self::MultiFile { files, .. } => files.iter().map(|file| file.length).sum(),
        }
    }

    pub fn piece_length(&self) -> usize {
        match self {
            Self::SingleFile { piece_length, .. } | Self::MultiFile { piece_length, .. } => {
                *piece_length
            }
        }
    }

    pub fn piece_hashes(&self) -> &[PieceHash] {
        match self {
            Self::SingleFile { pieces, .. } | Self::MultiFile { pieces, .. } => pieces,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SingleFile { filename, .. } => filename,
            Self::MultiFile { dirname, .. } => dirname,
        }
    }
}

impl crate::tracker::request::Requestable for DownloadInfo {
    fn info_hash(&self) -> anyhow::Result<InfoHash> {
        // delegates to the inherent method.
        DownloadInfo::info_hash(self)
    }

    fn total_length(&self) -> usize {
        DownloadInfo::total_length(self)
    }
}

/// the `pieces` field is one packed byte string of concatenated 20-byte
/// hashes, not a bencode list.
mod piece_hashes {
    use super::PieceHash;
    use serde::de::{self, Visitor};
    use static_str_ops::static_format;

    const HASH_SIZE: usize = std::mem::size_of::<PieceHash>();

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<PieceHash>, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_bytes(PieceHashVisitor)
    }

    pub fn serialize<S>(piece_hashes: &[PieceHash], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde_bytes::serialize(&piece_hashes.concat(), serializer)
    }

    struct PieceHashVisitor;
    impl<'de> Visitor<'de> for PieceHashVisitor {
        type Value = Vec<PieceHash>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str(static_format!(
                "a byte sequence whose length is a multiple of {}",
                HASH_SIZE
            ))
        }

        fn visit_bytes<E>(self, bytes: &[u8]) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if bytes.len() % HASH_SIZE != 0 {
                return Err(E::custom(static_format!(
                    "piece hashes must pack into chunks of {} bytes",
                    HASH_SIZE
                )));
            }

            Ok(bytes
                .chunks_exact(HASH_SIZE)
                .map(|chunk| {
                    chunk.try_into().expect(static_format!(
                        "chunks_exact only yields chunks of {} bytes",
                        HASH_SIZE
                    ))
                })
                .collect())
        }
    }
}
