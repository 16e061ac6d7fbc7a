use crate::torrent::{InfoHash, PeerId};
use form_urlencoded::byte_serialize;

/// What the tracker wants to know before handing out peers.
pub trait Requestable {
    fn info_hash(&self) -> anyhow::Result<InfoHash>;
    fn total_length(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct TrackerRequest {
    /// identifies the content; raw bytes, percent-encoded into the query.
    pub info_hash: InfoHash,

    /// our 20-byte identity.
    pub peer_id: PeerId,

    /// port we claim to listen on.
    pub port: u16,

    /// total bytes uploaded so far; this client never uploads.
    pub uploaded: usize,

    /// total bytes downloaded so far.
    pub downloaded: usize,

    /// bytes still missing; the full size on a fresh start.
    pub left: usize,

    /// ask for the compact peer list encoding.
    compact: u8,
}

impl TrackerRequest {
    pub fn new(
        peer_id: PeerId,
        port: u16,
        requestable: &impl Requestable,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            info_hash: requestable.info_hash()?,
            peer_id,
            port,
            uploaded: 0,
            downloaded: 0,
            left: requestable.total_length(),
            compact: 1,
        })
    }

    /// the announce query string; keys are ascii, values are raw bytes
    /// percent-encoded (the info hash is not valid utf-8).
    pub fn to_query(&self) -> String {
        let port = self.port.to_string();
        let uploaded = self.uploaded.to_string();
        let downloaded = self.downloaded.to_string();
        let left = self.left.to_string();
        let compact = self.compact.to_string();

        Self::encode_pairs([
            ("info_hash", self.info_hash.as_ref() as &[u8]),
            ("peer_id", self.peer_id.as_ref()),
            ("port", port.as_bytes()),
            ("uploaded", uploaded.as_bytes()),
            ("downloaded", downloaded.as_bytes()),
            ("left", left.as_bytes()),
            ("compact", compact.as_bytes()),
        ])
    }

    fn encode_pairs<'a, I>(pairs: I) -> String
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut query = String::new();
        for (index, (key, value)) in pairs.into_iter().enumerate() {
            if index > 0 {
                query.push('&');
            }
            query.push_str(key);
            query.push('=');
            query.extend(byte_serialize(value));
        }
        query
    }
}
