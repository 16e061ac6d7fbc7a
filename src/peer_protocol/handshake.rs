use crate::prelude::*;
use crate::torrent::{InfoHash, PeerId};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The one-shot exchange that opens every peer connection: both sides name
/// the protocol they speak and the content they expect to trade.
///
/// Layout on the wire, no delimiters: 1 length byte for the protocol
/// string, the protocol string itself, 8 reserved zero bytes, the 20-byte
/// info hash, the 20-byte peer id.
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub protocol: String,
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
}

impl Handshake {
    pub const PROTOCOL: &'static str = "BitTorrent protocol";
    const RESERVED_LEN: usize = 8;
    /// everything after the protocol string: reserved + info hash + peer id.
    const TAIL_LEN: usize = Self::RESERVED_LEN + InfoHash::SIZE + PeerId::SIZE;

    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            protocol: Self::PROTOCOL.to_owned(),
            info_hash,
            peer_id,
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1 + self.protocol.len() + Self::TAIL_LEN);
        buf.push(self.protocol.len() as u8);
        buf.extend_from_slice(self.protocol.as_bytes());
        buf.extend_from_slice(&[0; Self::RESERVED_LEN]);
        buf.extend_from_slice(self.info_hash.as_ref());
        buf.extend_from_slice(self.peer_id.as_ref());
        buf
    }

    pub async fn write_to<S>(&self, stream: &mut S) -> anyhow::Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(&self.serialize()).await?;
        Ok(())
    }

    pub async fn read_from<S>(stream: &mut S) -> anyhow::Result<Self>
    where
        S: AsyncRead + Unpin,
    {
        let protocol_len = stream.read_u8().await? as usize;
        if protocol_len == 0 {
            anyhow::bail!("handshake protocol string cannot be empty");
        }

        let mut buf = vec![0u8; protocol_len + Self::TAIL_LEN];
        stream.read_exact(&mut buf).await?;

        let protocol = String::from_utf8_lossy(&buf[..protocol_len]).into_owned();
        if protocol != Self::PROTOCOL {
            warn!("peer speaks unknown protocol {:?}", protocol);
        }

        let hash_start = protocol_len + Self::RESERVED_LEN;
        let id_start = hash_start + InfoHash::SIZE;

        let info_hash = InfoHash::new(
            buf[hash_start..id_start]
                .try_into()
                .expect("slice is exactly InfoHash::SIZE bytes"),
        );
        let peer_id = PeerId::new(
            buf[id_start..]
                .try_into()
                .expect("slice is exactly PeerId::SIZE bytes"),
        );

        Ok(Self {
            protocol,
            info_hash,
            peer_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn info_hash() -> InfoHash {
        InfoHash::new([0xC4; 20])
    }

    #[fixture]
    fn peer_id() -> PeerId {
        PeerId::with_suffix(b"000000000000")
    }

    #[rstest]
    fn serialization_is_byte_exact(info_hash: InfoHash, peer_id: PeerId) {
        let expected = {
            let mut out: Vec<u8> = Vec::new();
            out.push(19);
            out.extend_from_slice(b"BitTorrent protocol");
            out.extend_from_slice(&[0; 8]);
            out.extend_from_slice(info_hash.as_ref());
            out.extend_from_slice(peer_id.as_ref());
            out
        };

        assert_eq!(Handshake::new(info_hash, peer_id).serialize(), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn round_trips_through_a_stream(info_hash: InfoHash, peer_id: PeerId) {
        let sent = Handshake::new(info_hash, peer_id);
        let mut stream = tokio_test::io::Builder::new()
            .read(&sent.serialize())
            .build();

        let received = Handshake::read_from(&mut stream).await.unwrap();
        assert_eq!(received, sent);
    }

    #[rstest]
    #[tokio::test]
    async fn rejects_an_empty_protocol_string() {
        let mut stream = tokio_test::io::Builder::new().read(&[0u8]).build();

        let err = Handshake::read_from(&mut stream).await.unwrap_err();
        assert!(err.to_string().contains("protocol string"));
    }
}
