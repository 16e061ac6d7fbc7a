use crate::peer_protocol::codec::{self, PeerFrames, PeerMessage};
use crate::peer_protocol::handshake::Handshake;
use crate::prelude::*;
use crate::torrent::{Bitfield, InfoHash, PeerId};
use anyhow::Context;
use futures::SinkExt;
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_stream::StreamExt;

/// anything a peer connection can run over; real sockets in production,
/// scripted mock streams in tests.
pub trait PeerStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<S: AsyncRead + AsyncWrite + Unpin + Send> PeerStream for S {}

/// One fully set up wire connection to one peer: handshake verified, the
/// peer's initial bitfield received. Owned exclusively by its download
/// worker; dropping it closes the socket on every exit path.
#[derive(Debug)]
pub struct PeerConnection<S: PeerStream> {
    frames: PeerFrames<S>,
    /// peers start us choked; no requests may be sent until they unchoke.
    pub choked: bool,
    pub bitfield: Bitfield,
    peer_id: PeerId,
}

impl PeerConnection<TcpStream> {
    const DIAL_TIMEOUT: Duration = Duration::from_secs(3);

    #[instrument(name = "connect to peer", level = "info", fields(%addr), skip_all)]
    pub async fn connect(
        addr: SocketAddrV4,
        peer_id: &PeerId,
        info_hash: &InfoHash,
    ) -> anyhow::Result<Self> {
        info!("dialing peer");
        let stream = timeout(Self::DIAL_TIMEOUT, TcpStream::connect(addr))
            .await
            .context("connect timed out")?
            .context("tcp connect failed")?;

        Self::establish(stream, peer_id, info_hash).await
    }
}

impl<S: PeerStream> PeerConnection<S> {
    const SETUP_TIMEOUT: Duration = Duration::from_secs(5);

    /// Handshake plus the mandatory first `bitfield` frame over an already
    /// open stream. Split out from [`PeerConnection::connect`] so tests can
    /// drive a scripted stream.
    pub async fn establish(
        mut stream: S,
        peer_id: &PeerId,
        info_hash: &InfoHash,
    ) -> anyhow::Result<Self> {
        let reply = timeout(
            Self::SETUP_TIMEOUT,
            Self::exchange_handshake(&mut stream, peer_id, info_hash),
        )
        .await
        .context("handshake timed out")??;

        if reply.info_hash != *info_hash {
            anyhow::bail!(
                "peer answered for the wrong content: expected info hash {:02x?}, got {:02x?}",
                info_hash.as_ref(),
                reply.info_hash.as_ref()
            );
        }
        debug!(peer_handshake_reply = ?reply);

        let mut frames = codec::frame_stream(stream);
        let first = timeout(Self::SETUP_TIMEOUT, frames.next())
            .await
            .context("timed out waiting for the initial bitfield")?;

        let bitfield = match first {
            Some(Ok(Some(PeerMessage::Bitfield(bitfield)))) => bitfield,
            Some(Ok(Some(other))) => {
                anyhow::bail!("expected a bitfield as the first message, got {:?}", other)
            }
            Some(Ok(None)) => {
                anyhow::bail!("expected a bitfield as the first message, got a keep-alive")
            }
            Some(Err(err)) => return Err(err.context("reading the initial bitfield")),
            None => anyhow::bail!("peer closed the connection before sending a bitfield"),
        };

        Ok(Self {
            frames,
            choked: true,
            bitfield,
            peer_id: reply.peer_id,
        })
    }

    async fn exchange_handshake(
        stream: &mut S,
        peer_id: &PeerId,
        info_hash: &InfoHash,
    ) -> anyhow::Result<Handshake> {
        let hello = Handshake::new(info_hash.clone(), peer_id.clone());
        hello.write_to(stream).await?;
        Handshake::read_from(stream).await
    }

    /// the next real message; keep-alives are skipped, they carry nothing.
    pub async fn read_message(&mut self) -> anyhow::Result<PeerMessage> {
        loop {
            match self.frames.next().await {
                Some(Ok(Some(msg))) => return Ok(msg),
                Some(Ok(None)) => {
                    trace!("keep-alive from peer");
                }
                Some(Err(err)) => return Err(err),
                None => anyhow::bail!("peer closed the connection"),
            }
        }
    }

    pub async fn send_unchoke(&mut self) -> anyhow::Result<()> {
        self.frames.send(PeerMessage::Unchoke).await
    }

    pub async fn send_interested(&mut self) -> anyhow::Result<()> {
        self.frames.send(PeerMessage::Interested).await
    }

    pub async fn send_have(&mut self, index: u32) -> anyhow::Result<()> {
        self.frames.send(PeerMessage::Have(index)).await
    }

    pub async fn send_request(&mut self, index: u32, begin: u32, length: u32) -> anyhow::Result<()> {
        self.frames
            .send(PeerMessage::Request {
                index,
                begin,
                length,
            })
            .await
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer_protocol::codec::PeerMessageCodec;
    use rstest::{fixture, rstest};
    use tokio_test::io::Builder;
    use tokio_util::bytes::BytesMut;
    use tokio_util::codec::Encoder;

    fn frame_bytes(msg: PeerMessage) -> Vec<u8> {
        let mut buf = BytesMut::new();
        PeerMessageCodec.encode(msg, &mut buf).unwrap();
        buf.to_vec()
    }

    #[fixture]
    fn info_hash() -> InfoHash {
        InfoHash::new([0x11; 20])
    }

    #[fixture]
    fn local_id() -> PeerId {
        PeerId::with_suffix(b"aaaaaaaaaaaa")
    }

    #[fixture]
    fn remote_id() -> PeerId {
        PeerId::with_suffix(b"zzzzzzzzzzzz")
    }

    #[rstest]
    #[tokio::test]
    async fn establish_verifies_handshake_and_takes_the_bitfield(
        info_hash: InfoHash,
        local_id: PeerId,
        remote_id: PeerId,
    ) {
        let bitfield = Bitfield::from_bytes(vec![0xFF, 0xF0]);
        let stream = Builder::new()
            .write(&Handshake::new(info_hash.clone(), local_id.clone()).serialize())
            .read(&Handshake::new(info_hash.clone(), remote_id.clone()).serialize())
            .read(&frame_bytes(PeerMessage::Bitfield(bitfield.clone())))
            .build();

        let connection = PeerConnection::establish(stream, &local_id, &info_hash)
            .await
            .unwrap();

        assert!(connection.choked);
        assert_eq!(connection.bitfield, bitfield);
        assert_eq!(connection.peer_id(), &remote_id);
    }

    #[rstest]
    #[tokio::test]
    async fn establish_rejects_a_foreign_info_hash(
        info_hash: InfoHash,
        local_id: PeerId,
        remote_id: PeerId,
    ) {
        let stream = Builder::new()
            .write(&Handshake::new(info_hash.clone(), local_id.clone()).serialize())
            .read(&Handshake::new(InfoHash::new([0x22; 20]), remote_id).serialize())
            .build();

        let err = PeerConnection::establish(stream, &local_id, &info_hash)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wrong content"));
    }

    #[rstest]
    #[tokio::test]
    async fn establish_requires_the_first_frame_to_be_a_bitfield(
        info_hash: InfoHash,
        local_id: PeerId,
        remote_id: PeerId,
    ) {
        let stream = Builder::new()
            .write(&Handshake::new(info_hash.clone(), local_id.clone()).serialize())
            .read(&Handshake::new(info_hash.clone(), remote_id).serialize())
            .read(&frame_bytes(PeerMessage::Have(0)))
            .build();

        let err = PeerConnection::establish(stream, &local_id, &info_hash)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("first message"));
    }

    #[rstest]
    #[tokio::test]
    async fn read_message_skips_keep_alives(
        info_hash: InfoHash,
        local_id: PeerId,
        remote_id: PeerId,
    ) {
        let stream = Builder::new()
            .write(&Handshake::new(info_hash.clone(), local_id.clone()).serialize())
            .read(&Handshake::new(info_hash.clone(), remote_id).serialize())
            .read(&frame_bytes(PeerMessage::Bitfield(Bitfield::from_bytes(
                vec![0x80],
            ))))
            .read(&[0, 0, 0, 0])
            .read(&frame_bytes(PeerMessage::Unchoke))
            .build();

        let mut connection = PeerConnection::establish(stream, &local_id, &info_hash)
            .await
            .unwrap();

        assert_eq!(connection.read_message().await.unwrap(), PeerMessage::Unchoke);
    }
}
