use crate::torrent::Bitfield;
use tokio_util::{
    bytes::{Buf, BufMut, BytesMut},
    codec::{Decoder, Encoder, Framed},
};

/// The nine post-handshake message kinds of the peer wire protocol.
///
/// Every multi-byte integer in the payloads is big-endian; that is a wire
/// compatibility requirement, not a style choice.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    Choke,
    Unchoke,
    Interested,
    NotInterested,
    Have(u32),
    Bitfield(Bitfield),
    Request { index: u32, begin: u32, length: u32 },
    Piece { index: u32, begin: u32, data: Vec<u8> },
    Cancel { index: u32, begin: u32, length: u32 },
    /// a tag outside the nine we speak, e.g. dht `port` or the extension
    /// protocol; the payload is dropped and the message ignored upstream.
    Unknown(u8),
}

impl PeerMessage {
    const CHOKE: u8 = 0;
    const UNCHOKE: u8 = 1;
    const INTERESTED: u8 = 2;
    const NOT_INTERESTED: u8 = 3;
    const HAVE: u8 = 4;
    const BITFIELD: u8 = 5;
    const REQUEST: u8 = 6;
    const PIECE: u8 = 7;
    const CANCEL: u8 = 8;

    fn tag(&self) -> u8 {
        match self {
            Self::Choke => Self::CHOKE,
            Self::Unchoke => Self::UNCHOKE,
            Self::Interested => Self::INTERESTED,
            Self::NotInterested => Self::NOT_INTERESTED,
            Self::Have(_) => Self::HAVE,
            Self::Bitfield(_) => Self::BITFIELD,
            Self::Request { .. } => Self::REQUEST,
            Self::Piece { .. } => Self::PIECE,
            Self::Cancel { .. } => Self::CANCEL,
            Self::Unknown(tag) => *tag,
        }
    }
}

/// Length-prefixed framing for [`PeerMessage`]: a 4-byte big-endian length
/// (`1 + payload`), one tag byte, then the payload. A zero length prefix
/// is a keep-alive, surfaced as a `None` item rather than an error so the
/// connection layer can skip it.
#[derive(Debug)]
pub struct PeerMessageCodec;

/// a framed peer stream speaking the message protocol.
pub type PeerFrames<S> = Framed<S, PeerMessageCodec>;

pub fn frame_stream<S>(stream: S) -> PeerFrames<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite,
{
    Framed::new(stream, PeerMessageCodec)
}

impl PeerMessageCodec {
    const HEADER_LEN: usize = std::mem::size_of::<u32>();
    const U32_LEN: usize = std::mem::size_of::<u32>();
    /// a block frame is ~16 KiB; bitfield frames grow with the torrent
    /// but anything this large is a peer misbehaving.
    const MAX_FRAME_LEN: usize = 1 << 18;

    fn expect_exact(src: &BytesMut, expected: usize, kind: &str) -> anyhow::Result<()> {
        if src.len() != expected {
            anyhow::bail!(
                "{} payload must be {} bytes, got {}",
                kind,
                expected,
                src.len()
            );
        }
        Ok(())
    }
}

impl Decoder for PeerMessageCodec {
    // the outer Option is tokio-util's "need more bytes", the inner one
    // distinguishes a keep-alive from a real message.
    type Item = Option<PeerMessage>;
    type Error = anyhow::Error;

    fn decode(&mut self, src: &mut BytesMut) -> anyhow::Result<Option<Self::Item>> {
        if src.len() < Self::HEADER_LEN {
            return Ok(None);
        }

        // peek the header; only consume once the whole frame is buffered.
        let frame_len = u32::from_be_bytes(
            src[..Self::HEADER_LEN]
                .try_into()
                .expect("header slice is exactly 4 bytes"),
        ) as usize;

        if frame_len == 0 {
            src.advance(Self::HEADER_LEN);
            return Ok(Some(None));
        }

        if frame_len > Self::MAX_FRAME_LEN {
            anyhow::bail!(
                "declared frame length {} exceeds the {} byte cap",
                frame_len,
                Self::MAX_FRAME_LEN
            );
        }

        if src.len() < Self::HEADER_LEN + frame_len {
            src.reserve(Self::HEADER_LEN + frame_len - src.len());
            return Ok(None);
        }

        src.advance(Self::HEADER_LEN);
        let mut frame = src.split_to(frame_len);
        let tag = frame.get_u8();

        type PM = PeerMessage;
        let msg = match tag {
            PM::CHOKE => PM::Choke,
            PM::UNCHOKE => PM::Unchoke,
            PM::INTERESTED => PM::Interested,
            PM::NOT_INTERESTED => PM::NotInterested,
            PM::HAVE => {
                Self::expect_exact(&frame, Self::U32_LEN, "have")?;
                PM::Have(frame.get_u32())
            }
            PM::BITFIELD => PM::Bitfield(Bitfield::from_bytes(frame.to_vec())),
            PM::REQUEST | PM::CANCEL => {
                Self::expect_exact(&frame, 3 * Self::U32_LEN, "request/cancel")?;
                let (index, begin, length) = (frame.get_u32(), frame.get_u32(), frame.get_u32());
                if tag == PM::REQUEST {
                    PM::Request {
                        index,
                        begin,
                        length,
                    }
                } else {
                    PM::Cancel {
                        index,
                        begin,
                        length,
                    }
                }
            }
            PM::PIECE => {
                if frame.len() < 2 * Self::U32_LEN {
                    anyhow::bail!("piece payload is too short: {} bytes", frame.len());
                }
                PM::Piece {
                    index: frame.get_u32(),
                    begin: frame.get_u32(),
                    data: frame.to_vec(),
                }
            }
            other => PM::Unknown(other),
        };

        Ok(Some(Some(msg)))
    }
}

impl Encoder<PeerMessage> for PeerMessageCodec {
    type Error = anyhow::Error;

    fn encode(&mut self, item: PeerMessage, dst: &mut BytesMut) -> anyhow::Result<()> {
        const TAG_LEN: u32 = 1;
        let tag = item.tag();

        type PM = PeerMessage;
        match item {
            PM::Choke | PM::Unchoke | PM::Interested | PM::NotInterested => {
                dst.put_u32(TAG_LEN);
                dst.put_u8(tag);
            }
            PM::Have(index) => {
                dst.put_u32(TAG_LEN + Self::U32_LEN as u32);
                dst.put_u8(tag);
                dst.put_u32(index);
            }
            PM::Request {
                index,
                begin,
                length,
            }
            | PM::Cancel {
                index,
                begin,
                length,
            } => {
                dst.put_u32(TAG_LEN + 3 * Self::U32_LEN as u32);
                dst.put_u8(tag);
                dst.put_u32(index);
                dst.put_u32(begin);
                dst.put_u32(length);
            }
            PM::Piece { index, begin, data } => {
                dst.put_u32(TAG_LEN + (2 * Self::U32_LEN + data.len()) as u32);
                dst.put_u8(tag);
                dst.put_u32(index);
                dst.put_u32(begin);
                dst.put(data.as_slice());
            }
            PM::Bitfield(bitfield) => {
                dst.put_u32(TAG_LEN + bitfield.as_bytes().len() as u32);
                dst.put_u8(tag);
                dst.put(bitfield.as_bytes());
            }
            // never sent, but the encoder must cover it.
            PM::Unknown(_) => {
                dst.put_u32(TAG_LEN);
                dst.put_u8(tag);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn round_trip(msg: PeerMessage) -> PeerMessage {
        let mut buf = BytesMut::new();
        PeerMessageCodec
            .encode(msg, &mut buf)
            .expect("encoding cannot fail");
        PeerMessageCodec
            .decode(&mut buf)
            .expect("decode error")
            .expect("a whole frame was buffered")
            .expect("not a keep-alive")
    }

    #[rstest]
    #[case(PeerMessage::Choke)]
    #[case(PeerMessage::Unchoke)]
    #[case(PeerMessage::Interested)]
    #[case(PeerMessage::NotInterested)]
    #[case(PeerMessage::Have(0))]
    #[case(PeerMessage::Have(u32::MAX))]
    #[case(PeerMessage::Bitfield(Bitfield::from_bytes(vec![0xDE, 0xAD])))]
    #[case(PeerMessage::Request { index: 1, begin: 16384, length: 16384 })]
    #[case(PeerMessage::Piece { index: 3, begin: 32768, data: vec![7; 16384] })]
    #[case(PeerMessage::Cancel { index: 9, begin: 0, length: 16384 })]
    fn every_variant_round_trips(#[case] msg: PeerMessage) {
        assert_eq!(round_trip(msg.clone()), msg);
    }

    #[rstest]
    fn length_prefix_counts_tag_plus_payload() {
        let mut buf = BytesMut::new();
        PeerMessageCodec
            .encode(
                PeerMessage::Piece {
                    index: 0,
                    begin: 0,
                    data: vec![1, 2, 3],
                },
                &mut buf,
            )
            .unwrap();

        // 4 index + 4 begin + 3 data + 1 tag
        assert_eq!(&buf[..4], &12u32.to_be_bytes());
    }

    #[rstest]
    fn zero_length_frame_is_a_keep_alive() {
        let mut buf = BytesMut::from(&[0u8, 0, 0, 0][..]);
        let decoded = PeerMessageCodec.decode(&mut buf).unwrap();
        assert_eq!(decoded, Some(None));
        assert!(buf.is_empty());
    }

    #[rstest]
    fn partial_frames_leave_the_buffer_intact() {
        let mut full = BytesMut::new();
        PeerMessageCodec
            .encode(PeerMessage::Have(42), &mut full)
            .unwrap();

        let mut partial = BytesMut::from(&full[..5]);
        assert_eq!(PeerMessageCodec.decode(&mut partial).unwrap(), None);

        // feeding the rest must still produce the message.
        partial.extend_from_slice(&full[5..]);
        assert_eq!(
            PeerMessageCodec.decode(&mut partial).unwrap(),
            Some(Some(PeerMessage::Have(42)))
        );
    }

    #[rstest]
    #[case(PeerMessage::HAVE, 3)]
    #[case(PeerMessage::HAVE, 5)]
    #[case(PeerMessage::REQUEST, 11)]
    #[case(PeerMessage::PIECE, 7)]
    fn undersized_payloads_are_decode_errors(#[case] tag: u8, #[case] payload_len: usize) {
        let mut buf = BytesMut::new();
        buf.put_u32(1 + payload_len as u32);
        buf.put_u8(tag);
        buf.put_bytes(0, payload_len);

        assert!(PeerMessageCodec.decode(&mut buf).is_err());
    }

    #[rstest]
    #[case(&[0u8, 0, 0, 3, 9, 0x1A, 0xE1], 9)] // dht port announcement
    #[case(&[0u8, 0, 0, 1, 17], 17)]
    fn unrecognized_tags_decode_to_an_ignorable_variant(
        #[case] bytes: &[u8],
        #[case] tag: u8,
    ) {
        let mut buf = BytesMut::from(bytes);
        assert_eq!(
            PeerMessageCodec.decode(&mut buf).unwrap(),
            Some(Some(PeerMessage::Unknown(tag)))
        );
        // the payload is consumed with the frame.
        assert!(buf.is_empty());
    }

    #[rstest]
    fn oversized_declared_lengths_are_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u32(1 << 20);
        buf.put_u8(PeerMessage::BITFIELD);

        assert!(PeerMessageCodec.decode(&mut buf).is_err());
    }
}
