use serde::de::{self, SeqAccess, Visitor};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddrV4};

/// The peer set a tracker hands back.
///
/// Two encodings exist in the wild: the compact form, one packed byte
/// string of 6-byte chunks (4 address bytes, 2 big-endian port bytes),
/// and the older dictionary form, a list of `{ip, port}` maps.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerAddresses(Vec<SocketAddrV4>);

impl PeerAddresses {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[SocketAddrV4] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<SocketAddrV4> {
        self.0
    }
}

impl<'de> Deserialize<'de> for PeerAddresses {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(PeerAddresses(
            deserializer.deserialize_any(PeerAddressesVisitor)?,
        ))
    }
}

/// the dictionary-form element.
#[derive(Debug, Deserialize)]
struct PeerEntry {
    ip: String,
    port: u16,
}

struct PeerAddressesVisitor;

impl PeerAddressesVisitor {
    const COMPACT_CHUNK_LEN: usize = 6;
}

impl<'de> Visitor<'de> for PeerAddressesVisitor {
    type Value = Vec<SocketAddrV4>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str(
            "a packed byte string of 6-byte peer addresses, or a list of {ip, port} dictionaries",
        )
    }

    fn visit_bytes<E>(self, bytes: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let chunks = bytes.chunks_exact(Self::COMPACT_CHUNK_LEN);
        if !chunks.remainder().is_empty() {
            return Err(E::custom(
                "compact peer bytes must have a length that is a multiple of 6",
            ));
        }

        Ok(chunks
            .map(|chunk| {
                let [a, b, c, d, port @ ..]: [u8; Self::COMPACT_CHUNK_LEN] = chunk
                    .try_into()
                    .expect("chunks_exact only yields chunks of 6 bytes");

                SocketAddrV4::new(Ipv4Addr::new(a, b, c, d), u16::from_be_bytes(port))
            })
            .collect())
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut addrs = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(PeerEntry { ip, port }) = seq.next_element()? {
            let ip: Ipv4Addr = ip
                .parse()
                .map_err(|_| de::Error::custom("peer ip must be a dotted ipv4 address"))?;
            addrs.push(SocketAddrV4::new(ip, port));
        }
        Ok(addrs)
    }
}
