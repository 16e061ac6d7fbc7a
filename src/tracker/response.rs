use super::peers::PeerAddresses;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerResponse {
    #[serde(rename = "interval")]
    pub request_interval_seconds: u64,

    pub peers: PeerAddresses,
}

/// Trackers answer either with a peer set or with a bare `failure reason`
/// string; deserialize both shapes, then convert to a `Result`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TrackerResponseResult {
    Success(TrackerResponse),
    Failure {
        #[serde(rename = "failure reason")]
        failure_reason: String,
    },
}

impl TrackerResponseResult {
    pub fn into_result(self) -> anyhow::Result<TrackerResponse> {
        match self {
            Self::Success(response) => Ok(response),
            Self::Failure { failure_reason } => {
                anyhow::bail!("tracker refused the announce: {}", failure_reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::net::{Ipv4Addr, SocketAddrV4};

    #[rstest]
    fn compact_peer_bytes_parse() {
        let mut body = Vec::new();
        body.extend_from_slice(b"d8:intervali900e5:peers12:");
        body.extend_from_slice(&[10, 0, 0, 1, 0x1A, 0xE1]); // 10.0.0.1:6881
        body.extend_from_slice(&[192, 168, 1, 7, 0x1A, 0xE9]); // 192.168.1.7:6889
        body.extend_from_slice(b"e");

        let response = serde_bencode::from_bytes::<TrackerResponseResult>(&body)
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(response.request_interval_seconds, 900);
        assert_eq!(
            response.peers.as_slice(),
            &[
                SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 6881),
                SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 7), 6889),
            ]
        );
    }

    #[rstest]
    fn dictionary_peer_lists_parse() {
        let body = b"d8:intervali1800e5:peersld2:ip8:10.0.0.24:porti6881eeee";

        let response = serde_bencode::from_bytes::<TrackerResponseResult>(body)
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(
            response.peers.as_slice(),
            &[SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 2), 6881)]
        );
    }

    #[rstest]
    fn failure_reasons_become_errors() {
        let body = b"d14:failure reason16:torrent no peerse";

        let err = serde_bencode::from_bytes::<TrackerResponseResult>(body)
            .unwrap()
            .into_result()
            .unwrap_err();
        assert!(err.to_string().contains("torrent no peers"));
    }

    #[rstest]
    fn ragged_compact_bytes_are_rejected() {
        let mut body = Vec::new();
        body.extend_from_slice(b"d8:intervali900e5:peers7:");
        body.extend_from_slice(&[10, 0, 0, 1, 0x1A, 0xE1, 0xFF]);
        body.extend_from_slice(b"e");

        // untagged enums try the failure shape next, which also misses.
        assert!(serde_bencode::from_bytes::<TrackerResponseResult>(&body).is_err());
    }
}
