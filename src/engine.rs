use crate::metainfo::PieceHash;
use crate::peers::{download_worker, PieceResult, PieceWork, WorkQueue};
use crate::prelude::*;
use crate::torrent::{Bitfield, InfoHash, PeerId};
use std::net::SocketAddrV4;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Everything the engine needs to pull one torrent's payload off the
/// swarm: who to talk to, what to ask for, and how to check it.
#[derive(Debug, Clone)]
pub struct Torrent {
    pub peers: Vec<SocketAddrV4>,
    pub peer_id: PeerId,
    pub info_hash: InfoHash,
    pub piece_hashes: Vec<PieceHash>,
    pub piece_length: usize,
    pub length: usize,
    pub name: String,
}

impl Torrent {
    /// workers block handing over a finished piece until the engine has
    /// copied the previous one; completion bursts throttle themselves.
    const RESULT_BUFFER_SIZE: usize = 1;

    /// Download every piece from the known peers and assemble the verified
    /// buffer. Pieces complete in whatever order the swarm delivers them.
    ///
    /// Resolves with an error once every worker has exited with pieces
    /// still missing (for example when no peer could be reached); there is
    /// no other global timeout.
    #[instrument(name = "download", level = "info", fields(name = %self.name), skip_all)]
    pub async fn download(&self) -> anyhow::Result<Vec<u8>> {
        let total_pieces = self.piece_hashes.len();

        let queue = WorkQueue::with_capacity(total_pieces);
        for (index, hash) in self.piece_hashes.iter().enumerate() {
            queue
                .push(PieceWork {
                    index,
                    hash: *hash,
                    length: self.piece_size(index),
                })
                .await;
        }

        let (results_tx, mut results_rx) = mpsc::channel(Self::RESULT_BUFFER_SIZE);

        let mut workers = JoinSet::new();
        for addr in self.peers.iter().copied() {
            workers.spawn(download_worker::run(
                addr,
                self.peer_id.clone(),
                self.info_hash.clone(),
                queue.clone(),
                results_tx.clone(),
            ));
        }
        // the channel must close once the last worker hangs up.
        drop(results_tx);

        let mut buf = vec![0; self.length];
        let mut done = Bitfield::with_piece_count(total_pieces);
        let mut done_pieces = 0;

        while done_pieces < total_pieces {
            let PieceResult { index, buf: piece } = match results_rx.recv().await {
                Some(result) => result,
                None => anyhow::bail!(
                    "all workers exited with {} of {} pieces still missing",
                    total_pieces - done_pieces,
                    total_pieces
                ),
            };

            if done.has_piece(index) {
                debug!(index, "duplicate result for a finished piece, ignoring");
                continue;
            }

            let (begin, end) = self.piece_bounds(index);
            buf[begin..end].copy_from_slice(&piece);
            done.set_piece(index);
            done_pieces += 1;
            info!(index, done_pieces, total_pieces, "piece assembled");
        }

        // aborts any worker still parked on the drained queue.
        workers.shutdown().await;

        Ok(buf)
    }

    /// Byte range of a piece within the whole download. The last piece is
    /// usually shorter than the nominal piece length; clamping to the
    /// total length handles it.
    fn piece_bounds(&self, index: usize) -> (usize, usize) {
        let begin = index * self.piece_length;
        let end = std::cmp::min(begin + self.piece_length, self.length);
        (begin, end)
    }

    fn piece_size(&self, index: usize) -> usize {
        let (begin, end) = self.piece_bounds(index);
        end - begin
    }
}
