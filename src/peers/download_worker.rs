use super::connection::{PeerConnection, PeerStream};
use super::progress::PieceProgress;
use super::work::{PieceResult, PieceWork, WorkQueue};
use crate::peer_protocol::codec::PeerMessage;
use crate::prelude::*;
use crate::torrent::{InfoHash, PeerId};
use sha1_smol::Sha1;
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// How one piece attempt ended. Only `Fatal` takes the connection down; a
/// failed hash check keeps the worker on the same peer for other pieces.
#[derive(Debug)]
enum AttemptOutcome {
    Completed(Vec<u8>),
    HashMismatch,
    Fatal(anyhow::Error),
}

/// Entry point for one per-peer worker task: dial, set up, then drain the
/// shared queue until the connection dies or the queue closes.
///
/// A failed connection setup ends the worker permanently; nothing was
/// claimed, so no work is lost and the remaining workers drain the queue.
#[instrument(name = "peer worker", level = "info", fields(%addr), skip_all)]
pub async fn run(
    addr: SocketAddrV4,
    peer_id: PeerId,
    info_hash: InfoHash,
    queue: WorkQueue,
    results: mpsc::Sender<PieceResult>,
) {
    let connection = match PeerConnection::connect(addr, &peer_id, &info_hash).await {
        Ok(connection) => connection,
        Err(err) => {
            warn!("giving up on peer: {err:#}");
            return;
        }
    };
    info!("connection established");

    let worker = DownloadWorker::new(connection, queue, results);
    if let Err(err) = worker.run().await {
        warn!("worker stopped: {err:#}");
    }
}

pub struct DownloadWorker<S: PeerStream> {
    connection: PeerConnection<S>,
    queue: WorkQueue,
    results: mpsc::Sender<PieceResult>,
}

impl<S: PeerStream> DownloadWorker<S> {
    /// a whole piece attempt must finish within this bound.
    const PIECE_DEADLINE: Duration = Duration::from_secs(30);

    pub fn new(
        connection: PeerConnection<S>,
        queue: WorkQueue,
        results: mpsc::Sender<PieceResult>,
    ) -> Self {
        Self {
            connection,
            queue,
            results,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        self.connection.send_unchoke().await?;
        self.connection.send_interested().await?;

        while let Some(work) = self.queue.pop().await {
            if !self.connection.bitfield.has_piece(work.index) {
                // some other worker's peer may have it.
                self.queue.requeue(work);
                continue;
            }

            match self.attempt(&work).await {
                AttemptOutcome::Completed(buf) => {
                    info!(index = work.index, "piece verified");
                    if let Err(err) = self.connection.send_have(work.index as u32).await {
                        // not reported yet; the piece goes back into the
                        // pool like any other fatal connection failure.
                        self.queue.requeue(work);
                        return Err(err.context("announcing a finished piece"));
                    }
                    let sent = self.results.send(PieceResult {
                        index: work.index,
                        buf,
                    });
                    if sent.await.is_err() {
                        // engine is gone, nothing left to report to.
                        return Ok(());
                    }
                }
                AttemptOutcome::HashMismatch => {
                    warn!(index = work.index, "piece failed its hash check, requeueing");
                    self.queue.requeue(work);
                }
                AttemptOutcome::Fatal(err) => {
                    self.queue.requeue(work);
                    return Err(err.context("connection failed mid-piece"));
                }
            }
        }
        Ok(())
    }

    /// one bounded attempt at a single piece, classified for the caller.
    async fn attempt(&mut self, work: &PieceWork) -> AttemptOutcome {
        match timeout(Self::PIECE_DEADLINE, self.download_piece(work)).await {
            Ok(Ok(buf)) if verify_piece(&buf, &work.hash) => AttemptOutcome::Completed(buf),
            Ok(Ok(_)) => AttemptOutcome::HashMismatch,
            Ok(Err(err)) => AttemptOutcome::Fatal(err),
            Err(_) => AttemptOutcome::Fatal(anyhow::anyhow!(
                "piece {} attempt exceeded the {:?} deadline",
                work.index,
                Self::PIECE_DEADLINE
            )),
        }
    }

    /// The block pipelining loop: keep up to [`PieceProgress::MAX_BACKLOG`]
    /// requests in flight while unchoked, and fold every arriving block
    /// into the piece buffer until it is full.
    async fn download_piece(&mut self, work: &PieceWork) -> anyhow::Result<Vec<u8>> {
        let mut progress = PieceProgress::new(work.index, work.length);

        while !progress.is_complete() {
            if !self.connection.choked {
                while let Some((begin, length)) = progress.next_request() {
                    self.connection
                        .send_request(work.index as u32, begin, length)
                        .await?;
                }
            }

            match self.connection.read_message().await? {
                PeerMessage::Choke => self.connection.choked = true,
                PeerMessage::Unchoke => self.connection.choked = false,
                // peers acquire pieces mid-session.
                PeerMessage::Have(index) => self.connection.bitfield.set_piece(index as usize),
                PeerMessage::Piece { index, begin, data } => {
                    progress.ingest_block(index, begin, &data)?;
                }
                other => trace!("ignoring {:?}", other),
            }
        }

        Ok(progress.into_buf())
    }
}

fn verify_piece(buf: &[u8], expected: &crate::metainfo::PieceHash) -> bool {
    Sha1::from(buf).digest().bytes() == *expected
}
