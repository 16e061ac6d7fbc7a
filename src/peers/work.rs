use super::{PieceIndex, PieceLength};
use crate::metainfo::PieceHash;
use crate::prelude::*;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// One piece the swarm still owes us. Immutable; re-enters the queue
/// unchanged when an attempt fails.
#[derive(Debug, Clone, PartialEq)]
pub struct PieceWork {
    pub index: PieceIndex,
    pub hash: PieceHash,
    pub length: PieceLength,
}

/// A verified piece on its way into the assembly buffer.
#[derive(Debug)]
pub struct PieceResult {
    pub index: PieceIndex,
    pub buf: Vec<u8>,
}

/// Shared pool of pending pieces.
///
/// Any idle worker may claim any item, and failed items go back into the
/// same pool, so retry happens implicitly through whichever worker pulls
/// the piece next. There is no affinity, no ordering and no backoff.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    tx: mpsc::Sender<PieceWork>,
    rx: Arc<Mutex<mpsc::Receiver<PieceWork>>>,
}

impl WorkQueue {
    /// `capacity` must cover every distinct work item that will ever
    /// circulate, so pushing a claimed item back can never block.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub async fn push(&self, work: PieceWork) {
        if self.tx.send(work).await.is_err() {
            warn!("work queue closed, dropping work item");
        }
    }

    /// return a claimed item to the pool for another attempt.
    pub fn requeue(&self, work: PieceWork) {
        let index = work.index;
        match self.tx.try_send(work) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(index, "work queue gone, dropping requeued piece");
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                // a full pool means the capacity invariant was broken by a
                // duplicate item; dropping it keeps the pool consistent.
                warn!(index, "work queue full, dropping requeued duplicate");
            }
        }
    }

    pub async fn pop(&self) -> Option<PieceWork> {
        self.rx.lock().await.recv().await
    }
}
