use super::{PieceIndex, PieceLength};

/// Per-attempt download state for a single piece, owned by exactly one
/// worker. Tracks how far the request pipeline has run ahead of the data
/// actually received.
#[derive(Debug)]
pub(super) struct PieceProgress {
    index: PieceIndex,
    buf: Vec<u8>,
    downloaded: usize,
    requested: usize,
    backlog: usize,
}

impl PieceProgress {
    /// blocks are requested in 16 KiB chunks.
    pub const MAX_BLOCK_SIZE: usize = 1 << 14;
    /// upper bound on outstanding block requests per connection.
    pub const MAX_BACKLOG: usize = 5;

    pub fn new(index: PieceIndex, piece_length: PieceLength) -> Self {
        Self {
            index,
            buf: vec![0; piece_length],
            downloaded: 0,
            requested: 0,
            backlog: 0,
        }
    }

    /// The next block to put on the wire, or `None` when the pipeline is
    /// full or the whole piece has been requested. The caller only asks
    /// while the connection is unchoked.
    pub fn next_request(&mut self) -> Option<(u32, u32)> {
        if self.backlog >= Self::MAX_BACKLOG || self.requested >= self.buf.len() {
            return None;
        }

        let begin = self.requested;
        let length = std::cmp::min(Self::MAX_BLOCK_SIZE, self.buf.len() - begin);
        self.requested += length;
        self.backlog += 1;

        Some((begin as u32, length as u32))
    }

    /// Validate one `piece` payload against the target buffer and copy it
    /// in. Returns the number of bytes accepted.
    pub fn ingest_block(&mut self, index: u32, begin: u32, data: &[u8]) -> anyhow::Result<usize> {
        if index as usize != self.index {
            anyhow::bail!(
                "expected a block of piece {}, got piece {}",
                self.index,
                index
            );
        }

        let begin = begin as usize;
        if begin >= self.buf.len() {
            anyhow::bail!(
                "begin offset {} is too high for a {} byte piece",
                begin,
                self.buf.len()
            );
        }
        if begin + data.len() > self.buf.len() {
            anyhow::bail!(
                "data is too long: {} bytes at offset {} overrun a {} byte piece",
                data.len(),
                begin,
                self.buf.len()
            );
        }

        self.buf[begin..begin + data.len()].copy_from_slice(data);
        self.downloaded += data.len();
        self.backlog = self.backlog.saturating_sub(1);

        Ok(data.len())
    }

    pub fn is_complete(&self) -> bool {
        self.downloaded >= self.buf.len()
    }

    pub fn into_buf(self) -> Vec<u8> {
        self.buf
    }
}
