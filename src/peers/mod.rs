pub mod connection;
pub mod download_worker;

mod progress;
mod work;

pub use connection::{PeerConnection, PeerStream};
pub use work::{PieceResult, PieceWork, WorkQueue};

pub type PieceIndex = usize;
pub type PieceLength = usize;
