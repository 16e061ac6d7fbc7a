pub mod cli;
pub mod engine;
pub mod metainfo;
pub mod peer_protocol;
pub mod peers;
pub mod torrent;
pub mod tracker;

pub(crate) mod prelude;
