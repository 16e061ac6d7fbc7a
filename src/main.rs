use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use torva::cli::Cli;
use torva::engine::Torrent;
use torva::metainfo::{Metainfo, TrackerUrl};
use torva::torrent::PeerId;
use torva::tracker::request::TrackerRequest;
use torva::tracker::HttpTracker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let metainfo = Metainfo::from_bencode_file(&cli.source)
        .await
        .context("reading the torrent file")?;
    let peer_id = PeerId::random();

    let request = TrackerRequest::new(peer_id.clone(), cli.port, &metainfo.info)?;
    let client = reqwest::Client::new();
    let response = match &metainfo.announce {
        TrackerUrl::Http(url) => {
            HttpTracker::new(&client, url.clone())
                .announce(&request)
                .await?
        }
        TrackerUrl::Udp(url) => {
            anyhow::bail!("udp trackers are not supported (announce url: {})", url)
        }
    };

    let torrent = Torrent {
        peers: response.peers.into_vec(),
        peer_id,
        info_hash: metainfo.info.info_hash()?,
        piece_hashes: metainfo.info.piece_hashes().to_vec(),
        piece_length: metainfo.info.piece_length(),
        length: metainfo.info.total_length(),
        name: metainfo.info.name().to_owned(),
    };

    let buf = torrent.download().await?;

    let output = cli
        .output
        .unwrap_or_else(|| PathBuf::from(&torrent.name));
    tokio::fs::write(&output, &buf)
        .await
        .with_context(|| format!("writing {}", output.display()))?;
    info!("wrote {} bytes to {}", buf.len(), output.display());

    Ok(())
}
