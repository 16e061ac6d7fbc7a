pub mod peers;
pub mod request;
pub mod response;

use crate::prelude::*;
use request::TrackerRequest;
use response::{TrackerResponse, TrackerResponseResult};

/// An HTTP(S) announce endpoint. The exchange is one GET whose query
/// carries our identity and progress, answered with a bencoded body
/// holding the current peer set.
pub struct HttpTracker<'a> {
    client: &'a reqwest::Client,
    url: String,
}

impl<'a> HttpTracker<'a> {
    pub fn new(client: &'a reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    #[instrument(name = "tracker announce", level = "info", skip_all)]
    pub async fn announce(&self, request: &TrackerRequest) -> anyhow::Result<TrackerResponse> {
        let url = format!("{}?{}", self.url, request.to_query());
        debug!(%url, "sending announce");

        let body = self.client.get(url).send().await?.bytes().await?;
        let parsed: TrackerResponseResult =
            serde_bencode::from_bytes(&body).map_err(anyhow::Error::msg)?;

        let response = parsed.into_result()?;
        info!(
            peers = response.peers.len(),
            interval = response.request_interval_seconds,
            "tracker answered"
        );
        Ok(response)
    }
}
