use reqwest::IntoUrl;
use serde::{de::Visitor, Deserialize};

/// The announce URL, split by scheme at parse time. Only HTTP trackers
/// are announced to; a UDP URL still parses so the rest of the metainfo
/// stays readable, and the caller decides what to do with it.
#[derive(Debug, Clone)]
pub enum TrackerUrl {
    Http(String),
    Udp(String),
}

impl TrackerUrl {
    pub fn new(url: impl IntoUrl) -> anyhow::Result<Self> {
        let url = url.into_url()?;
        Ok(match url.scheme() {
            "http" | "https" => Self::Http(url.into()),
            "udp" => Self::Udp(url.into()),
            scheme => anyhow::bail!("unsupported tracker url scheme {:?}", scheme),
        })
    }
}

impl<'de> Deserialize<'de> for TrackerUrl {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_string(TrackerUrlVisitor)
    }
}

struct TrackerUrlVisitor;
impl<'de> Visitor<'de> for TrackerUrlVisitor {
    type Value = TrackerUrl;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a url string using the http, https or udp scheme")
    }

    // serde_bencode hands string values to visit_str.
    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        TrackerUrl::new(v).map_err(serde::de::Error::custom)
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        self.visit_str(&v)
    }

    // bencode strings are raw bytes; a url must also be valid utf-8.
    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        let url = std::str::from_utf8(v).map_err(serde::de::Error::custom)?;
        self.visit_str(url)
    }
}
