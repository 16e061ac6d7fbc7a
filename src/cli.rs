use clap::Parser;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// a cli bittorrent (v1) download client written in rust.
#[derive(Parser, Debug)]
#[command(author, about, long_about = None)]
pub struct Cli {
    /// the torrent file describing the content to download.
    /// must have a .torrent extension.
    #[arg(required = true)]
    pub source: MetainfoFilePath,

    /// the port reported to the tracker.
    #[arg(short, long, default_value = "6881")]
    pub port: u16,

    /// where to write the downloaded file; defaults to the name stored
    /// in the torrent.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// A path argument validated up front: the file must exist and carry the
/// .torrent extension, so bad invocations fail before any network work.
#[derive(Debug, Clone)]
pub struct MetainfoFilePath(PathBuf);

impl MetainfoFilePath {
    pub fn new(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path: PathBuf = path.into();

        if !path.is_file() {
            anyhow::bail!("could not find a file at {}", path.display());
        }

        if path.extension() != Some(OsStr::new("torrent")) {
            anyhow::bail!("torrent files must have a .torrent extension");
        }

        Ok(Self(path))
    }
}

impl FromStr for MetainfoFilePath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(PathBuf::from(s))
    }
}

impl AsRef<Path> for MetainfoFilePath {
    fn as_ref(&self) -> &Path {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn missing_files_are_rejected() {
        let err = MetainfoFilePath::new("/definitely/not/here.torrent").unwrap_err();
        assert!(err.to_string().contains("could not find"));
    }

    #[rstest]
    fn wrong_extensions_are_rejected() {
        let path = std::env::temp_dir().join("torva-cli-extension-test.txt");
        std::fs::write(&path, b"not a torrent").unwrap();

        let err = MetainfoFilePath::new(&path).unwrap_err();
        assert!(err.to_string().contains(".torrent extension"));

        std::fs::remove_file(&path).ok();
    }
}
