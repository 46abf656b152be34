use std::path::{Path, PathBuf};

use crate::error::{CastError, Result};
use crate::hosts::{format_host_entry, parse_host_entry};

/// What to cast, and where to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastRequest {
    file_path: PathBuf,
    target_host: String,
    target_port: u16,
}

impl CastRequest {
    /// Relative paths are resolved against the current directory.
    pub fn new(
        file_path: impl AsRef<Path>,
        target_host: impl Into<String>,
        target_port: u16,
    ) -> Self {
        let file_path = file_path.as_ref();
        let file_path = if file_path.is_absolute() {
            file_path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(file_path))
                .unwrap_or_else(|_| file_path.to_path_buf())
        };

        Self {
            file_path,
            target_host: target_host.into(),
            target_port,
        }
    }

    /// Build a request from a saved `host:port` entry.
    pub fn from_host_entry(file_path: impl AsRef<Path>, entry: &str) -> Result<Self> {
        let (host, port) =
            parse_host_entry(entry).map_err(|err| CastError::Hosts(err.to_string()))?;
        Ok(Self::new(file_path, host, port))
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn target_port(&self) -> u16 {
        self.target_port
    }

    /// `host:port` as understood by `TcpStream::connect`.
    pub fn target(&self) -> String {
        format_host_entry(&self.target_host, self.target_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_becomes_absolute() {
        let request = CastRequest::new("movie.mp4", "10.0.0.2", 46899);
        assert!(request.file_path().is_absolute());
        assert!(request.file_path().ends_with("movie.mp4"));
    }

    #[test]
    fn from_entry() {
        let request = CastRequest::from_host_entry("/tmp/a.mp3", "192.168.1.9:46899").unwrap();
        assert_eq!(request.target_host(), "192.168.1.9");
        assert_eq!(request.target_port(), 46899);
        assert_eq!(request.target(), "192.168.1.9:46899");
    }

    #[test]
    fn ipv6_target_is_bracketed() {
        let request = CastRequest::from_host_entry("/tmp/a.mp3", "[fe80::2]:46899").unwrap();
        assert_eq!(request.target_host(), "fe80::2");
        assert_eq!(request.target(), "[fe80::2]:46899");
    }

    #[test]
    fn from_invalid_entry() {
        assert!(CastRequest::from_host_entry("/tmp/a.mp3", "nohost").is_err());
    }
}
