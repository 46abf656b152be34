use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CastError>;

/// Failures that prevent a cast from starting at all.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("{} does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("{} is not a regular file", .0.display())]
    NotAFile(PathBuf),

    #[error("{} is not readable: {source}", .path.display())]
    Unreadable { path: PathBuf, source: io::Error },

    #[error("failed to bind media server to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("could not determine the media type of {}", .0.display())]
    UnknownMimeType(PathBuf),

    #[error("no local address can reach {0}")]
    NoLocalAddress(String),

    #[error("failed to resolve {host}: {source}")]
    Resolve { host: String, source: io::Error },
}

/// Failures local to a single HTTP request. These never leave the connection
/// task that produced them.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("bad request: {0}")]
    Http(#[from] http::HttpError),

    #[error("range header: {0}")]
    Range(#[from] http::RangeError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum CastError {
    #[error("failed to start casting: {0}")]
    Startup(#[from] StartupError),

    #[error("failed to notify receiver at {addr}: {source}")]
    Connection { addr: String, source: io::Error },

    #[error("failed to encode play command: {0}")]
    Encode(anyhow::Error),

    #[error("saved hosts: {0}")]
    Hosts(String),

    #[error("media server task failed: {0}")]
    Server(String),
}
