use std::future::Future;
use std::io;
use std::time::Duration;

use fcast_lib::models::PlayMessage;
use fcast_lib::packet::Packet;
use log::{debug, info};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::error::{CastError, Result};
use crate::hosts::format_host_entry;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends a single Play command to a receiver. The receiver does not answer, so
/// a completed write counts as success.
#[derive(Debug, Clone, Copy)]
pub struct CastNotifier {
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for CastNotifier {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

/// Run `fut`, failing with `ErrorKind::TimedOut` if it takes longer than `limit`.
async fn within<F, T>(limit: Duration, what: &str, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{what} timed out after {limit:?}"),
        ))
    })
}

impl CastNotifier {
    /// Bytes put on the wire for a Play of `url` with media type `mime_type`.
    pub fn frame(url: &str, mime_type: &str) -> Result<Vec<u8>> {
        Packet::from(PlayMessage::new(mime_type, url))
            .encode()
            .map_err(CastError::Encode)
    }

    pub async fn notify(&self, host: &str, port: u16, url: &str, mime_type: &str) -> Result<()> {
        let frame = Self::frame(url, mime_type)?;
        let addr = format_host_entry(host, port);

        info!("Notifying receiver at {addr} to play {url} ({mime_type})");

        let connection_error = |source: io::Error| CastError::Connection {
            addr: addr.clone(),
            source,
        };

        let mut stream = within(self.connect_timeout, "connect", TcpStream::connect(&addr))
            .await
            .map_err(connection_error)?;

        within(self.write_timeout, "write", async {
            stream.write_all(&frame).await?;
            stream.shutdown().await
        })
        .await
        .map_err(connection_error)?;

        debug!("Sent {} byte play command to {addr}", frame.len());

        Ok(())
    }
}
