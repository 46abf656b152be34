//! Ties the media server and the notifier together for one cast.

use std::net::{IpAddr, SocketAddr, TcpListener};
use std::time::Duration;

use log::{debug, error, info};

use crate::error::{Result, StartupError};
use crate::media_server::{content_type_for, MediaServer};
use crate::notifier::CastNotifier;
use crate::request::CastRequest;

#[derive(Debug, Clone, Copy, Default)]
pub struct CastOptions {
    /// Extra pause between the server confirming its bind and notifying the
    /// receiver.
    pub notify_delay: Duration,
    pub notifier: CastNotifier,
}

/// Ask the OS for a port that is currently free on `ip`.
///
/// The port is released before returning, the media server re-binds it with
/// address reuse and a short retry in case of a race.
pub fn find_free_port(ip: IpAddr) -> std::io::Result<u16> {
    let listener = TcpListener::bind(SocketAddr::new(ip, 0))?;
    Ok(listener.local_addr()?.port())
}

async fn resolve_local_ip(request: &CastRequest) -> Result<IpAddr> {
    let host = request.target_host();
    let target = match host.parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => tokio::net::lookup_host((host, request.target_port()))
            .await
            .map_err(|source| StartupError::Resolve {
                host: host.to_owned(),
                source,
            })?
            .next()
            .map(|addr| addr.ip())
            .ok_or_else(|| StartupError::NoLocalAddress(host.to_owned()))?,
    };

    common::net::local_ip_for(target)
        .ok_or_else(|| StartupError::NoLocalAddress(target.to_string()).into())
}

/// A file being cast. The media server keeps running until
/// [`CastSession::shutdown`] is called or the session is dropped.
pub struct CastSession {
    request: CastRequest,
    url: String,
    mime_type: &'static str,
    server: MediaServer,
}

impl CastSession {
    /// Serve the requested file on `local_ip` (picked automatically if `None`)
    /// and tell the receiver to play it.
    ///
    /// The receiver is only notified once the server is accepting. If the
    /// notification fails the server is stopped again.
    pub async fn start(
        request: CastRequest,
        local_ip: Option<IpAddr>,
        options: CastOptions,
    ) -> Result<Self> {
        info!(
            "Casting {} to {}",
            request.file_path().display(),
            request.target()
        );

        let mime_type = content_type_for(request.file_path())
            .ok_or_else(|| StartupError::UnknownMimeType(request.file_path().to_path_buf()))?;

        let local_ip = match local_ip {
            Some(ip) => ip,
            None => resolve_local_ip(&request).await?,
        };
        debug!("Using local address {local_ip}");

        let port = find_free_port(local_ip).map_err(|source| StartupError::Bind {
            addr: SocketAddr::new(local_ip, 0),
            source,
        })?;
        debug!("Found free port {port}");

        let mut server = MediaServer::start(local_ip, port, request.file_path()).await?;
        let url = server.url();
        info!("Media server started at {url}");

        if !options.notify_delay.is_zero() {
            tokio::time::sleep(options.notify_delay).await;
        }

        if let Err(err) = options
            .notifier
            .notify(request.target_host(), request.target_port(), &url, mime_type)
            .await
        {
            if let Err(shutdown_err) = server.shutdown().await {
                error!("Failed to stop media server after failed notify: {shutdown_err}");
            }
            return Err(err);
        }

        Ok(Self {
            request,
            url,
            mime_type,
            server,
        })
    }

    pub fn request(&self) -> &CastRequest {
        &self.request
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn server(&self) -> &MediaServer {
        &self.server
    }

    pub async fn wait(&mut self) -> Result<()> {
        self.server.wait().await
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        info!("Stopping cast of {}", self.request.file_path().display());
        self.server.shutdown().await
    }
}

impl std::fmt::Debug for CastSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CastSession")
            .field("request", &self.request)
            .field("url", &self.url)
            .field("mime_type", &self.mime_type)
            .finish_non_exhaustive()
    }
}
