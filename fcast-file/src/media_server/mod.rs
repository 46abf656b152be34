//! Single-file HTTP server the receiver downloads the cast media from.
//!
//! Every request is answered with the one file the server was started for,
//! whatever path was asked for. Byte ranges are supported so the receiver can
//! seek and resume.

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{CastError, RequestError, StartupError};

mod connection;

/// Body bytes are streamed in chunks of this size.
pub const CHUNK_SIZE: usize = 8 * 1024;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
const BIND_ATTEMPTS: u32 = 3;
const BIND_BACKOFF: Duration = Duration::from_millis(100);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Read-only facts about the served file, shared by all connections.
#[derive(Debug, Clone)]
pub struct ServeSession {
    pub bound_ip: IpAddr,
    pub bound_port: u16,
    pub file_path: PathBuf,
    /// Fixed when the session starts, all ranges are validated against it.
    pub file_size: u64,
    pub file_name: String,
    pub content_type: &'static str,
}

/// MIME type of `path` guessed from its extension.
pub fn content_type_for(path: &Path) -> Option<&'static str> {
    mime_guess::from_path(path).first_raw()
}

/// `http://{ip}:{port}/`
pub fn media_url(ip: IpAddr, port: u16) -> String {
    format!("http://{}:{port}/", common::net::addr_to_url_host(ip))
}

fn try_bind(addr: SocketAddr) -> io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    // On Windows SO_REUSEADDR lets another socket steal an active port
    #[cfg(not(target_os = "windows"))]
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, StartupError> {
    let mut attempt = 1;
    loop {
        match try_bind(addr) {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse && attempt < BIND_ATTEMPTS => {
                warn!("{addr} is in use (attempt {attempt}/{BIND_ATTEMPTS}), retrying");
                tokio::time::sleep(BIND_BACKOFF * attempt).await;
                attempt += 1;
            }
            Err(source) => return Err(StartupError::Bind { addr, source }),
        }
    }
}

async fn check_file(file_path: &Path) -> Result<u64, StartupError> {
    let metadata = match tokio::fs::metadata(file_path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(StartupError::FileNotFound(file_path.to_path_buf()));
        }
        Err(source) => {
            return Err(StartupError::Unreadable {
                path: file_path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.is_file() {
        return Err(StartupError::NotAFile(file_path.to_path_buf()));
    }

    if let Err(source) = tokio::fs::File::open(file_path).await {
        return Err(StartupError::Unreadable {
            path: file_path.to_path_buf(),
            source,
        });
    }

    Ok(metadata.len())
}

async fn serve(listener: TcpListener, session: Arc<ServeSession>, mut fin: oneshot::Receiver<()>) {
    debug!("Media server listening on {:?}", listener.local_addr());

    loop {
        tokio::select! {
            _ = &mut fin => {
                break;
            }
            v = listener.accept() => {
                let (stream, peer) = match v {
                    Ok(v) => v,
                    Err(err) => {
                        error!("Failed to accept connection: {err}");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    match connection::handle(stream, peer, &session).await {
                        Ok(()) => (),
                        Err(err @ (RequestError::Http(_) | RequestError::Range(_))) => {
                            warn!("Rejected request from {peer}: {err}");
                        }
                        Err(err) => error!("Failed to serve {peer}: {err}"),
                    }
                });
            }
        }
    }

    debug!("Quitting media server");
}

/// Handle to a running media server.
///
/// The server stops when [`MediaServer::shutdown`] is called or the handle is
/// dropped. Requests already in flight are allowed to finish.
#[derive(Debug)]
pub struct MediaServer {
    session: Arc<ServeSession>,
    fin_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MediaServer {
    /// Bind to `bind_ip:bind_port` and start serving `file_path`.
    ///
    /// Returns once the listener is bound, so the URL can be handed out right
    /// away. Port 0 picks a free port.
    pub async fn start(
        bind_ip: IpAddr,
        bind_port: u16,
        file_path: impl AsRef<Path>,
    ) -> Result<Self, StartupError> {
        let file_path = file_path.as_ref().to_path_buf();
        let file_size = check_file(&file_path).await?;

        let addr = SocketAddr::new(bind_ip, bind_port);
        let listener = bind(addr).await?;
        let bound_port = listener
            .local_addr()
            .map_err(|source| StartupError::Bind { addr, source })?
            .port();

        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type_for(&file_path).unwrap_or(DEFAULT_CONTENT_TYPE);

        let session = Arc::new(ServeSession {
            bound_ip: bind_ip,
            bound_port,
            file_path,
            file_size,
            file_name,
            content_type,
        });

        debug!(
            "Serving {} ({file_size} bytes, {content_type}) on {bind_ip}:{bound_port}",
            session.file_path.display()
        );

        let (fin_tx, fin_rx) = oneshot::channel();
        let task = tokio::spawn(serve(listener, Arc::clone(&session), fin_rx));

        Ok(Self {
            session,
            fin_tx: Some(fin_tx),
            task: Some(task),
        })
    }

    pub fn session(&self) -> &ServeSession {
        &self.session
    }

    pub fn local_addr(&self) -> SocketAddr {
        SocketAddr::new(self.session.bound_ip, self.session.bound_port)
    }

    pub fn url(&self) -> String {
        media_url(self.session.bound_ip, self.session.bound_port)
    }

    /// Wait for the server task to end. It only ends after a shutdown request.
    pub async fn wait(&mut self) -> Result<(), CastError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };

        let res = task.await;
        self.task = None;
        res.map_err(|err| CastError::Server(err.to_string()))
    }

    /// Stop accepting connections and wait for the accept loop to exit.
    pub async fn shutdown(&mut self) -> Result<(), CastError> {
        if let Some(fin_tx) = self.fin_tx.take() {
            // The loop may already be gone, that's fine
            let _ = fin_tx.send(());
        }
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[tokio::test]
    async fn session_records_bound_address() {
        let path = std::env::temp_dir().join(format!("fcast-server-{}.mp4", std::process::id()));
        std::fs::write(&path, b"0123456789").unwrap();

        let mut server = MediaServer::start(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, &path)
            .await
            .unwrap();

        let session = server.session();
        assert_eq!(session.bound_ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_ne!(session.bound_port, 0);
        assert_eq!(session.file_size, 10);
        assert_eq!(session.content_type, "video/mp4");
        assert_eq!(server.local_addr().port(), session.bound_port);
        assert_eq!(server.url(), format!("http://127.0.0.1:{}/", session.bound_port));
        assert!(format!("{server:?}").starts_with("MediaServer"));

        server.shutdown().await.unwrap();
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn url_brackets_ipv6() {
        assert_eq!(
            media_url(IpAddr::V6(std::net::Ipv6Addr::LOCALHOST), 8080),
            "http://[::1]:8080/"
        );
    }

    #[test]
    fn unknown_extension_has_no_content_type() {
        assert_eq!(content_type_for(Path::new("/tmp/movie.mp4")), Some("video/mp4"));
        assert_eq!(content_type_for(Path::new("/tmp/no-extension")), None);
    }
}
