use std::io::{self, SeekFrom};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use http::{
    ByteRange, Header, HttpError, HttpVersion, RangeError, Request, RequestMethod, StatusCode,
};
use log::debug;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{ServeSession, CHUNK_SIZE};
use crate::error::RequestError;

const MAX_HEAD_SIZE: usize = 16 * 1024;
const HEAD_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Read one request head. `None` if the peer closed without sending anything.
async fn read_request<R>(stream: &mut R) -> Result<Option<Request>, RequestError>
where
    R: AsyncRead + Unpin,
{
    let mut request_buf = Vec::new();
    let mut buf = [0; 4096];
    loop {
        let bytes_read = stream.read(&mut buf).await?;
        if bytes_read == 0 {
            if request_buf.is_empty() {
                return Ok(None);
            }
            return Err(HttpError::InvalidRequest.into());
        }

        request_buf.extend_from_slice(&buf[..bytes_read]);

        if http::find_head_end(&request_buf).is_some() {
            return Ok(Some(Request::parse(&request_buf)?));
        }

        if request_buf.len() > MAX_HEAD_SIZE {
            return Err(HttpError::HeadTooLarge.into());
        }
    }
}

fn content_disposition(file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("attachment; filename=\"{escaped}\"")
}

async fn write_head<W>(
    stream: &mut W,
    version: HttpVersion,
    status: StatusCode,
    headers: Vec<Header>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut response_buf = Vec::new();
    http::Response {
        start_line: http::ResponseStartLine { version, status },
        headers,
        body: None,
    }
    .serialize_into(&mut response_buf);
    stream.write_all(&response_buf).await
}

async fn write_empty<W>(
    stream: &mut W,
    version: HttpVersion,
    status: StatusCode,
    mut headers: Vec<Header>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    headers.push(Header::new("Content-Length", "0"));
    headers.push(Header::new("Connection", "close"));
    write_head(stream, version, status, headers).await
}

async fn open_at(path: &Path, offset: u64) -> io::Result<File> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(file)
}

/// Copy exactly `remaining` bytes from `file` to `stream`.
async fn copy_range<W>(file: &mut File, stream: &mut W, mut remaining: u64) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; CHUNK_SIZE];
    while remaining > 0 {
        let want = remaining.min(CHUNK_SIZE as u64) as usize;
        let n = file.read(&mut buf[..want]).await?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file ended with {remaining} bytes of the range left"),
            ));
        }
        stream.write_all(&buf[..n]).await?;
        remaining -= n as u64;
    }
    stream.flush().await
}

/// Answer a GET (`send_body`) or HEAD for the session's file.
async fn respond<W>(
    stream: &mut W,
    request: &Request,
    version: HttpVersion,
    session: &ServeSession,
    send_body: bool,
) -> Result<(), RequestError>
where
    W: AsyncWrite + Unpin,
{
    if let Err(err) = tokio::fs::metadata(&session.file_path).await {
        write_empty(stream, version, StatusCode::InternalServerError, vec![]).await?;
        return Err(err.into());
    }

    let total = session.file_size;
    let (status, range) = match request.header("Range") {
        None => (StatusCode::Ok, ByteRange::full(total)),
        Some(value) => match ByteRange::parse(value, total) {
            Ok(range) => (StatusCode::PartialContent, Some(range)),
            Err(err) => {
                let (status, headers) = match err {
                    RangeError::Malformed => (StatusCode::BadRequest, vec![]),
                    RangeError::Unsatisfiable => (
                        StatusCode::RangeNotSatisfiable,
                        vec![Header::new("Content-Range", format!("bytes */{total}"))],
                    ),
                };
                write_empty(stream, version, status, headers).await?;
                return Err(err.into());
            }
        },
    };

    // Open before the head goes out so a failure can still become a 500
    let mut file = match (send_body, range) {
        (true, Some(range)) => match open_at(&session.file_path, range.start).await {
            Ok(file) => Some(file),
            Err(err) => {
                write_empty(stream, version, StatusCode::InternalServerError, vec![]).await?;
                return Err(err.into());
            }
        },
        _ => None,
    };

    let mut headers = vec![
        Header::new("Content-Type", session.content_type),
        Header::new("Content-Disposition", content_disposition(&session.file_name)),
    ];
    if let Some(range) = range {
        headers.push(Header::new("Content-Range", range.content_range(total)));
    }
    headers.push(Header::new(
        "Content-Length",
        range.map_or(0, |range| range.len()).to_string(),
    ));
    headers.push(Header::new("Accept-Ranges", "bytes"));
    headers.push(Header::new("Connection", "close"));

    write_head(stream, version, status, headers).await?;

    if let (Some(file), Some(range)) = (file.as_mut(), range) {
        copy_range(file, stream, range.len()).await?;
    }

    Ok(())
}

/// Serve a single request on `stream`, then close it.
pub(super) async fn handle(
    mut stream: TcpStream,
    peer: SocketAddr,
    session: &ServeSession,
) -> Result<(), RequestError> {
    let request = match tokio::time::timeout(HEAD_READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) => return Ok(()),
        Ok(Err(err @ RequestError::Http(_))) => {
            write_empty(&mut stream, HttpVersion::One, StatusCode::BadRequest, vec![]).await?;
            return Err(err);
        }
        Ok(Err(err)) => return Err(err),
        Err(_) => {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "timed out reading request").into());
        }
    };

    let start_line = &request.start_line;
    debug!(
        "{peer}: {} {} (range: {:?})",
        start_line.method.to_str(),
        start_line.target,
        request.header("Range")
    );

    let version = match start_line.version {
        HttpVersion::ZeroDotNine | HttpVersion::One => HttpVersion::One,
        _ => HttpVersion::OneDotOne,
    };

    let res = match start_line.method {
        RequestMethod::Get => respond(&mut stream, &request, version, session, true).await,
        RequestMethod::Head => respond(&mut stream, &request, version, session, false).await,
        _ => write_empty(&mut stream, version, StatusCode::NotImplemented, vec![])
            .await
            .map_err(RequestError::from),
    };

    if let Err(err) = stream.shutdown().await {
        debug!("{peer}: failed to shut down connection: {err}");
    }

    res
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::PathBuf;

    use super::*;

    fn session(file_path: PathBuf, file_size: u64) -> ServeSession {
        ServeSession {
            bound_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bound_port: 0,
            file_name: file_path
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned(),
            file_path,
            file_size,
            content_type: "video/mp4",
        }
    }

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("fcast-conn-{}-{name}", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    async fn respond_to(
        raw: &[u8],
        session: &ServeSession,
        send_body: bool,
    ) -> (Result<(), RequestError>, String) {
        let request = Request::parse(raw).unwrap();
        let mut out = Vec::new();
        let res = respond(&mut out, &request, HttpVersion::OneDotOne, session, send_body).await;
        (res, String::from_utf8_lossy(&out).into_owned())
    }

    #[test]
    fn disposition_escapes_quotes() {
        assert_eq!(content_disposition("a.mp4"), "attachment; filename=\"a.mp4\"");
        assert_eq!(
            content_disposition("say \"hi\".mp4"),
            "attachment; filename=\"say \\\"hi\\\".mp4\""
        );
    }

    #[tokio::test]
    async fn read_request_waits_for_full_head() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let reader = tokio::spawn(async move { read_request(&mut server).await });

        client.write_all(b"GET / HTTP/1.1\r\nRan").await.unwrap();
        client.write_all(b"ge: bytes=1-2\r\n\r\n").await.unwrap();

        let request = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(request.header("Range"), Some("bytes=1-2"));
    }

    #[tokio::test]
    async fn read_request_empty_connection() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        assert!(read_request(&mut server).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_request_truncated_head() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(b"GET / HTTP/1.1\r\n").await.unwrap();
        drop(client);
        assert!(matches!(
            read_request(&mut server).await,
            Err(RequestError::Http(HttpError::InvalidRequest))
        ));
    }

    #[tokio::test]
    async fn partial_response() {
        let path = temp_file("partial.mp4", b"0123456789");
        let session = session(path.clone(), 10);

        let raw = b"GET / HTTP/1.1\r\nRange: bytes=2-5\r\n\r\n";
        let (res, out) = respond_to(raw, &session, true).await;
        res.unwrap();
        assert!(out.starts_with("HTTP/1.1 206 Partial Content\r\n"));
        assert!(out.contains("Content-Range: bytes 2-5/10\r\n"));
        assert!(out.contains("Content-Length: 4\r\n"));
        assert!(out.ends_with("\r\n\r\n2345"));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn head_has_no_body() {
        let path = temp_file("head.mp4", b"0123456789");
        let session = session(path.clone(), 10);

        let (res, out) = respond_to(b"HEAD / HTTP/1.1\r\n\r\n", &session, false).await;
        res.unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Length: 10\r\n"));
        assert!(out.ends_with("\r\n\r\n"));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn empty_file_full_response() {
        let path = temp_file("empty.mp4", b"");
        let session = session(path.clone(), 0);

        let (res, out) = respond_to(b"GET / HTTP/1.1\r\n\r\n", &session, true).await;
        res.unwrap();
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("Content-Length: 0\r\n"));
        assert!(!out.contains("Content-Range"));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn malformed_range_is_bad_request() {
        let path = temp_file("malformed.mp4", b"0123456789");
        let session = session(path.clone(), 10);

        let raw = b"GET / HTTP/1.1\r\nRange: bytes=x-y\r\n\r\n";
        let (res, out) = respond_to(raw, &session, true).await;
        assert!(matches!(res, Err(RequestError::Range(RangeError::Malformed))));
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_is_server_error() {
        let session = session(std::env::temp_dir().join("fcast-conn-does-not-exist.mp4"), 10);

        let (res, out) = respond_to(b"GET / HTTP/1.1\r\n\r\n", &session, true).await;
        assert!(matches!(res, Err(RequestError::Io(_))));
        assert!(out.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    }

    #[tokio::test]
    async fn truncated_file_aborts_body() {
        let path = temp_file("shrunk.mp4", b"0123");
        // Session still believes the file has its original size
        let session = session(path.clone(), 10);

        let (res, out) = respond_to(b"GET / HTTP/1.1\r\n\r\n", &session, true).await;
        assert!(matches!(
            res,
            Err(RequestError::Io(ref err)) if err.kind() == io::ErrorKind::UnexpectedEof
        ));
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));

        std::fs::remove_file(path).unwrap();
    }
}
