use std::{error::Error, fmt::Display};

mod range;

pub use range::{ByteRange, RangeError};

#[derive(Debug, PartialEq, Eq)]
pub enum HttpError {
    StartLineEmpty,
    InvalidRequestMethod,
    StartLineMissingTarget,
    InvalidRequestTarget,
    StartLineMissingVersion,
    StartLineInvalidVersion,
    InvalidHeaderKey,
    InvalidHeaderValue,
    InvalidRequest,
    InvalidContentLength,
    HeadTooLarge,
}

impl Error for HttpError {}

impl Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            HttpError::StartLineEmpty => "empty request line",
            HttpError::InvalidRequestMethod => "invalid request method",
            HttpError::StartLineMissingTarget => "request line is missing the target",
            HttpError::InvalidRequestTarget => "invalid request target",
            HttpError::StartLineMissingVersion => "request line is missing the version",
            HttpError::StartLineInvalidVersion => "invalid HTTP version",
            HttpError::InvalidHeaderKey => "invalid header name",
            HttpError::InvalidHeaderValue => "invalid header value",
            HttpError::InvalidRequest => "invalid request",
            HttpError::InvalidContentLength => "invalid content length",
            HttpError::HeadTooLarge => "request head too large",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RequestMethod {
    Get,
    Post,
    Head,
    Delete,
    Put,
    Connect,
    Options,
    Trace,
    Patch,
}

impl RequestMethod {
    pub fn from_slice(method: &[u8]) -> Option<Self> {
        match method {
            b"GET" => Some(Self::Get),
            b"POST" => Some(Self::Post),
            b"HEAD" => Some(Self::Head),
            b"DELETE" => Some(Self::Delete),
            b"PUT" => Some(Self::Put),
            b"CONNECT" => Some(Self::Connect),
            b"OPTIONS" => Some(Self::Options),
            b"TRACE" => Some(Self::Trace),
            b"PATCH" => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Head => "HEAD",
            RequestMethod::Delete => "DELETE",
            RequestMethod::Put => "PUT",
            RequestMethod::Connect => "CONNECT",
            RequestMethod::Options => "OPTIONS",
            RequestMethod::Trace => "TRACE",
            RequestMethod::Patch => "PATCH",
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum HttpVersion {
    ZeroDotNine,
    One,
    OneDotOne,
    Two,
    Three,
}

impl HttpVersion {
    pub fn from_slice(version: &[u8]) -> Option<Self> {
        match version {
            b"HTTP/0.9" => Some(Self::ZeroDotNine),
            b"HTTP/1.0" => Some(Self::One),
            b"HTTP/1.1" => Some(Self::OneDotOne),
            b"HTTP/2" => Some(Self::Two),
            b"HTTP/3" => Some(Self::Three),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            HttpVersion::ZeroDotNine => "HTTP/0.9",
            HttpVersion::One => "HTTP/1.0",
            HttpVersion::OneDotOne => "HTTP/1.1",
            HttpVersion::Two => "HTTP/2",
            HttpVersion::Three => "HTTP/3",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct RequestStartLine {
    pub method: RequestMethod,
    pub target: String,
    pub version: HttpVersion,
}

impl RequestStartLine {
    /// Takes in a start line buffer with the "\r\n" suffix removed and returns the parsed value
    pub fn parse(buf: &[u8]) -> Result<Self, HttpError> {
        if buf.is_empty() {
            return Err(HttpError::StartLineEmpty);
        }

        let mut parts = buf.splitn(3, |b| *b == b' ');

        let method = parts
            .next()
            .and_then(RequestMethod::from_slice)
            .ok_or(HttpError::InvalidRequestMethod)?;

        let target = match parts.next() {
            Some(target) if !target.is_empty() => target,
            _ => return Err(HttpError::StartLineMissingTarget),
        };
        let target =
            String::from_utf8(target.to_vec()).map_err(|_| HttpError::InvalidRequestTarget)?;

        let version = match parts.next() {
            Some(version) if !version.is_empty() => version,
            _ => return Err(HttpError::StartLineMissingVersion),
        };
        let version = HttpVersion::from_slice(version).ok_or(HttpError::StartLineInvalidVersion)?;

        Ok(Self {
            method,
            target,
            version,
        })
    }
}

#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Header {
    pub key: String,
    pub value: String,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Takes in a header buffer with the "\r\n" suffix removed and returns the parsed value
    pub fn parse(header: &[u8]) -> Result<Self, HttpError> {
        let colon = header
            .iter()
            .position(|b| *b == b':')
            .ok_or(HttpError::InvalidHeaderValue)?;

        let key = &header[..colon];
        if key.is_empty() || key.iter().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
            return Err(HttpError::InvalidHeaderKey);
        }
        let key = String::from_utf8(key.to_vec()).map_err(|_| HttpError::InvalidHeaderKey)?;

        let value = String::from_utf8(header[colon + 1..].to_vec())
            .map_err(|_| HttpError::InvalidHeaderValue)?;

        Ok(Self {
            key,
            value: value.trim_matches([' ', '\t']).to_owned(),
        })
    }

    pub fn serialize_with_crlf_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(self.value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

#[inline]
fn extract_line(buf: &[u8]) -> Option<&[u8]> {
    let mut i = 0;
    while i < buf.len() && buf[i] != b'\r' {
        i += 1;
    }

    if i + 1 >= buf.len() || buf[i + 1] != b'\n' {
        return None;
    }

    Some(&buf[0..i])
}

/// Returns the index just past the blank line terminating a request head, if
/// the whole head is in `buf`.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

#[derive(Debug, PartialEq, Eq)]
pub struct Request {
    pub start_line: RequestStartLine,
    pub headers: Vec<Header>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn parse(buf: &[u8]) -> Result<Self, HttpError> {
        let start_line_buf = extract_line(buf).ok_or(HttpError::InvalidRequest)?;
        let start_line = RequestStartLine::parse(start_line_buf)?;

        let mut headers: Vec<Header> = Vec::new();
        let mut content_length: Option<usize> = None;

        let mut i = start_line_buf.len() + 2;
        while i < buf.len() && buf[i] != b'\r' {
            let header_buf = extract_line(&buf[i..]).ok_or(HttpError::InvalidRequest)?;
            let header = Header::parse(header_buf)?;

            if header.key.eq_ignore_ascii_case("Content-Length") {
                content_length = Some(
                    header
                        .value
                        .parse::<usize>()
                        .map_err(|_| HttpError::InvalidContentLength)?,
                );
            }

            headers.push(header);

            i += header_buf.len() + 2;
        }

        if i + 1 >= buf.len() || buf[i + 1] != b'\n' {
            return Err(HttpError::InvalidRequest);
        }

        i += 2;

        let mut body = None;

        if let Some(content_length) = content_length {
            if content_length > 0 {
                if content_length > buf.len() - i {
                    return Err(HttpError::InvalidContentLength);
                }

                body = Some(buf[i..i + content_length].to_vec());
            }
        }

        Ok(Self {
            start_line,
            headers,
            body,
        })
    }

    /// Case-insensitive header lookup, first match wins.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_str())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StatusCode {
    Ok,
    PartialContent,
    BadRequest,
    RangeNotSatisfiable,
    InternalServerError,
    NotImplemented,
}

impl StatusCode {
    pub fn to_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "200 OK",
            StatusCode::PartialContent => "206 Partial Content",
            StatusCode::BadRequest => "400 Bad Request",
            StatusCode::RangeNotSatisfiable => "416 Range Not Satisfiable",
            StatusCode::InternalServerError => "500 Internal Server Error",
            StatusCode::NotImplemented => "501 Not Implemented",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ResponseStartLine {
    pub version: HttpVersion,
    pub status: StatusCode,
}

impl ResponseStartLine {
    pub fn serialize_with_crlf_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.version.to_str().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.status.to_str().as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Response<'a> {
    pub start_line: ResponseStartLine,
    pub headers: Vec<Header>,
    pub body: Option<&'a [u8]>,
}

impl Response<'_> {
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        self.start_line.serialize_with_crlf_into(buf);

        for header in &self.headers {
            header.serialize_with_crlf_into(buf);
        }

        buf.extend_from_slice(b"\r\n");

        if let Some(body) = &self.body {
            buf.extend_from_slice(body);
        }
    }
}
