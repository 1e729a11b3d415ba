//! HTTP/1.x wire framing.
//!
//! Encodes requests and decodes status lines, header blocks and bodies
//! (fixed length, chunked, or delimited by connection close). Lines are read
//! one byte at a time so nothing past the header/body boundary is consumed;
//! callers hand in a buffered channel so this stays cheap.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::http::headers::Headers;
use crate::http::request::Request;
use bytes::{BufMut, Bytes, BytesMut};
use http::{Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Longest accepted status, header or chunk-size line.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;
/// Cap on the whole response header block.
pub const MAX_HEADER_BYTES: usize = 256 * 1024;

/// Parsed `HTTP/1.x SP code SP reason` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
}

/// How the response body is delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    None,
    Fixed(u64),
    Chunked,
    UntilClose,
}

/// Outcome of reading one line.
enum Line {
    Complete,
    /// Stream ended; the buffer holds whatever arrived first.
    Eof,
}

#[derive(Debug, Clone)]
pub struct HttpCodec {
    max_line_length: usize,
    max_header_bytes: usize,
}

impl Default for HttpCodec {
    fn default() -> Self {
        Self {
            max_line_length: MAX_LINE_LENGTH,
            max_header_bytes: MAX_HEADER_BYTES,
        }
    }
}

impl HttpCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_line_length: usize, max_header_bytes: usize) -> Self {
        Self {
            max_line_length,
            max_header_bytes,
        }
    }

    /// Serializes `request` exactly as given. No headers are added.
    pub fn encode_request(&self, request: &Request) -> Bytes {
        let body_len = request.body().map_or(0, |b| b.len());
        let mut out = BytesMut::with_capacity(256 + body_len);

        out.put_slice(request.method().as_str().as_bytes());
        out.put_u8(b' ');
        out.put_slice(request.url().file().as_bytes());
        out.put_slice(b" HTTP/1.1\r\n");
        for (name, value) in request.headers() {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        out.put_slice(b"\r\n");
        if let Some(body) = request.body() {
            out.put_slice(body.content());
        }
        out.freeze()
    }

    /// Reads one LF-terminated line into `buf`, dropping the CRLF (a bare LF
    /// is tolerated).
    async fn read_line<R>(&self, stream: &mut R, buf: &mut Vec<u8>) -> Result<Line, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        buf.clear();
        loop {
            let byte = match stream.read_u8().await {
                Ok(b) => b,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(Line::Eof),
                Err(e) => return Err(e.into()),
            };
            if byte == b'\n' {
                if buf.last() == Some(&b'\r') {
                    buf.pop();
                }
                return Ok(Line::Complete);
            }
            if buf.len() >= self.max_line_length {
                return Err(NetError::ResponseHeadersTooBig);
            }
            buf.push(byte);
        }
    }

    pub async fn read_status_line<R>(&self, stream: &mut R) -> Result<StatusLine, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buf = Vec::with_capacity(64);
        match self.read_line(stream, &mut buf).await? {
            Line::Complete => {}
            Line::Eof if buf.is_empty() => return Err(NetError::EmptyResponse),
            Line::Eof => return Err(NetError::ResponseHeadersTruncated),
        }
        parse_status_line(&String::from_utf8_lossy(&buf))
    }

    /// Reads header lines up to the blank line ending the block.
    ///
    /// Repeated names are comma-joined. Lines beginning with SP or HT
    /// continue the previous value.
    pub async fn read_headers<R>(&self, stream: &mut R) -> Result<Headers, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut fields: Vec<(String, String)> = Vec::new();
        let mut total = 0usize;
        let mut buf = Vec::with_capacity(128);

        loop {
            if let Line::Eof = self.read_line(stream, &mut buf).await? {
                return Err(NetError::ResponseHeadersTruncated);
            }
            if buf.is_empty() {
                break;
            }
            total += buf.len() + 2;
            if total > self.max_header_bytes {
                return Err(NetError::ResponseHeadersTooBig);
            }

            let line = String::from_utf8_lossy(&buf);
            if line.starts_with([' ', '\t']) {
                match fields.last_mut() {
                    Some((_, value)) => {
                        value.push(' ');
                        value.push_str(line.trim());
                        continue;
                    }
                    None => return Err(NetError::MalformedHeaderLine(line.into_owned())),
                }
            }

            let Some(colon) = line.find(':') else {
                return Err(NetError::MalformedHeaderLine(line.into_owned()));
            };
            let name = &line[..colon];
            if name.is_empty() || name.contains([' ', '\t']) {
                return Err(NetError::MalformedHeaderLine(line.into_owned()));
            }
            let rest = &line[colon + 1..];
            let value = rest.strip_prefix(' ').unwrap_or(rest);
            fields.push((name.to_string(), value.to_string()));
        }

        let mut headers = Headers::new();
        for (name, value) in fields {
            headers.append(name, value);
        }
        Ok(headers)
    }

    /// Reads exactly `len` bytes.
    pub async fn read_fixed_length<R>(&self, stream: &mut R, len: u64) -> Result<Bytes, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut body = Vec::with_capacity(len.min(64 * 1024) as usize);
        let received = (&mut *stream).take(len).read_to_end(&mut body).await.io_context()? as u64;
        if received < len {
            return Err(NetError::IncompleteBody {
                expected: len,
                received,
            });
        }
        Ok(Bytes::from(body))
    }

    /// Decodes a chunked body. Chunk extensions and trailers are discarded.
    pub async fn read_chunked<R>(&self, stream: &mut R) -> Result<Bytes, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut body = BytesMut::new();
        let mut line = Vec::with_capacity(16);

        loop {
            if let Line::Eof = self.read_line(stream, &mut line).await? {
                return Err(NetError::IncompleteChunkedEncoding);
            }
            let size = parse_chunk_size(&line)?;
            if size == 0 {
                break;
            }

            if read_limited(stream, size, &mut body).await? < size {
                return Err(NetError::IncompleteChunkedEncoding);
            }

            match self.read_line(stream, &mut line).await? {
                Line::Complete if line.is_empty() => {}
                Line::Complete => return Err(NetError::InvalidChunkedEncoding),
                Line::Eof => return Err(NetError::IncompleteChunkedEncoding),
            }
        }

        // Trailer section, terminated by an empty line. A peer that closes
        // right after the last chunk has still delivered the whole body.
        loop {
            match self.read_line(stream, &mut line).await? {
                Line::Complete if line.is_empty() => break,
                Line::Complete => continue,
                Line::Eof => break,
            }
        }

        Ok(body.freeze())
    }

    /// Reads until the peer closes the stream.
    pub async fn read_until_close<R>(&self, stream: &mut R) -> Result<Bytes, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.io_context()?;
        Ok(Bytes::from(body))
    }

    /// Reads a body framed as `framing`.
    pub async fn read_body<R>(&self, stream: &mut R, framing: BodyFraming) -> Result<Bytes, NetError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        match framing {
            BodyFraming::None => Ok(Bytes::new()),
            BodyFraming::Fixed(len) => self.read_fixed_length(stream, len).await,
            BodyFraming::Chunked => self.read_chunked(stream).await,
            BodyFraming::UntilClose => self.read_until_close(stream).await,
        }
    }
}

/// Chooses the body framing for a response to `method` (RFC 7230 §3.3.3).
pub fn body_framing(
    method: &Method,
    status: StatusCode,
    headers: &Headers,
) -> Result<BodyFraming, NetError> {
    if *method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return Ok(BodyFraming::None);
    }
    if headers.has_token("Transfer-Encoding", "chunked") {
        return Ok(BodyFraming::Chunked);
    }
    match content_length(headers)? {
        Some(0) => Ok(BodyFraming::None),
        Some(len) => Ok(BodyFraming::Fixed(len)),
        None => Ok(BodyFraming::UntilClose),
    }
}

/// Parses `Content-Length`. Repeated identical values are accepted;
/// conflicting ones are not.
pub fn content_length(headers: &Headers) -> Result<Option<u64>, NetError> {
    let Some(raw) = headers.get("Content-Length") else {
        return Ok(None);
    };
    let mut result = None;
    for part in raw.split(',') {
        let len: u64 = part
            .trim()
            .parse()
            .map_err(|_| NetError::InvalidContentLength)?;
        match result {
            Some(prev) if prev != len => return Err(NetError::InvalidContentLength),
            _ => result = Some(len),
        }
    }
    Ok(result)
}

fn parse_status_line(line: &str) -> Result<StatusLine, NetError> {
    let invalid = || NetError::InvalidStatusLine(line.to_string());

    let (version, rest) = line.split_once(' ').ok_or_else(invalid)?;
    let version = match version {
        "HTTP/1.1" => Version::HTTP_11,
        "HTTP/1.0" => Version::HTTP_10,
        _ => return Err(invalid()),
    };

    let (code, reason) = match rest.split_once(' ') {
        Some((code, reason)) => (code, reason),
        None => (rest, ""),
    };
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let status = code
        .parse::<u16>()
        .ok()
        .and_then(|c| StatusCode::from_u16(c).ok())
        .ok_or_else(invalid)?;

    Ok(StatusLine {
        version,
        status,
        reason: reason.to_string(),
    })
}

fn parse_chunk_size(line: &[u8]) -> Result<u64, NetError> {
    let line = std::str::from_utf8(line).map_err(|_| NetError::InvalidChunkedEncoding)?;
    let size = match line.split_once(';') {
        Some((size, _extensions)) => size,
        None => line,
    }
    .trim();
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(NetError::InvalidChunkedEncoding);
    }
    u64::from_str_radix(size, 16).map_err(|_| NetError::InvalidChunkedEncoding)
}

/// Appends up to `limit` bytes from `stream` into `buf`, stopping early
/// only at end of stream. Returns the number of bytes read.
async fn read_limited<R>(stream: &mut R, limit: u64, buf: &mut BytesMut) -> Result<u64, NetError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut limited = (&mut *stream).take(limit);
    let mut total = 0u64;
    buf.reserve(limit.min(64 * 1024) as usize);
    loop {
        let n = limited.read_buf(buf).await.io_context()?;
        if n == 0 {
            return Ok(total);
        }
        total += n as u64;
    }
}
