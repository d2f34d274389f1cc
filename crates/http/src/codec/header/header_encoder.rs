//! Serializes the response head: status line, standard headers, framing, user headers.
//!
//! The order is fixed: `Server`, `Date`, `Content-Type`, `Content-Encoding`, the framing
//! header, `Last-Modified`, `Expires`, `Connection: close` when closing, then every user
//! header. Each value is checked for CR, LF and NUL before it is written, and on failure
//! the partially written head is removed from the buffer.

use crate::codec::header::status_line::status_line;
use crate::date::DateHandle;
use crate::protocol::{PayloadSize, Response, SendError};

use bytes::{BufMut, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, DATE, SERVER, TRANSFER_ENCODING};
use std::io;
use std::io::Write;
use std::time::SystemTime;
use tokio_util::codec::Encoder;

const SERVER_LINE: &[u8] = b"Server: keel\r\n";
const INIT_HEADER_SIZE: usize = 192;

/// The head of one response as seen by the writer.
#[derive(Debug)]
pub struct ResponseHead<'a> {
    pub response: &'a Response,
    pub payload_size: PayloadSize,
    /// write `Connection: close`
    pub close: bool,
}

#[derive(Debug, Clone)]
pub struct HeaderEncoder {
    date: DateHandle,
}

impl HeaderEncoder {
    pub fn new(date: DateHandle) -> Self {
        Self { date }
    }
}

impl Encoder<ResponseHead<'_>> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, head: ResponseHead<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        let result = self.encode_head(&head, dst);
        if result.is_err() {
            dst.truncate(start);
        }
        result
    }
}

impl HeaderEncoder {
    fn encode_head(&self, head: &ResponseHead<'_>, dst: &mut BytesMut) -> Result<(), SendError> {
        let response = head.response;
        let user_headers = response.headers();

        let estimate = INIT_HEADER_SIZE
            + user_headers.iter().map(|(name, value)| name.as_str().len() + value.len() + 4).sum::<usize>();
        dst.reserve(estimate);

        let status = response.status();
        match status_line(status) {
            Some(line) => dst.put_slice(line),
            None => {
                write!(FastWrite(dst), "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""))?;
            }
        }

        if !user_headers.contains_key(SERVER) {
            dst.put_slice(SERVER_LINE);
        }
        if !user_headers.contains_key(DATE) {
            dst.put_slice(b"Date: ");
            self.date.write_to(dst);
            dst.put_slice(b"\r\n");
        }

        if let Some(content_type) = response.content_type() {
            put_header(dst, "content-type", content_type.as_bytes())?;
        }
        if let Some(content_encoding) = response.content_encoding() {
            put_header(dst, "content-encoding", content_encoding.as_bytes())?;
        }

        match head.payload_size {
            PayloadSize::Empty => dst.put_slice(b"Content-Length: 0\r\n"),
            PayloadSize::Length(n) => write!(FastWrite(dst), "Content-Length: {n}\r\n")?,
            PayloadSize::Chunked => dst.put_slice(b"Transfer-Encoding: chunked\r\n"),
        }

        if let Some(time) = response.last_modified() {
            put_date(dst, b"Last-Modified: ", time);
        }
        if let Some(time) = response.expires() {
            put_date(dst, b"Expires: ", time);
        }

        if head.close {
            dst.put_slice(b"Connection: close\r\n");
        }

        for (name, value) in user_headers {
            // framing belongs to the writer
            if name == CONTENT_LENGTH || name == TRANSFER_ENCODING || (head.close && name == CONNECTION) {
                continue;
            }
            put_header(dst, name.as_str(), value.as_bytes())?;
        }

        dst.put_slice(b"\r\n");
        Ok(())
    }
}

pub(crate) fn put_header(dst: &mut BytesMut, name: &str, value: &[u8]) -> Result<(), SendError> {
    if memchr::memchr3(b'\r', b'\n', 0, value).is_some() {
        return Err(SendError::invalid_header_value(name));
    }
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value);
    dst.put_slice(b"\r\n");
    Ok(())
}

fn put_date(dst: &mut BytesMut, prefix: &[u8], time: SystemTime) {
    dst.put_slice(prefix);
    dst.put_slice(httpdate::fmt_http_date(time).as_bytes());
    dst.put_slice(b"\r\n");
}

struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
