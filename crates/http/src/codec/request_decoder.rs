//! The incremental request parser.
//!
//! [`RequestParser`] is a resumable state machine (`StartLine` → `Headers` → `Body`) that
//! fills a caller owned [`Request`]. It has two entry points:
//!
//! - [`RequestParser::parse`]: the fast path over the contiguous `BytesMut` read buffer.
//!   It scans for the `\r\n\r\n` terminator, remembering how far it already looked, and
//!   splits the whole head off the buffer in one go.
//! - [`RequestParser::parse_segmented`]: the fallback over a [`SegmentedBuf`]. It consumes
//!   the head line by line with a cursor, so a terminator spread over many reads is never
//!   scanned twice.
//!
//! Both produce the same request for the same bytes, however they are split. Body bytes
//! are taken by a [`BodyExtractor`] which also resumes where it stopped.
//!
//! [`RequestDecoder`] wraps the parser as a `tokio_util` [`Decoder`].

use std::sync::Arc;

use bytes::{Buf, BytesMut};
use memchr::memmem;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::SegmentedBuf;
use crate::codec::body::BodyExtractor;
use crate::codec::header::header_decoder::{parse_header_line, parse_payload, parse_request_line};
use crate::config::ConnectionConfig;
use crate::ensure;
use crate::interner::ByteInterner;
use crate::protocol::{ParseError, Request};

const CRLF: &[u8] = b"\r\n";
const HEAD_END: &[u8] = b"\r\n\r\n";

/// Outcome of one parse attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// a whole request was parsed and its bytes consumed
    Complete,
    /// more bytes are needed, already consumed progress is kept
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    StartLine,
    Headers,
    Body,
}

#[derive(Debug)]
pub struct RequestParser {
    state: ParseState,
    /// fast path: bytes already searched for the head terminator
    scanned: usize,
    /// segmented path: head bytes consumed so far
    head_consumed: usize,
    /// segmented path: bytes of the pending line already searched for CRLF
    line_scanned: usize,
    header_lines: usize,
    body: Option<BodyExtractor>,
    expect_continue: bool,
    max_header_bytes: usize,
    max_headers: usize,
    max_body_bytes: usize,
    interner: Arc<ByteInterner>,
}

impl RequestParser {
    pub fn new(config: &ConnectionConfig, interner: Arc<ByteInterner>) -> Self {
        Self {
            state: ParseState::StartLine,
            scanned: 0,
            head_consumed: 0,
            line_scanned: 0,
            header_lines: 0,
            body: None,
            expect_continue: false,
            max_header_bytes: config.max_header_bytes,
            max_headers: config.max_headers,
            max_body_bytes: config.max_body_bytes,
            interner,
        }
    }

    /// Returns true if no part of a request has been consumed yet.
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::StartLine && self.scanned == 0 && self.head_consumed == 0
    }

    /// Returns true, once, if the head just parsed carries `Expect: 100-continue` and its
    /// body has not fully arrived.
    pub fn take_continue(&mut self) -> bool {
        std::mem::take(&mut self.expect_continue)
    }

    /// Parses from the contiguous read buffer.
    ///
    /// On `Complete` the request bytes are split off `src`; pipelined bytes stay in it.
    pub fn parse(&mut self, src: &mut BytesMut, request: &mut Request) -> Result<ParseStatus, ParseError> {
        loop {
            match self.state {
                ParseState::StartLine => {
                    let skipped = skip_leading_crlf(src);
                    self.scanned = self.scanned.saturating_sub(skipped);

                    let from = self.scanned.saturating_sub(HEAD_END.len() - 1);
                    let Some(found) = memmem::find(&src[from..], HEAD_END) else {
                        ensure!(
                            src.len() <= self.max_header_bytes,
                            ParseError::too_large_header(src.len(), self.max_header_bytes)
                        );
                        self.scanned = src.len();
                        return Ok(ParseStatus::Incomplete);
                    };

                    let head_len = from + found + HEAD_END.len();
                    ensure!(
                        head_len <= self.max_header_bytes,
                        ParseError::too_large_header(head_len, self.max_header_bytes)
                    );

                    let head = src.split_to(head_len).freeze();
                    self.scanned = 0;

                    let mut lines = head[..head_len - HEAD_END.len()].split_lines();
                    let request_line = lines.next().unwrap_or_default();
                    parse_request_line(&head, request_line, &self.interner, request)?;

                    for line in lines {
                        self.header_lines += 1;
                        ensure!(self.header_lines <= self.max_headers, ParseError::too_many_headers(self.max_headers));
                        parse_header_line(&head, line, &self.interner, request.headers_mut())?;
                    }

                    self.finish_head(request)?;
                }
                ParseState::Headers => {
                    // only the segmented path stops between header lines
                    return Err(ParseError::malformed_header("parser resumed on a different buffer kind"));
                }
                ParseState::Body => return self.parse_body(src, request),
            }
        }
    }

    /// Parses from a segmented buffer, consuming the head line by line.
    pub fn parse_segmented(&mut self, src: &mut SegmentedBuf, request: &mut Request) -> Result<ParseStatus, ParseError> {
        loop {
            match self.state {
                ParseState::StartLine => {
                    while src.byte_at(0) == Some(b'\r') && src.byte_at(1) == Some(b'\n') {
                        src.advance(CRLF.len());
                        self.line_scanned = self.line_scanned.saturating_sub(CRLF.len());
                    }

                    let Some(line) = self.next_line(src)? else {
                        return Ok(ParseStatus::Incomplete);
                    };
                    parse_request_line(&line, &line[..line.len() - CRLF.len()], &self.interner, request)?;
                    self.state = ParseState::Headers;
                }
                ParseState::Headers => {
                    let Some(line) = self.next_line(src)? else {
                        return Ok(ParseStatus::Incomplete);
                    };
                    if line.len() == CRLF.len() {
                        self.head_consumed = 0;
                        self.finish_head(request)?;
                        continue;
                    }

                    self.header_lines += 1;
                    ensure!(self.header_lines <= self.max_headers, ParseError::too_many_headers(self.max_headers));
                    parse_header_line(&line, &line[..line.len() - CRLF.len()], &self.interner, request.headers_mut())?;
                }
                ParseState::Body => return self.parse_body(src, request),
            }
        }
    }

    /// The error to report when the input ended with `buffered` unconsumed bytes.
    ///
    /// Returns `None` if the stream ended cleanly between requests.
    pub fn eof_error(&self, buffered: usize) -> Option<ParseError> {
        match (&self.state, &self.body) {
            (ParseState::Body, Some(extractor)) => Some(extractor.truncated()),
            _ if buffered == 0 && self.is_idle() => None,
            _ => Some(ParseError::malformed_header("stream ended inside the header block")),
        }
    }

    /// Forgets any partial request.
    pub fn reset(&mut self) {
        self.state = ParseState::StartLine;
        self.scanned = 0;
        self.head_consumed = 0;
        self.line_scanned = 0;
        self.header_lines = 0;
        self.body = None;
        self.expect_continue = false;
    }

    fn next_line(&mut self, src: &mut SegmentedBuf) -> Result<Option<bytes::Bytes>, ParseError> {
        // a CR at the end of the last read may pair with a LF in the next one
        let from = self.line_scanned.saturating_sub(CRLF.len() - 1);
        let Some(end) = src.find(CRLF, from) else {
            let pending = self.head_consumed + src.remaining();
            ensure!(pending <= self.max_header_bytes, ParseError::too_large_header(pending, self.max_header_bytes));
            self.line_scanned = src.remaining();
            return Ok(None);
        };

        self.line_scanned = 0;
        let line_len = end + CRLF.len();
        self.head_consumed += line_len;
        ensure!(
            self.head_consumed <= self.max_header_bytes,
            ParseError::too_large_header(self.head_consumed, self.max_header_bytes)
        );
        Ok(Some(src.copy_to_bytes(line_len)))
    }

    fn finish_head(&mut self, request: &mut Request) -> Result<(), ParseError> {
        request.resolve_connection();
        let payload_size = parse_payload(request.headers(), self.max_body_bytes)?;
        trace!(method = %request.method(), path = %request.path(), ?payload_size, "parsed request head");

        self.expect_continue = !payload_size.is_empty() && request.expects_continue();
        self.body = Some(BodyExtractor::new(payload_size, self.max_body_bytes));
        self.state = ParseState::Body;
        Ok(())
    }

    fn parse_body<B: Buf>(&mut self, src: &mut B, request: &mut Request) -> Result<ParseStatus, ParseError> {
        let Some(extractor) = self.body.as_mut() else {
            self.reset();
            return Ok(ParseStatus::Complete);
        };

        match extractor.extract(src)? {
            Some(body) => {
                request.set_body(body);
                self.reset();
                Ok(ParseStatus::Complete)
            }
            None => Ok(ParseStatus::Incomplete),
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new(&ConnectionConfig::default(), Arc::new(ByteInterner::default()))
    }
}

fn skip_leading_crlf(src: &mut BytesMut) -> usize {
    let mut skipped = 0;
    while src.starts_with(CRLF) {
        src.advance(CRLF.len());
        skipped += CRLF.len();
    }
    skipped
}

trait SplitLines {
    fn split_lines(&self) -> LineIter<'_>;
}

impl SplitLines for [u8] {
    fn split_lines(&self) -> LineIter<'_> {
        LineIter { rest: Some(self) }
    }
}

/// Iterates over CRLF separated lines.
struct LineIter<'a> {
    rest: Option<&'a [u8]>,
}

impl<'a> Iterator for LineIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        match memmem::find(rest, CRLF) {
            Some(end) => {
                self.rest = Some(&rest[end + CRLF.len()..]);
                Some(&rest[..end])
            }
            None => {
                self.rest = None;
                Some(rest)
            }
        }
    }
}

/// A `tokio_util` decoder yielding whole requests, body included.
#[derive(Debug, Default)]
pub struct RequestDecoder {
    parser: RequestParser,
    pending: Request,
}

impl RequestDecoder {
    pub fn new(config: &ConnectionConfig, interner: Arc<ByteInterner>) -> Self {
        Self { parser: RequestParser::new(config, interner), pending: Request::new() }
    }

    /// See [`RequestParser::take_continue`].
    pub fn take_continue(&mut self) -> bool {
        self.parser.take_continue()
    }
}

impl Decoder for RequestDecoder {
    type Item = Request;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.parser.parse(src, &mut self.pending)? {
            ParseStatus::Complete => Ok(Some(std::mem::take(&mut self.pending))),
            ParseStatus::Incomplete => Ok(None),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(request) = self.decode(buf)? {
            return Ok(Some(request));
        }
        match self.parser.eof_error(buf.len()) {
            Some(error) => Err(error),
            None => Ok(None),
        }
    }
}
