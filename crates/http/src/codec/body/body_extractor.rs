//! Collects a whole request body out of one or more reads.
//!
//! The extractor keeps its own progress, so a caller that got `Ok(None)` simply retries
//! with the same buffer after the next read: chunks already taken are never parsed again.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::ensure;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

#[derive(Debug)]
pub struct BodyExtractor {
    decoder: PayloadDecoder,
    size: PayloadSize,
    collected: BytesMut,
    limit: usize,
}

impl BodyExtractor {
    pub fn new(size: PayloadSize, limit: usize) -> Self {
        Self { decoder: PayloadDecoder::from(size), size, collected: BytesMut::new(), limit }
    }

    /// Number of body bytes taken so far.
    pub fn received(&self) -> u64 {
        self.collected.len() as u64
    }

    /// Extracts the body from `src`.
    ///
    /// Returns `Ok(Some(body))` once complete and `Ok(None)` when more bytes are needed.
    pub fn extract<B: Buf>(&mut self, src: &mut B) -> Result<Option<Bytes>, ParseError> {
        // the whole fixed-length body is already buffered: hand it out without copying
        if let PayloadSize::Length(len) = self.size {
            if self.collected.is_empty() && src.remaining() as u64 >= len {
                let body = src.copy_to_bytes(usize::try_from(len).unwrap_or(usize::MAX));
                self.decoder = PayloadDecoder::empty();
                trace!(len, "read fixed length body");
                return Ok(Some(body));
            }
        }

        loop {
            match self.decoder.decode_buf(src)? {
                Some(PayloadItem::Chunk(bytes)) => {
                    ensure!(
                        self.collected.len() + bytes.len() <= self.limit,
                        ParseError::too_large_body(self.limit)
                    );
                    self.collected.extend_from_slice(&bytes);
                }
                Some(PayloadItem::Eof) => {
                    trace!(len = self.collected.len(), "read body");
                    return Ok(Some(self.collected.split().freeze()));
                }
                None => return Ok(None),
            }
        }
    }

    /// The error to report when the stream ended before the body was complete.
    pub fn truncated(&self) -> ParseError {
        match self.size {
            PayloadSize::Length(expected) => ParseError::truncated_body(expected, self.received()),
            PayloadSize::Chunked => ParseError::invalid_chunk("stream ended inside a chunked body"),
            PayloadSize::Empty => ParseError::truncated_body(0, 0),
        }
    }
}
