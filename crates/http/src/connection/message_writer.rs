use crate::codec::{ResponseEncoder, ResponseHead};
use crate::date::DateHandle;
use crate::protocol::{Message, PayloadItem, PayloadSize, Response, SendError};
use bytes::{Bytes, BytesMut};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// The write half of a connection: encodes responses into one buffer and writes it out
/// on [`flush`](Self::flush).
///
/// Responses of pipelined requests accumulate in the buffer, so a burst of small
/// responses costs one write. A streamed body flushes whenever the buffer grows past
/// `flush_threshold`.
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
    flush_threshold: usize,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize, flush_threshold: usize, date: DateHandle) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new(date), flush_threshold }
    }

    #[cfg(test)]
    fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Bytes encoded but not written yet.
    #[cfg(test)]
    fn pending(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn over_threshold(&self) -> bool {
        self.buffer.len() >= self.flush_threshold
    }

    /// Writes `100 Continue` ahead of anything else and flushes.
    pub async fn write_continue(&mut self) -> Result<(), SendError> {
        self.flush().await?;
        self.writer.write_all(CONTINUE).await?;
        Ok(self.writer.flush().await?)
    }

    /// Encodes `response`, taking its body.
    ///
    /// Framing follows the body's size hint. With `suppress_body` (a `HEAD` request) the
    /// framing headers are written but the body is never polled.
    pub async fn write_response(&mut self, response: &mut Response, suppress_body: bool, close: bool) -> Result<(), SendError> {
        let mut body = response.take_body();
        let payload_size = PayloadSize::from_size_hint(&body.size_hint());

        if suppress_body {
            self.encoder.suppress_next_body();
        }
        let head = ResponseHead { response: &*response, payload_size, close };
        self.encode(Message::Header(head))?;

        if !suppress_body && !payload_size.is_empty() {
            while let Some(frame) = body.frame().await {
                let frame = frame.map_err(|e| SendError::invalid_body(format!("response body failed: {e}")))?;
                // trailers are not written
                let Ok(data) = frame.into_data() else {
                    continue;
                };
                self.encode(Message::Payload(PayloadItem::Chunk(data)))?;
                if self.over_threshold() {
                    self.flush().await?;
                }
            }
        }

        self.encode(Message::Payload(PayloadItem::Eof))
    }

    #[inline]
    fn encode(&mut self, item: Message<ResponseHead<'_>, Bytes>) -> Result<(), SendError> {
        let result = self.encoder.encode(item, &mut self.buffer);
        if result.is_err() {
            self.encoder.reset();
        }
        result
    }

    pub async fn flush(&mut self) -> Result<(), SendError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        self.writer.write_all(&self.buffer).await?;
        self.buffer.clear();
        Ok(self.writer.flush().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ResponseBody;
    use futures::stream;
    use http_body::Frame;
    use http_body_util::StreamBody;
    use std::convert::Infallible;

    fn writer(flush_threshold: usize) -> MessageWriter<Vec<u8>> {
        MessageWriter::with_capacity(Vec::new(), 1024, flush_threshold, DateHandle::fixed())
    }

    fn body_of(raw: &[u8]) -> &[u8] {
        let start = memchr::memmem::find(raw, b"\r\n\r\n").unwrap() + 4;
        &raw[start..]
    }

    #[tokio::test]
    async fn responses_are_buffered_until_flush() {
        let mut writer = writer(64 * 1024);
        let mut response = Response::new();
        response.text("one");
        writer.write_response(&mut response, false, false).await.unwrap();
        response.clear();
        response.text("two");
        writer.write_response(&mut response, false, true).await.unwrap();

        assert!(writer.get_mut().is_empty());
        writer.flush().await.unwrap();

        let written = String::from_utf8(writer.get_mut().clone()).unwrap();
        assert_eq!(written.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        assert!(written.contains("Connection: close\r\n"));
        assert!(written.ends_with("\r\n\r\ntwo"));
        assert_eq!(writer.pending(), 0);
    }

    #[tokio::test]
    async fn streamed_body_is_chunked_and_flushed_early() {
        let chunks = ["a".repeat(40), "b".repeat(40), "c".repeat(40)];
        let frames = chunks.clone().map(|c| Ok::<_, Infallible>(Frame::data(Bytes::from(c))));
        let mut response = Response::new();
        response.set_body(ResponseBody::stream(StreamBody::new(stream::iter(frames))));

        let mut writer = writer(64);
        writer.write_response(&mut response, false, false).await.unwrap();

        // the threshold forced at least one write before the final flush
        assert!(!writer.get_mut().is_empty());
        writer.flush().await.unwrap();

        let written = writer.get_mut().clone();
        assert!(memchr::memmem::find(&written, b"Transfer-Encoding: chunked\r\n").is_some());
        let expected = format!("28\r\n{}\r\n28\r\n{}\r\n28\r\n{}\r\n0\r\n\r\n", chunks[0], chunks[1], chunks[2]);
        assert_eq!(body_of(&written), expected.as_bytes());
    }

    #[tokio::test]
    async fn head_response_has_no_body() {
        let mut response = Response::new();
        response.text("hello");

        let mut writer = writer(1024);
        writer.write_response(&mut response, true, false).await.unwrap();
        writer.flush().await.unwrap();

        let written = writer.get_mut().clone();
        assert!(memchr::memmem::find(&written, b"Content-Length: 5\r\n").is_some());
        assert!(body_of(&written).is_empty());
    }

    #[tokio::test]
    async fn failing_stream_is_an_error() {
        let frames: Vec<Result<Frame<Bytes>, std::io::Error>> = vec![
            Ok(Frame::data(Bytes::from_static(b"partial"))),
            Err(std::io::Error::other("upstream gone")),
        ];
        let mut response = Response::new();
        response.set_body(ResponseBody::stream(StreamBody::new(stream::iter(frames))));

        let mut writer = writer(1024);
        let result = writer.write_response(&mut response, false, false).await;
        assert!(matches!(result, Err(SendError::InvalidBody { .. })));
    }

    #[tokio::test]
    async fn continue_goes_out_immediately() {
        let mut writer = writer(1024);
        writer.write_continue().await.unwrap();
        assert_eq!(writer.get_mut().as_slice(), CONTINUE);
    }
}
