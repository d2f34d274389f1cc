use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::BytesMut;
use futures::FutureExt;
use http::Method;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::codec::{ParseStatus, RequestParser};
use crate::config::ConnectionConfig;
use crate::connection::message_writer::MessageWriter;
use crate::date::DateHandle;
use crate::handler::Handler;
use crate::interner::ByteInterner;
use crate::protocol::{HttpContext, HttpError, ParseError};

/// One client connection.
///
/// The engine reads into a single buffer and parses as many complete requests as it holds.
/// Each request is dispatched to the handler and its response encoded into the write buffer
/// before the next request is parsed. The write buffer is flushed once no complete request
/// remains, so a pipelined burst is answered with one write.
///
/// The connection ends when:
/// - the peer closes the stream between requests (`Ok`)
/// - either side asked for `Connection: close` (`Ok`, after the response is flushed)
/// - a request is malformed or the stream ends mid request (`RequestError`)
/// - the handler fails or panics (`HandlerFault`)
/// - the token is cancelled (`Cancelled`)
#[derive(Debug)]
pub struct HttpConnection<R, W> {
    reader: R,
    read_buf: BytesMut,
    read_buffer_size: usize,
    parser: RequestParser,
    writer: MessageWriter<W>,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, config: &ConnectionConfig, interner: Arc<ByteInterner>, date: DateHandle) -> Self {
        Self {
            reader,
            read_buf: BytesMut::with_capacity(config.read_buffer_size),
            read_buffer_size: config.read_buffer_size,
            parser: RequestParser::new(config, interner),
            writer: MessageWriter::with_capacity(writer, config.write_buffer_size, config.flush_threshold, date),
        }
    }

    /// Serves requests until the connection ends.
    ///
    /// `ctx` is reset after every request, so it can go back to a pool afterwards.
    pub async fn process<C, H>(mut self, ctx: &mut C, handler: &H, token: &CancellationToken) -> Result<(), HttpError>
    where
        C: HttpContext,
        H: Handler<C> + ?Sized,
    {
        let result = select! {
            biased;
            () = token.cancelled() => Err(HttpError::Cancelled),
            result = self.serve(ctx, handler) => result,
        };

        if let Err(e) = &result {
            // answer what was already handled, unless the socket itself is the problem
            if matches!(e, HttpError::RequestError { .. } | HttpError::HandlerFault { .. }) && !e.is_disconnect() {
                if let Err(flush_error) = self.writer.flush().await {
                    debug!(cause = %flush_error, "failed to flush pending responses");
                }
            }
        }
        ctx.reset();
        result
    }

    async fn serve<C, H>(&mut self, ctx: &mut C, handler: &H) -> Result<(), HttpError>
    where
        C: HttpContext,
        H: Handler<C> + ?Sized,
    {
        loop {
            loop {
                match self.parser.parse(&mut self.read_buf, ctx.request_mut())? {
                    ParseStatus::Complete => {
                        let keep_alive = self.dispatch(ctx, handler).await?;
                        ctx.reset();
                        if !keep_alive {
                            self.writer.flush().await?;
                            trace!("connection close requested");
                            return Ok(());
                        }
                        if self.writer.over_threshold() {
                            self.writer.flush().await?;
                        }
                    }
                    ParseStatus::Incomplete => {
                        if self.parser.take_continue() {
                            self.writer.write_continue().await?;
                            trace!("sent 100 continue");
                        }
                        break;
                    }
                }
            }

            self.writer.flush().await?;

            if self.read_buf.capacity() - self.read_buf.len() < self.read_buffer_size / 4 {
                self.read_buf.reserve(self.read_buffer_size);
            }
            let read = self.reader.read_buf(&mut self.read_buf).await.map_err(ParseError::io)?;
            if read == 0 {
                return match self.parser.eof_error(self.read_buf.len()) {
                    None => {
                        trace!("peer closed the connection");
                        Ok(())
                    }
                    Some(e) => Err(e.into()),
                };
            }
        }
    }

    /// Runs the handler and encodes its response. Returns whether the connection stays open.
    async fn dispatch<C, H>(&mut self, ctx: &mut C, handler: &H) -> Result<bool, HttpError>
    where
        C: HttpContext,
        H: Handler<C> + ?Sized,
    {
        match AssertUnwindSafe(handler.call(ctx)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(cause = %e, path = %ctx.request().path(), "handler failed");
                return Err(HttpError::handler_fault(e));
            }
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(cause = reason, path = %ctx.request().path(), "handler panicked");
                return Err(HttpError::handler_fault(reason));
            }
        }

        let close = !ctx.request().is_keep_alive() || ctx.response().wants_close();
        let suppress_body = ctx.request().method() == Method::HEAD;
        self.writer.write_response(ctx.response_mut(), suppress_body, close).await?;
        Ok(!close)
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> &str {
    if let Some(reason) = panic.downcast_ref::<&'static str>() {
        reason
    } else if let Some(reason) = panic.downcast_ref::<String>() {
        reason
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::make_handler;
    use crate::protocol::{HandlerError, RequestContext};
    use futures::future::BoxFuture;
    use http::StatusCode;
    use http::header::CONNECTION;
    use indoc::indoc;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::AsyncWriteExt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Read(usize),
        Write(Vec<u8>),
        Flush,
    }

    type Log = Arc<Mutex<Vec<Event>>>;

    /// Hands out scripted reads and records every IO call in a shared log.
    struct MockReader {
        reads: VecDeque<Vec<u8>>,
        log: Log,
    }

    struct MockWriter {
        log: Log,
    }

    impl AsyncRead for MockReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let chunk = self.reads.pop_front().unwrap_or_default();
            buf.put_slice(&chunk);
            self.log.lock().push(Event::Read(chunk.len()));
            Poll::Ready(Ok(()))
        }
    }

    impl AsyncWrite for MockWriter {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
            self.log.lock().push(Event::Write(buf.to_vec()));
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.log.lock().push(Event::Flush);
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn mock(reads: Vec<&[u8]>) -> (HttpConnection<MockReader, MockWriter>, Log) {
        let log = Log::default();
        let reader = MockReader { reads: reads.into_iter().map(<[u8]>::to_vec).collect(), log: Arc::clone(&log) };
        let writer = MockWriter { log: Arc::clone(&log) };
        let connection = HttpConnection::new(
            reader,
            writer,
            &ConnectionConfig::default(),
            Arc::new(ByteInterner::default()),
            DateHandle::fixed(),
        );
        (connection, log)
    }

    fn echo_path(ctx: &mut RequestContext) -> BoxFuture<'_, Result<(), HandlerError>> {
        async move {
            let path = ctx.request().path().to_string();
            let body = ctx.request_mut().take_body();
            ctx.response_mut().text(format!("{path}:{}", body.len()));
            Ok(())
        }
        .boxed()
    }

    fn written(log: &Log) -> String {
        let bytes = log
            .lock()
            .iter()
            .filter_map(|event| match event {
                Event::Write(bytes) => Some(bytes.clone()),
                _ => None,
            })
            .flatten()
            .collect::<Vec<u8>>();
        String::from_utf8(bytes).unwrap()
    }

    fn crlf(raw: &str) -> Vec<u8> {
        raw.replace('\n', "\r\n").into_bytes()
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_before_next_read() {
        let raw = crlf(indoc! {"
            GET /first HTTP/1.1
            Host: a

            POST /second HTTP/1.1
            Host: a
            Content-Length: 5

            hello"});
        let (connection, log) = mock(vec![&raw]);

        let handler = make_handler(echo_path);
        let mut ctx = RequestContext::new();
        connection.process(&mut ctx, &handler, &CancellationToken::new()).await.unwrap();

        let events = log.lock().clone();
        let first_read = events.iter().position(|e| *e == Event::Read(raw.len())).unwrap();
        let eof_read = events.iter().position(|e| *e == Event::Read(0)).unwrap();
        let writes = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Event::Write(_)))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        assert!(!writes.is_empty());
        assert!(writes.iter().all(|&index| first_read < index && index < eof_read));
        assert!(events[..eof_read].contains(&Event::Flush));

        let out = written(&log);
        assert_eq!(out.matches("HTTP/1.1 200 OK\r\n").count(), 2);
        assert!(out.find("/first:0").unwrap() < out.find("/second:5").unwrap());
    }

    #[tokio::test]
    async fn request_split_over_reads() {
        let raw = crlf("GET /split?x=1 HTTP/1.1\nHost: a\n\n");
        let (head, tail) = raw.split_at(9);
        let (connection, log) = mock(vec![head, tail]);

        let handler = make_handler(echo_path);
        connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await.unwrap();

        assert!(written(&log).ends_with("/split:0"));
    }

    #[tokio::test]
    async fn connection_close_stops_after_response() {
        let raw = crlf("GET /bye HTTP/1.1\nConnection: close\n\nGET /never HTTP/1.1\n\n");
        let (connection, log) = mock(vec![&raw]);

        let handler = make_handler(echo_path);
        connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await.unwrap();

        let out = written(&log);
        assert!(out.contains("Connection: close\r\n"));
        assert!(!out.contains("/never"));
        // no read after the close
        assert_eq!(log.lock().iter().filter(|e| matches!(e, Event::Read(_))).count(), 1);
    }

    #[tokio::test]
    async fn handler_can_close_the_connection() {
        let raw = crlf("GET / HTTP/1.1\n\n");
        let (connection, log) = mock(vec![&raw, &raw]);

        let handler = make_handler(|ctx: &mut RequestContext| {
            async move {
                ctx.response_mut().insert_header(CONNECTION, http::HeaderValue::from_static("close"));
                Ok(())
            }
            .boxed()
        });
        connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await.unwrap();

        let out = written(&log);
        assert_eq!(out.matches("HTTP/1.1 200 OK").count(), 1);
        assert_eq!(out.matches("Connection: close").count(), 1);
    }

    #[tokio::test]
    async fn malformed_request_closes_without_response() {
        let (connection, log) = mock(vec![b"GARBAGE\r\n\r\n"]);

        let handler = make_handler(echo_path);
        let result = connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(HttpError::RequestError { source: ParseError::MalformedRequestLine { .. } })
        ));
        assert!(written(&log).is_empty());
    }

    #[tokio::test]
    async fn truncated_body_is_reported() {
        let raw = crlf("POST / HTTP/1.1\nContent-Length: 10\n\nhel");
        let (connection, _log) = mock(vec![&raw]);

        let handler = make_handler(echo_path);
        let result = connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(HttpError::RequestError { source: ParseError::TruncatedBody { expected: 10, received: 3 } })
        ));
    }

    #[tokio::test]
    async fn handler_fault_keeps_earlier_responses() {
        let raw = crlf("GET /ok HTTP/1.1\n\nGET /boom HTTP/1.1\n\n");
        let (connection, log) = mock(vec![&raw]);

        let handler = make_handler(|ctx: &mut RequestContext| {
            async move {
                if ctx.request().path() == "/boom" {
                    return Err("boom".into());
                }
                ctx.response_mut().text("fine");
                Ok(())
            }
            .boxed()
        });
        let result = connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await;

        assert!(matches!(result, Err(HttpError::HandlerFault { .. })));
        let out = written(&log);
        assert_eq!(out.matches("HTTP/1.1").count(), 1);
        assert!(out.ends_with("fine"));
    }

    #[tokio::test]
    async fn handler_panic_is_a_fault() {
        let raw = crlf("GET / HTTP/1.1\n\n");
        let (connection, log) = mock(vec![&raw]);

        let handler = make_handler(|_ctx: &mut RequestContext| async move { panic!("handler bug") }.boxed());
        let result = connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await;

        match result {
            Err(HttpError::HandlerFault { reason }) => assert_eq!(reason, "handler bug"),
            other => panic!("unexpected result {other:?}"),
        }
        assert!(written(&log).is_empty());
    }

    #[tokio::test]
    async fn expect_continue_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let (server_read, server_write) = tokio::io::split(server);
        let (mut client_read, mut client_write) = tokio::io::split(client);

        let token = CancellationToken::new();
        let server_token = token.clone();
        let server = tokio::spawn(async move {
            let connection = HttpConnection::new(
                server_read,
                server_write,
                &ConnectionConfig::default(),
                Arc::new(ByteInterner::default()),
                DateHandle::fixed(),
            );
            let handler = make_handler(echo_path);
            connection.process(&mut RequestContext::new(), &handler, &server_token).await
        });

        client_write
            .write_all(b"PUT /upload HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n")
            .await
            .unwrap();

        let mut buf = vec![0u8; 25];
        client_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf[..], b"HTTP/1.1 100 Continue\r\n\r\n");

        client_write.write_all(b"data").await.unwrap();
        let mut response = vec![0u8; 512];
        let mut read = 0;
        while !response[..read].ends_with(b"/upload:4") {
            let n = client_read.read(&mut response[read..]).await.unwrap();
            assert!(n > 0, "server closed early");
            read += n;
        }
        assert!(response.starts_with(b"HTTP/1.1 200 OK\r\n"));

        token.cancel();
        assert!(matches!(server.await.unwrap(), Err(HttpError::Cancelled)));
    }

    #[tokio::test]
    async fn head_request_gets_headers_only() {
        let raw = crlf("HEAD /page HTTP/1.1\n\n");
        let (connection, log) = mock(vec![&raw]);

        let handler = make_handler(echo_path);
        connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await.unwrap();

        let out = written(&log);
        assert!(out.contains("Content-Length: 7\r\n"));
        assert!(out.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn status_from_handler_is_written() {
        let raw = crlf("DELETE /item/1 HTTP/1.1\n\n");
        let (connection, log) = mock(vec![&raw]);

        let handler = make_handler(|ctx: &mut RequestContext| {
            async move {
                ctx.response_mut().set_status(StatusCode::NO_CONTENT);
                Ok(())
            }
            .boxed()
        });
        connection.process(&mut RequestContext::new(), &handler, &CancellationToken::new()).await.unwrap();

        let out = written(&log);
        assert!(out.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(out.contains("Content-Length: 0\r\n"));
    }
}
