//! Response body compression negotiated through `Accept-Encoding`.

use std::io;
use std::io::Write;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use async_trait::async_trait;
use bytes::{Buf, Bytes, BytesMut};
use flate2::write::{GzEncoder, ZlibEncoder};
use http::StatusCode;
use http::header::{ACCEPT_ENCODING, CONTENT_LENGTH, HeaderValue, VARY};
use http_body::{Body, Frame};
use keel_http::protocol::{HandlerError, HttpContext, RequestContext, ResponseBody};
use pin_project_lite::pin_project;
use tracing::{debug, trace};
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::pipeline::{Middleware, Next};

const DEFAULT_MIN_SIZE: u64 = 1024;

/// Compresses response bodies with the best coding the client accepts.
///
/// Preference is `zstd`, then `br`, `gzip` and `deflate`; codings with `q=0` are never
/// chosen. Responses are left alone when they are `204` or `101`, already carry a
/// `Content-Encoding`, are empty or are known to be at most `min_size` bytes.
#[derive(Debug, Clone, Copy)]
pub struct Compression {
    min_size: u64,
}

impl Compression {
    pub fn new() -> Self {
        Self { min_size: DEFAULT_MIN_SIZE }
    }

    #[must_use]
    pub fn min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    fn encode(&self, ctx: &mut RequestContext) {
        let status = ctx.response().status();
        if status == StatusCode::NO_CONTENT || status == StatusCode::SWITCHING_PROTOCOLS {
            return;
        }

        if ctx.response().content_encoding().is_some() || ctx.response().body().is_empty() {
            return;
        }

        if ctx.response().body().size_hint().upper().is_some_and(|upper| upper <= self.min_size) {
            return;
        }

        let Some(coding) =
            ctx.request().headers().get(ACCEPT_ENCODING).and_then(|value| value.to_str().ok()).and_then(Coding::select)
        else {
            return;
        };

        let encoder = match coding.encoder() {
            Ok(encoder) => encoder,
            Err(e) => {
                debug!(coding = coding.name(), cause = %e, "failed to create encoder, sending identity");
                return;
            }
        };

        let response = ctx.response_mut();
        let body = response.take_body();
        response.set_body(ResponseBody::stream(EncodedBody::new(body, encoder)));
        response.headers_mut().remove(CONTENT_LENGTH);
        response.headers_mut().append(VARY, HeaderValue::from_static("accept-encoding"));
        response.set_content_encoding(HeaderValue::from_static(coding.name()));
        trace!(coding = coding.name(), "compressing response body");
    }
}

impl Default for Compression {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for Compression {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        next.run(ctx).await?;
        self.encode(ctx);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coding {
    Zstd,
    Br,
    Gzip,
    Deflate,
}

impl Coding {
    const PREFERENCE: [Coding; 4] = [Coding::Zstd, Coding::Br, Coding::Gzip, Coding::Deflate];

    fn name(self) -> &'static str {
        match self {
            Coding::Zstd => "zstd",
            Coding::Br => "br",
            Coding::Gzip => "gzip",
            Coding::Deflate => "deflate",
        }
    }

    /// Picks the preferred coding among those `accept_encoding` allows.
    fn select(accept_encoding: &str) -> Option<Self> {
        let accepted = accept_encoding.split(',').map(parse_coding).filter(|(_, q)| *q > 0.0).collect::<Vec<_>>();
        Self::PREFERENCE
            .into_iter()
            .find(|coding| accepted.iter().any(|(token, _)| token.eq_ignore_ascii_case(coding.name())))
    }

    fn encoder(self) -> io::Result<Encoder> {
        Ok(match self {
            Coding::Zstd => Encoder::Zstd(ZstdEncoder::new(Writer::new(), 6)?),
            Coding::Br => Encoder::Br(Box::new(brotli::CompressorWriter::new(
                Writer::new(),
                32 * 1024, // buffer size
                3,         // quality
                22,        // lgwin
            ))),
            Coding::Gzip => Encoder::Gzip(GzEncoder::new(Writer::new(), flate2::Compression::default())),
            Coding::Deflate => Encoder::Deflate(ZlibEncoder::new(Writer::new(), flate2::Compression::default())),
        })
    }
}

/// Splits `gzip;q=0.5` into its token and weight. A missing or unparsable weight is 1.
fn parse_coding(part: &str) -> (&str, f32) {
    let mut params = part.split(';');
    let token = params.next().unwrap_or_default().trim();
    let q = params
        .find_map(|param| param.trim().strip_prefix("q="))
        .and_then(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0);
    (token, q)
}

struct Writer {
    buf: BytesMut,
}

impl Writer {
    fn new() -> Self {
        Self { buf: BytesMut::with_capacity(4096) }
    }

    fn take(&mut self) -> Bytes {
        self.buf.split().freeze()
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

enum Encoder {
    Gzip(GzEncoder<Writer>),
    Deflate(ZlibEncoder<Writer>),
    Zstd(ZstdEncoder<'static, Writer>),
    Br(Box<brotli::CompressorWriter<Writer>>),
}

impl Encoder {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Self::Gzip(encoder) => encoder.write_all(data),
            Self::Deflate(encoder) => encoder.write_all(data),
            Self::Zstd(encoder) => encoder.write_all(data),
            Self::Br(encoder) => encoder.write_all(data),
        }
    }

    /// Takes what the encoder has produced so far.
    fn take(&mut self) -> Bytes {
        match self {
            Self::Gzip(encoder) => encoder.get_mut().take(),
            Self::Deflate(encoder) => encoder.get_mut().take(),
            Self::Zstd(encoder) => encoder.get_mut().take(),
            Self::Br(encoder) => encoder.get_mut().take(),
        }
    }

    fn finish(self) -> io::Result<Bytes> {
        let writer = match self {
            Self::Gzip(encoder) => encoder.finish()?,
            Self::Deflate(encoder) => encoder.finish()?,
            Self::Zstd(encoder) => encoder.finish()?,
            Self::Br(mut encoder) => {
                encoder.flush()?;
                encoder.into_inner()
            }
        };
        Ok(writer.buf.freeze())
    }
}

pin_project! {
    struct EncodedBody<B> {
        #[pin]
        inner: B,
        // taken once the inner body ends
        encoder: Option<Encoder>,
    }
}

impl<B> EncodedBody<B> {
    fn new(inner: B, encoder: Encoder) -> Self {
        Self { inner, encoder: Some(encoder) }
    }
}

impl<B> Body for EncodedBody<B>
where
    B: Body,
    B::Data: Buf,
    B::Error: Into<HandlerError>,
{
    type Data = Bytes;
    type Error = HandlerError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();

        loop {
            let Some(encoder) = this.encoder.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => {
                    // trailers are not forwarded
                    let Ok(data) = frame.into_data() else { continue };
                    encoder.write(data.chunk())?;
                    let bytes = encoder.take();
                    if !bytes.is_empty() {
                        return Poll::Ready(Some(Ok(Frame::data(bytes))));
                    }
                }
                Some(Err(e)) => return Poll::Ready(Some(Err(e.into()))),
                None => {
                    let Some(encoder) = this.encoder.take() else {
                        return Poll::Ready(None);
                    };
                    let bytes = encoder.finish()?;
                    return Poll::Ready((!bytes.is_empty()).then(|| Ok(Frame::data(bytes))));
                }
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.encoder.is_none()
    }
}
