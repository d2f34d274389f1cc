use crate::codec::body::PayloadEncoder;
use crate::codec::header::{HeaderEncoder, ResponseHead};
use crate::date::DateHandle;
use crate::protocol::{Message, SendError};
use bytes::{Buf, BytesMut};
use std::io;
use std::io::ErrorKind;
use tokio_util::codec::Encoder;
use tracing::error;

/// Encodes a response as a head followed by payload items.
///
/// The payload encoder is chosen from the head's framing. When `suppress_body` is set for
/// the next head (a `HEAD` request) the framing headers are still written but every
/// payload item is dropped.
#[derive(Debug)]
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
    suppress_body: bool,
}

impl ResponseEncoder {
    pub fn new(date: DateHandle) -> Self {
        Self { header_encoder: HeaderEncoder::new(date), payload_encoder: None, suppress_body: false }
    }

    /// Drops the body of the next response.
    pub fn suppress_next_body(&mut self) {
        self.suppress_body = true;
    }

    /// Forgets an unfinished response.
    pub fn reset(&mut self) {
        self.payload_encoder = None;
        self.suppress_body = false;
    }
}

impl<'a, D: Buf> Encoder<Message<ResponseHead<'a>, D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<ResponseHead<'a>, D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header(head) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let payload_encoder = if std::mem::take(&mut self.suppress_body) {
                    PayloadEncoder::suppressed()
                } else {
                    PayloadEncoder::from(head.payload_size)
                };
                self.header_encoder.encode(head, dst)?;
                self.payload_encoder = Some(payload_encoder);
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    error!("expect response header but receive payload item");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                };

                let is_eof = payload_item.is_eof();
                let result = payload_encoder.encode(payload_item, dst);
                if is_eof {
                    self.payload_encoder.take();
                }
                result
            }
        }
    }
}
