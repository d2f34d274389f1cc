//! Wire level encoding and decoding of HTTP/1.1 messages.
//!
//! - Request side:
//!   - [`RequestParser`]: the resumable head + body parser, with a fast path over the
//!     contiguous read buffer and a fallback over a [`SegmentedBuf`]
//!   - [`RequestDecoder`]: the same parser behind the `tokio_util` [`Decoder`](tokio_util::codec::Decoder) trait
//!   - body extraction via the [`body`] module
//!
//! - Response side:
//!   - [`ResponseEncoder`]: head and payload framing
//!   - [`HeaderEncoder`]: status line, standard headers and user headers
//!   - payload framing via the [`body`] module
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use keel_http::codec::RequestDecoder;
//! use tokio_util::codec::Decoder;
//!
//! let mut decoder = RequestDecoder::default();
//! let mut buf = BytesMut::from(&b"GET /users/42?x=1 HTTP/1.1\r\nHost: a\r\n\r\n"[..]);
//!
//! let request = decoder.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(request.path(), "/users/42");
//! assert_eq!(request.query().get("x"), Some("1"));
//! ```

pub mod body;
mod header;
mod request_decoder;
mod response_encoder;
mod segmented;

pub use body::{BodyExtractor, ChunkedDecoder, PayloadDecoder, PayloadEncoder};
pub use header::{HeaderEncoder, ResponseHead};
pub use request_decoder::{ParseStatus, RequestDecoder, RequestParser};
pub use response_encoder::ResponseEncoder;
pub use segmented::SegmentedBuf;
