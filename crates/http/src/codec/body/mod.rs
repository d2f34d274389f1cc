//! Request body extraction and response body framing.
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: chunked transfer encoding
//! - `LengthDecoder`: `Content-Length` framed bodies
//! - [`PayloadDecoder`]: picks one of the above from a [`PayloadSize`](crate::protocol::PayloadSize)
//! - [`BodyExtractor`]: accumulates a complete body across reads and enforces the size limit
//!
//! ## Encoders
//! - [`ChunkedEncoder`], `LengthEncoder`
//!   and the dispatching [`PayloadEncoder`]
//!
//! All decoders work on any [`bytes::Buf`], so the same state machines serve the
//! contiguous read buffer and [`SegmentedBuf`](crate::codec::SegmentedBuf).

mod body_extractor;
mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use body_extractor::BodyExtractor;
pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
