//! Request head parsing and response head serialization.
//!
//! - [`header_decoder`]: request line, header lines and body framing selection
//! - [`HeaderEncoder`]: status line, standard headers, framing and user headers
//! - `status_line`: preformatted status lines for common codes

pub(crate) mod header_decoder;
mod header_encoder;
mod status_line;

pub use header_encoder::HeaderEncoder;
pub use header_encoder::ResponseHead;
