//! The per-connection engine.
//!
//! - [`HttpConnection`]: read → parse → dispatch → write → flush, for as many requests as
//!   the connection carries
//! - [`MessageWriter`]: the write buffer and response framing
//! - [`ContextPool`]: reuse of request contexts across connections

mod http_connection;
mod message_writer;
mod pool;

pub use http_connection::HttpConnection;
pub use message_writer::MessageWriter;
pub use pool::{ContextPool, PooledContext};
