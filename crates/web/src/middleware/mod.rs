//! Ready made [`Middleware`](crate::pipeline::Middleware).

mod access_log;
mod compression;

pub use access_log::AccessLog;
pub use compression::Compression;
