//! Per-connection tunables.

use serde::Deserialize;

/// Limits and buffer sizes applied to every connection.
///
/// All fields have defaults, so a partial configuration deserializes fine:
///
/// ```
/// use keel_http::config::ConnectionConfig;
///
/// let config: ConnectionConfig = serde_json::from_str(r#"{ "max_body_bytes": 1024 }"#).unwrap();
/// assert_eq!(config.max_body_bytes, 1024);
/// assert_eq!(config.max_headers, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Initial capacity of the read buffer, and the minimum free space kept before each read
    pub read_buffer_size: usize,
    /// Initial capacity of the write buffer
    pub write_buffer_size: usize,
    /// Pending output larger than this is flushed even when more pipelined requests are buffered
    pub flush_threshold: usize,
    /// Maximum size of a request line plus header block
    pub max_header_bytes: usize,
    /// Maximum number of header lines
    pub max_headers: usize,
    /// Maximum size of a decoded request body
    pub max_body_bytes: usize,
    /// Values longer than this are never interned
    pub intern_max_len: usize,
    /// Maximum number of interned values
    pub intern_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 8 * 1024,
            write_buffer_size: 8 * 1024,
            flush_threshold: 64 * 1024,
            max_header_bytes: 8 * 1024,
            max_headers: 64,
            max_body_bytes: 8 * 1024 * 1024,
            intern_max_len: 64,
            intern_capacity: 4096,
        }
    }
}
