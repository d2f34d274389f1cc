use std::error::Error;
use std::io;
use thiserror::Error;

/// The error type a handler or middleware returns to the engine.
pub type HandlerError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("handler fault: {reason}")]
    HandlerFault { reason: String },

    #[error("connection cancelled")]
    Cancelled,
}

impl HttpError {
    pub fn handler_fault<S: ToString>(str: S) -> Self {
        Self::HandlerFault { reason: str.to_string() }
    }

    /// Returns true if the error was caused by the peer going away rather than by
    /// a protocol violation or a handler fault.
    pub fn is_disconnect(&self) -> bool {
        let io_error = match self {
            HttpError::RequestError { source: ParseError::Io { source } } => source,
            HttpError::ResponseError { source: SendError::Io { source } } => source,
            _ => return false,
        };

        matches!(
            io_error.kind(),
            io::ErrorKind::ConnectionReset | io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof
        )
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("malformed request line: {reason}")]
    MalformedRequestLine { reason: String },

    #[error("malformed header block: {reason}")]
    MalformedHeaderBlock { reason: String },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("stream ended after {received} of {expected} body bytes")]
    TruncatedBody { expected: u64, received: u64 },

    #[error("invalid chunk encoding: {reason}")]
    InvalidChunkEncoding { reason: String },

    #[error("body size exceed the limit {limit}")]
    TooLargeBody { limit: usize },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn malformed_request_line<S: ToString>(str: S) -> Self {
        Self::MalformedRequestLine { reason: str.to_string() }
    }

    pub fn malformed_header<S: ToString>(str: S) -> Self {
        Self::MalformedHeaderBlock { reason: str.to_string() }
    }

    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_chunk<S: ToString>(str: S) -> Self {
        Self::InvalidChunkEncoding { reason: str.to_string() }
    }

    pub fn truncated_body(expected: u64, received: u64) -> Self {
        Self::TruncatedBody { expected, received }
    }

    pub fn too_large_body(limit: usize) -> Self {
        Self::TooLargeBody { limit }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("header {name} contains CR, LF or NUL")]
    InvalidHeaderValue { name: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_header_value<S: ToString>(name: S) -> Self {
        Self::InvalidHeaderValue { name: name.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}
