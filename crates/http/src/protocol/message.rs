use bytes::{Buf, Bytes};
use http_body::SizeHint;

/// A response head or one piece of its payload, as fed to the response encoder.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

/// A chunk of payload data, or the end of the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    Chunk(Data),
    Eof,
}

/// How a payload is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    /// `Content-Length: n`, n > 0
    Length(u64),
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// no body, `Content-Length: 0` on responses
    Empty,
}

impl PayloadSize {
    /// Picks response framing from a body's size hint: an exact size is length framed,
    /// anything else is chunked.
    pub fn from_size_hint(hint: &SizeHint) -> Self {
        match hint.exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        }
    }

    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<D: Buf> PayloadItem<D> {
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }

    #[inline]
    pub fn is_chunk(&self) -> bool {
        matches!(self, PayloadItem::Chunk(_))
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            PayloadItem::Chunk(bytes) => Some(bytes),
            PayloadItem::Eof => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_from_size_hint() {
        assert_eq!(PayloadSize::from_size_hint(&SizeHint::with_exact(0)), PayloadSize::Empty);
        assert_eq!(PayloadSize::from_size_hint(&SizeHint::with_exact(12)), PayloadSize::Length(12));
        assert_eq!(PayloadSize::from_size_hint(&SizeHint::new()), PayloadSize::Chunked);
    }
}
