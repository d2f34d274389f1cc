//! A byte buffer made of disjoint segments.
//!
//! Transports that hand out one `Bytes` per read (TLS records, channel based test
//! harnesses, `bytes::Bytes` streams) would otherwise have to copy every read into one
//! contiguous buffer before parsing. [`SegmentedBuf`] keeps them as a queue and lets the
//! request parser walk across segment boundaries with a cursor.

use std::collections::VecDeque;
use std::io::IoSlice;

use bytes::{Buf, Bytes, BytesMut};

#[derive(Debug, Default, Clone)]
pub struct SegmentedBuf {
    segments: VecDeque<Bytes>,
    remaining: usize,
}

impl SegmentedBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a segment. Empty segments are dropped.
    pub fn push(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.remaining += bytes.len();
        self.segments.push_back(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Returns the byte at `index` counted from the read position.
    pub fn byte_at(&self, mut index: usize) -> Option<u8> {
        for segment in &self.segments {
            if index < segment.len() {
                return Some(segment[index]);
            }
            index -= segment.len();
        }
        None
    }

    /// Finds the first occurrence of `needle` at or after `from`, the match may span segments.
    pub fn find(&self, needle: &[u8], from: usize) -> Option<usize> {
        let (&first, rest) = needle.split_first()?;
        let mut offset = 0;

        for segment in &self.segments {
            let segment_end = offset + segment.len();
            if segment_end <= from {
                offset = segment_end;
                continue;
            }

            let mut start = from.saturating_sub(offset);
            while let Some(found) = memchr::memchr(first, &segment[start..]) {
                let candidate = offset + start + found;
                let matched = rest.iter().enumerate().all(|(i, b)| self.byte_at(candidate + 1 + i) == Some(*b));
                if matched {
                    return Some(candidate);
                }
                start += found + 1;
            }

            offset = segment_end;
        }
        None
    }

    /// Returns the first `len` bytes without consuming them.
    ///
    /// The result shares memory with the front segment when it lies entirely inside it,
    /// otherwise the bytes are copied.
    #[cfg(test)]
    fn peek_bytes(&self, len: usize) -> Option<Bytes> {
        if len > self.remaining {
            return None;
        }
        match self.segments.front() {
            None => Some(Bytes::new()),
            Some(front) if front.len() >= len => Some(front.slice(..len)),
            Some(_) => {
                let mut copied = BytesMut::with_capacity(len);
                for segment in &self.segments {
                    let need = len - copied.len();
                    if need == 0 {
                        break;
                    }
                    copied.extend_from_slice(&segment[..need.min(segment.len())]);
                }
                Some(copied.freeze())
            }
        }
    }
}

impl From<Bytes> for SegmentedBuf {
    fn from(bytes: Bytes) -> Self {
        let mut buf = Self::new();
        buf.push(bytes);
        buf
    }
}

impl Buf for SegmentedBuf {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn chunk(&self) -> &[u8] {
        self.segments.front().map_or(&[], |segment| segment.as_ref())
    }

    fn chunks_vectored<'a>(&'a self, dst: &mut [IoSlice<'a>]) -> usize {
        let mut filled = 0;
        for (slot, segment) in dst.iter_mut().zip(self.segments.iter()) {
            *slot = IoSlice::new(segment);
            filled += 1;
        }
        filled
    }

    fn advance(&mut self, mut cnt: usize) {
        assert!(cnt <= self.remaining, "cannot advance past the end of a SegmentedBuf");
        self.remaining -= cnt;

        while cnt > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if cnt < front.len() {
                front.advance(cnt);
                return;
            }
            cnt -= front.len();
            self.segments.pop_front();
        }
    }

    fn copy_to_bytes(&mut self, len: usize) -> Bytes {
        assert!(len <= self.remaining, "cannot copy past the end of a SegmentedBuf");

        if let Some(front) = self.segments.front_mut() {
            if front.len() > len {
                self.remaining -= len;
                return front.split_to(len);
            }
            if front.len() == len {
                self.remaining -= len;
                return self.segments.pop_front().unwrap_or_default();
            }
        }

        let mut copied = BytesMut::with_capacity(len);
        while copied.len() < len {
            let chunk = self.chunk();
            let take = chunk.len().min(len - copied.len());
            copied.extend_from_slice(&chunk[..take]);
            self.advance(take);
        }
        copied.freeze()
    }
}
