//! Byte interning for hot request fields.
//!
//! Request lines and header blocks repeat the same short byte sequences over and over:
//! paths, `keep-alive`, `*/*`, `gzip, deflate, br` and so on. The [`ByteInterner`] maps
//! such sequences to one shared [`Bytes`] handle, so parsing a known value neither
//! allocates nor pins the connection read buffer.
//!
//! The interner is a process-scoped store shared through an `Arc` by every connection.
//! It is read-mostly after warm-up: hits take a read lock, misses insert-if-absent under
//! the write lock, so racing inserts of the same value converge on one winner.
//!
//! Growth is bounded: values longer than `max_len` are never interned and once `capacity`
//! entries exist new values are handed back uninterned.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use bytes::Bytes;
use parking_lot::RwLock;
use simdutf8::basic::Utf8Error;
use tracing::debug;

/// Values seeded into every interner on creation.
const WELL_KNOWN: &[&str] = &[
    "/",
    "*/*",
    "0",
    "1",
    "close",
    "keep-alive",
    "upgrade",
    "chunked",
    "100-continue",
    "gzip",
    "gzip, deflate",
    "gzip, deflate, br",
    "gzip, deflate, br, zstd",
    "no-cache",
    "max-age=0",
    "localhost",
    "text/plain",
    "text/html",
    "application/json",
    "application/x-www-form-urlencoded",
    "application/octet-stream",
    "en-US,en;q=0.9",
];

#[derive(Debug)]
pub struct ByteInterner {
    entries: RwLock<HashSet<Bytes>>,
    max_len: usize,
    capacity: usize,
}

impl ByteInterner {
    /// Creates an interner seeded with well known header values.
    pub fn new(max_len: usize, capacity: usize) -> Self {
        let mut entries = HashSet::with_capacity(WELL_KNOWN.len().min(capacity));
        for value in WELL_KNOWN.iter().take(capacity) {
            entries.insert(Bytes::from_static(value.as_bytes()));
        }
        Self { entries: RwLock::new(entries), max_len, capacity }
    }

    /// Returns the shared handle for `raw` if it has been interned before.
    pub fn lookup(&self, raw: &[u8]) -> Option<Bytes> {
        self.entries.read().get(raw).cloned()
    }

    /// Returns the shared handle for `raw`, inserting it if absent.
    ///
    /// Returns `None` when `raw` is too long to be interned or the interner is full.
    pub fn intern(&self, raw: &[u8]) -> Option<Bytes> {
        if raw.len() > self.max_len {
            return None;
        }

        if let Some(interned) = self.lookup(raw) {
            return Some(interned);
        }

        let mut entries = self.entries.write();
        // another connection may have won the race between the two locks
        if let Some(interned) = entries.get(raw) {
            return Some(interned.clone());
        }

        if entries.len() >= self.capacity {
            debug!(capacity = self.capacity, "interner is full, value is not interned");
            return None;
        }

        let interned = Bytes::copy_from_slice(raw);
        entries.insert(interned.clone());
        Some(interned)
    }

    /// Interns `sub`, falling back to a zero-copy slice of `owner`.
    ///
    /// `sub` must be a subslice of `owner`.
    pub fn intern_or_slice(&self, owner: &Bytes, sub: &[u8]) -> Bytes {
        match self.intern(sub) {
            Some(interned) => interned,
            None => owner.slice_ref(sub),
        }
    }

    /// Same as [`intern_or_slice`](Self::intern_or_slice) but validates the bytes as UTF-8.
    pub fn atom(&self, owner: &Bytes, sub: &[u8]) -> Result<Atom, Utf8Error> {
        Atom::try_from_bytes(self.intern_or_slice(owner, sub))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ByteInterner {
    fn default() -> Self {
        Self::new(64, 4096)
    }
}

/// A cheaply clonable, immutable UTF-8 string backed by [`Bytes`].
///
/// Atoms are what the interner hands out for paths and route templates: cloning one is a
/// reference count bump, and two atoms produced from the same interned value share memory.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Atom(Bytes);

impl Atom {
    pub const fn from_static(str: &'static str) -> Self {
        Self(Bytes::from_static(str.as_bytes()))
    }

    pub fn try_from_bytes(bytes: Bytes) -> Result<Self, Utf8Error> {
        simdutf8::basic::from_utf8(&bytes)?;
        Ok(Self(bytes))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // SAFETY: every constructor validates or starts from a `str`.
        unsafe { std::str::from_utf8_unchecked(&self.0) }
    }

    #[inline]
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Returns the atom for `sub`, which must be a subslice of `self`, without copying.
    pub fn slice_ref(&self, sub: &str) -> Self {
        Self(self.0.slice_ref(sub.as_bytes()))
    }
}

impl Deref for Atom {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Atom {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// hashes like `str` so maps keyed by `Atom` can be queried with a `&str`
impl Hash for Atom {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<str> for Atom {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Atom {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl From<String> for Atom {
    fn from(value: String) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<&'static str> for Atom {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
