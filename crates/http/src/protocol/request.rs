//! The parsed HTTP request.
//!
//! A [`Request`] is owned by a pooled context and reused for every request on a
//! connection: [`Request::clear`] keeps the allocated header and query capacity.

use bytes::Bytes;
use http::header::{CONNECTION, EXPECT};
use http::{HeaderMap, Method, Version};

use crate::interner::Atom;

/// What the client asked to happen to the connection after this exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionDirective {
    #[default]
    KeepAlive,
    Close,
    Upgrade,
}

impl ConnectionDirective {
    /// Resolves the directive from the `Connection` header value and the protocol version.
    ///
    /// HTTP/1.1 defaults to keep-alive, HTTP/1.0 defaults to close.
    pub fn resolve(value: Option<&[u8]>, version: Version) -> Self {
        let default = if version == Version::HTTP_10 { Self::Close } else { Self::KeepAlive };
        let Some(value) = value else {
            return default;
        };

        let mut directive = default;
        for token in value.split(|b| *b == b',').map(<[u8]>::trim_ascii) {
            if token.eq_ignore_ascii_case(b"close") {
                return Self::Close;
            } else if token.eq_ignore_ascii_case(b"upgrade") {
                directive = Self::Upgrade;
            } else if token.eq_ignore_ascii_case(b"keep-alive") && directive != Self::Upgrade {
                directive = Self::KeepAlive;
            }
        }
        directive
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    method: Method,
    path: Atom,
    query: QueryParams,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    connection: ConnectionDirective,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    /// The request target up to (not including) the first `?`.
    pub fn path(&self) -> &Atom {
        &self.path
    }

    pub fn path_mut(&mut self) -> &mut Atom {
        &mut self.path
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut QueryParams {
        &mut self.query
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn version_mut(&mut self) -> &mut Version {
        &mut self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    pub fn take_body(&mut self) -> Bytes {
        std::mem::take(&mut self.body)
    }

    pub fn connection(&self) -> ConnectionDirective {
        self.connection
    }

    pub fn is_keep_alive(&self) -> bool {
        self.connection == ConnectionDirective::KeepAlive
    }

    /// Recomputes the connection directive from the `Connection` header.
    pub fn resolve_connection(&mut self) {
        let value = self.headers.get(CONNECTION).map(|v| v.as_bytes());
        self.connection = ConnectionDirective::resolve(value, self.version);
    }

    /// Returns true if the client sent `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        self.headers.get(EXPECT).is_some_and(|value| {
            let slice = value.as_bytes();
            slice.len() >= 4 && slice[..4].eq_ignore_ascii_case(b"100-")
        })
    }

    /// Resets every field while keeping allocated capacity.
    pub fn clear(&mut self) {
        self.method = Method::GET;
        self.path = Atom::default();
        self.query.clear();
        self.version = Version::HTTP_11;
        self.headers.clear();
        self.body = Bytes::new();
        self.connection = ConnectionDirective::default();
    }
}

/// Query string parameters, split on `&` and then on the first `=`.
///
/// Values stay raw bytes until asked for: [`QueryParams::get`] validates UTF-8 on demand.
/// No percent-decoding is applied, use [`QueryParams::raw`] with a form decoder for that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    raw: Bytes,
    pairs: Vec<(Bytes, Bytes)>,
}

impl QueryParams {
    /// Parses a raw query string (without the leading `?`).
    ///
    /// A pair without `=` is a key with an empty value; pairs with an empty key are ignored.
    pub fn parse(&mut self, raw: Bytes) {
        self.pairs.clear();
        for pair in raw.split(|b| *b == b'&') {
            let (key, value) = match memchr::memchr(b'=', pair) {
                Some(index) => (&pair[..index], &pair[index + 1..]),
                None => (pair, &pair[pair.len()..]),
            };
            if key.is_empty() {
                continue;
            }
            self.pairs.push((raw.slice_ref(key), raw.slice_ref(value)));
        }
        self.raw = raw;
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// First value for `key`, decoded as UTF-8. Invalid UTF-8 yields `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_bytes(key).and_then(|value| simdutf8::basic::from_utf8(value).ok())
    }

    pub fn get_bytes(&self, key: &str) -> Option<&Bytes> {
        self.pairs.iter().find(|(k, _)| k.as_ref() == key.as_bytes()).map(|(_, v)| v)
    }

    /// Every value for `key`, in request order.
    pub fn get_all<'a, 'k>(&'a self, key: &'k str) -> impl Iterator<Item = &'a Bytes> + use<'a, 'k> {
        self.pairs.iter().filter(move |(k, _)| k.as_ref() == key.as_bytes()).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.pairs.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn clear(&mut self) {
        self.raw = Bytes::new();
        self.pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(raw: &'static str) -> QueryParams {
        let mut params = QueryParams::default();
        params.parse(Bytes::from_static(raw.as_bytes()));
        params
    }

    #[test]
    fn query_pairs() {
        let params = query("x=1&y=two&flag&a=b=c");
        assert_eq!(params.len(), 4);
        assert_eq!(params.get("x"), Some("1"));
        assert_eq!(params.get("y"), Some("two"));
        assert_eq!(params.get("flag"), Some(""));
        assert_eq!(params.get("a"), Some("b=c"));
        assert_eq!(params.get("missing"), None);
    }

    #[test]
    fn query_trailing_ampersand_and_empty_keys() {
        let params = query("a=1&&=2&");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get("a"), Some("1"));
    }

    #[test]
    fn query_duplicate_keys_first_wins() {
        let params = query("a=1&b=2&a=3");
        assert_eq!(params.get("a"), Some("1"));
        assert_eq!(params.get_all("a").map(|v| &v[..]).collect::<Vec<_>>(), vec![&b"1"[..], &b"3"[..]]);
    }

    #[test]
    fn lookup_with_short_lived_key() {
        let params = query("name=keel&name=other");
        let value = {
            let key = String::from("name");
            params.get(&key)
        };
        assert_eq!(value, Some("keel"));

        let bytes = {
            let key = String::from("name");
            params.get_bytes(&key)
        };
        assert_eq!(bytes.map(|v| &v[..]), Some(&b"keel"[..]));
    }

    #[test]
    fn connection_directive() {
        assert_eq!(ConnectionDirective::resolve(None, Version::HTTP_11), ConnectionDirective::KeepAlive);
        assert_eq!(ConnectionDirective::resolve(None, Version::HTTP_10), ConnectionDirective::Close);
        assert_eq!(
            ConnectionDirective::resolve(Some(b"keep-alive"), Version::HTTP_10),
            ConnectionDirective::KeepAlive
        );
        assert_eq!(ConnectionDirective::resolve(Some(b"Close"), Version::HTTP_11), ConnectionDirective::Close);
        assert_eq!(
            ConnectionDirective::resolve(Some(b"keep-alive, Upgrade"), Version::HTTP_11),
            ConnectionDirective::Upgrade
        );
    }

    #[test]
    fn clear_resets_fields() {
        let mut request = Request::new();
        *request.method_mut() = Method::POST;
        request.headers_mut().insert(http::header::HOST, "a".parse().unwrap());
        request.set_body(Bytes::from_static(b"body"));
        request.clear();

        assert_eq!(request, Request::new());
    }
}
