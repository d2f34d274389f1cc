//! The response a handler populates.

use std::time::SystemTime;

use http::header::{CONNECTION, IntoHeaderName};
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::protocol::ResponseBody;

const TEXT_PLAIN: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
const TEXT_HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
const APPLICATION_JSON: HeaderValue = HeaderValue::from_static("application/json");

/// Status, headers and content of one response.
///
/// `Server`, `Date` and the framing headers are owned by the response writer and must
/// not be set here: a user supplied `Content-Length` or `Transfer-Encoding` is ignored.
#[derive(Debug, Default)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    content_type: Option<HeaderValue>,
    content_encoding: Option<HeaderValue>,
    last_modified: Option<SystemTime>,
    expires: Option<SystemTime>,
    body: ResponseBody,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn insert_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) -> &mut Self {
        self.headers.insert(name, value);
        self
    }

    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.content_type.as_ref()
    }

    pub fn set_content_type(&mut self, value: HeaderValue) -> &mut Self {
        self.content_type = Some(value);
        self
    }

    pub fn content_encoding(&self) -> Option<&HeaderValue> {
        self.content_encoding.as_ref()
    }

    pub fn set_content_encoding(&mut self, value: HeaderValue) -> &mut Self {
        self.content_encoding = Some(value);
        self
    }

    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn set_last_modified(&mut self, time: SystemTime) -> &mut Self {
        self.last_modified = Some(time);
        self
    }

    pub fn expires(&self) -> Option<SystemTime> {
        self.expires
    }

    pub fn set_expires(&mut self, time: SystemTime) -> &mut Self {
        self.expires = Some(time);
        self
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn set_body(&mut self, body: impl Into<ResponseBody>) -> &mut Self {
        self.body = body.into();
        self
    }

    pub fn take_body(&mut self) -> ResponseBody {
        self.body.take()
    }

    /// Sets a `text/plain` body.
    pub fn text(&mut self, body: impl Into<ResponseBody>) -> &mut Self {
        self.set_content_type(TEXT_PLAIN).set_body(body)
    }

    /// Sets a `text/html` body.
    pub fn html(&mut self, body: impl Into<ResponseBody>) -> &mut Self {
        self.set_content_type(TEXT_HTML).set_body(body)
    }

    /// Sets an already serialized `application/json` body.
    pub fn json(&mut self, body: impl Into<ResponseBody>) -> &mut Self {
        self.set_content_type(APPLICATION_JSON).set_body(body)
    }

    /// Returns true if the handler asked for the connection to be closed.
    pub fn wants_close(&self) -> bool {
        self.headers.get(CONNECTION).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"close"))
    }

    /// Resets every field while keeping the header map's capacity.
    pub fn clear(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.content_type = None;
        self.content_encoding = None;
        self.last_modified = None;
        self.expires = None;
        self.body = ResponseBody::empty();
    }
}
