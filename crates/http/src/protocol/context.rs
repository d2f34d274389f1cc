//! The per-request state handed to handlers.
//!
//! A context lives as long as its connection's pool slot: the engine parses into it, the
//! pipeline reads the request and fills the response, the writer serializes the response,
//! and then [`HttpContext::reset`] clears it for the next pipelined request. Resetting keeps
//! allocated capacity.

use crate::interner::Atom;
use crate::protocol::{Request, Response};

/// What the connection engine needs from a context.
///
/// Implement it to carry application state next to the request, or use [`RequestContext`].
pub trait HttpContext: Send + Default + 'static {
    fn request(&self) -> &Request;

    fn request_mut(&mut self) -> &mut Request;

    fn response(&self) -> &Response;

    fn response_mut(&mut self) -> &mut Response;

    /// Clears every per-request field.
    fn reset(&mut self);
}

/// The default context: request, response and the route's path parameters.
#[derive(Debug, Default)]
pub struct RequestContext {
    request: Request,
    response: Response,
    path_params: PathParams,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub fn path_params_mut(&mut self) -> &mut PathParams {
        &mut self.path_params
    }

    /// Shorthand for `self.path_params().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params.get(name)
    }
}

impl HttpContext for RequestContext {
    #[inline]
    fn request(&self) -> &Request {
        &self.request
    }

    #[inline]
    fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    #[inline]
    fn response(&self) -> &Response {
        &self.response
    }

    #[inline]
    fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    fn reset(&mut self) {
        self.request.clear();
        self.response.clear();
        self.path_params.clear();
    }
}

/// Values captured by `:name` placeholders, in pattern order.
///
/// Names come from the route template and values are slices of the request path, so
/// filling this never copies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(Atom, Atom)>,
}

impl PathParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params.iter().find(|(key, _)| key.as_str() == name).map(|(_, value)| value.as_str())
    }

    pub fn push(&mut self, name: Atom, value: Atom) {
        self.params.push((name, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode};

    #[test]
    fn reset_clears_everything() {
        let mut ctx = RequestContext::new();
        *ctx.request_mut().method_mut() = Method::POST;
        ctx.response_mut().set_status(StatusCode::CREATED).text("created");
        ctx.path_params_mut().push(Atom::from_static("id"), Atom::from_static("42"));

        ctx.reset();

        assert_eq!(ctx.request().method(), Method::GET);
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert!(ctx.response().body().is_empty());
        assert!(ctx.path_params().is_empty());
    }

    #[test]
    fn params_are_path_slices() {
        let path = Atom::from_static("/users/42/posts/7");
        let mut params = PathParams::default();
        params.push(Atom::from_static("id"), path.slice_ref(&path[7..9]));
        params.push(Atom::from_static("post"), path.slice_ref(&path[16..]));

        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(params.get("post"), Some("7"));
        assert_eq!(params.get("missing"), None);
        assert_eq!(params.iter().collect::<Vec<_>>(), [("id", "42"), ("post", "7")]);
    }
}
