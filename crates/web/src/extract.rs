//! Typed access to the query string and path parameters.
//!
//! ```
//! use keel_http::protocol::{HttpContext, RequestContext};
//! use keel_web::extract;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Page {
//!     size: u32,
//!     cursor: Option<String>,
//! }
//!
//! let mut ctx = RequestContext::new();
//! ctx.request_mut().query_mut().parse("size=20&cursor=a%20b".into());
//!
//! let page: Page = extract::query(ctx.request()).unwrap();
//! assert_eq!(page.size, 20);
//! assert_eq!(page.cursor.as_deref(), Some("a b"));
//! ```

use std::str::FromStr;

use keel_http::protocol::{Request, RequestContext};
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid query string: {source}")]
    Query {
        #[from]
        source: serde_urlencoded::de::Error,
    },

    #[error("missing path parameter {name}")]
    MissingParam { name: String },

    #[error("invalid path parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },
}

/// Deserializes the whole query string, percent-decoding keys and values.
///
/// A request without a query string deserializes like an empty one.
pub fn query<T: DeserializeOwned>(request: &Request) -> Result<T, ExtractError> {
    Ok(serde_urlencoded::from_bytes(request.query().raw())?)
}

/// Parses the path parameter `name` of the matched route.
pub fn param<T>(ctx: &RequestContext, name: &str) -> Result<T, ExtractError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = ctx.param(name).ok_or_else(|| ExtractError::MissingParam { name: name.to_string() })?;
    raw.parse().map_err(|e: T::Err| ExtractError::InvalidParam { name: name.to_string(), reason: e.to_string() })
}
