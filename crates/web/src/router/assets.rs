//! Static assets served ahead of, or instead of, routed handlers.
//!
//! Loading files from disk or embedding them is left to the application: it implements
//! [`AssetSource`] (or fills a [`MemoryAssets`]) and the router serves whatever the source
//! returns for a literal path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::HeaderValue;
use http::StatusCode;
use keel_http::handler::Handler;
use keel_http::interner::Atom;
use keel_http::protocol::{HandlerError, HttpContext, RequestContext};

const INDEX: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub body: Bytes,
    pub content_type: HeaderValue,
    pub last_modified: Option<SystemTime>,
}

/// Lookup of asset content by literal request path.
#[cfg_attr(test, mockall::automock)]
pub trait AssetSource: Send + Sync {
    fn get(&self, path: &str) -> Option<Asset>;
}

/// What an unmatched, extension bearing `GET` falls back to when no asset has its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexFallback {
    #[default]
    Disabled,
    /// single page application: always `/index.html`
    Spa,
    /// multi page application: the `index.html` of the request path's directory
    Mpa,
}

impl IndexFallback {
    /// The index path to try for `path`, if any.
    pub fn index_for(self, path: &str) -> Option<String> {
        match self {
            IndexFallback::Disabled => None,
            IndexFallback::Spa => Some(format!("/{INDEX}")),
            IndexFallback::Mpa => {
                let dir = path.rfind('/').map_or("", |index| &path[..index]);
                Some(format!("{dir}/{INDEX}"))
            }
        }
    }
}

/// Returns true if the last path segment carries a file extension.
pub fn has_extension(path: &str) -> bool {
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment.rfind('.').is_some_and(|index| index > 0 && index + 1 < segment.len())
}

/// An [`AssetSource`] holding every asset in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryAssets {
    files: HashMap<String, Asset>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an asset, guessing its content type from the extension.
    pub fn insert(&mut self, path: impl Into<String>, body: impl Into<Bytes>) -> &mut Self {
        let path = path.into();
        let content_type = content_type_for(&path);
        self.files.insert(path, Asset { body: body.into(), content_type, last_modified: None });
        self
    }

    pub fn insert_asset(&mut self, path: impl Into<String>, asset: Asset) -> &mut Self {
        self.files.insert(path.into(), asset);
        self
    }
}

impl AssetSource for MemoryAssets {
    fn get(&self, path: &str) -> Option<Asset> {
        self.files.get(path).cloned()
    }
}

fn content_type_for(path: &str) -> HeaderValue {
    let extension = path.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    let mime = match extension.as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "js" | "mjs" => mime::APPLICATION_JAVASCRIPT_UTF_8,
        "json" => mime::APPLICATION_JSON,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "svg" => mime::IMAGE_SVG,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        _ => mime::APPLICATION_OCTET_STREAM,
    };
    HeaderValue::from_str(mime.as_ref()).unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"))
}

/// Terminal handler serving one resolved asset path.
pub(crate) struct ServeAsset {
    pub(crate) source: Arc<dyn AssetSource>,
    pub(crate) path: Atom,
}

#[async_trait]
impl Handler<RequestContext> for ServeAsset {
    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        let response = ctx.response_mut();
        match self.source.get(&self.path) {
            Some(asset) => {
                response.set_content_type(asset.content_type).set_body(asset.body);
                if let Some(time) = asset.last_modified {
                    response.set_last_modified(time);
                }
            }
            // the source changed under us
            None => {
                response.set_status(StatusCode::NOT_FOUND);
            }
        }
        Ok(())
    }
}
