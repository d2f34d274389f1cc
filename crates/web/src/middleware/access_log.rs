use std::time::Instant;

use async_trait::async_trait;
use keel_http::protocol::{HandlerError, HttpContext, RequestContext};
use tracing::{info, warn};

use crate::pipeline::{Middleware, Next};

/// Logs one `info` event per request with method, path, status and latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

#[async_trait]
impl Middleware for AccessLog {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        let start = Instant::now();
        let method = ctx.request().method().clone();
        let path = ctx.request().path().clone();

        let result = next.run(ctx).await;

        let elapsed_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        match &result {
            Ok(()) => info!(%method, %path, status = ctx.response().status().as_u16(), elapsed_us, "request handled"),
            Err(e) => warn!(%method, %path, elapsed_us, cause = %e, "request failed"),
        }
        result
    }
}
