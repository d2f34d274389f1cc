//! Middleware chains and their per-endpoint cache.
//!
//! A [`Pipeline`] is an immutable list of middleware in front of a terminal handler. Each
//! middleware receives the context and a [`Next`] for the rest of the chain, and decides
//! whether and when to run it. `Next` is just an index into the pipeline's slice, so running
//! a chain allocates nothing beyond the middleware's own futures.
//!
//! Pipelines are composed once per [`EndpointKey`] and kept in a [`PipelineCache`] for the
//! router's lifetime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use keel_http::handler::Handler;
use keel_http::interner::Atom;
use keel_http::protocol::{HandlerError, RequestContext};
use parking_lot::RwLock;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError>;
}

#[async_trait]
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        (**self).handle(ctx, next).await
    }
}

pub type BoxMiddleware = Arc<dyn Middleware>;
pub type BoxHandler = Arc<dyn Handler<RequestContext>>;

/// The remainder of a chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    middleware: &'a [BoxMiddleware],
    endpoint: &'a dyn Handler<RequestContext>,
}

impl Next<'_> {
    pub async fn run(self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        match self.middleware.split_first() {
            Some((current, rest)) => current.handle(ctx, Next { middleware: rest, endpoint: self.endpoint }).await,
            None => self.endpoint.call(ctx).await,
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").field("remaining", &self.middleware.len()).finish_non_exhaustive()
    }
}

/// A composed chain: `middleware[0]` runs first, the endpoint last.
pub struct Pipeline {
    middleware: Box<[BoxMiddleware]>,
    endpoint: BoxHandler,
}

impl Pipeline {
    pub fn new(middleware: impl IntoIterator<Item = BoxMiddleware>, endpoint: BoxHandler) -> Self {
        Self { middleware: middleware.into_iter().collect(), endpoint }
    }

    pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        Next { middleware: &self.middleware, endpoint: self.endpoint.as_ref() }.run(ctx).await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline").field("middleware", &self.middleware.len()).finish_non_exhaustive()
    }
}

/// Identity of one endpoint: the method and the registered template (or, for assets, the
/// resolved literal path).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub method: Method,
    pub path: Atom,
}

impl EndpointKey {
    pub fn new(method: Method, path: Atom) -> Self {
        Self { method, path }
    }
}

/// Composed pipelines by endpoint, filled lazily.
///
/// Two requests racing on a cold key may both compose; the first insert wins and both get
/// the winner.
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: RwLock<HashMap<EndpointKey, Arc<Pipeline>>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached pipeline for `key`, composing it with `compose` on a miss. The
    /// flag is true if this call inserted it.
    pub fn get_or_compose<F>(&self, key: &EndpointKey, compose: F) -> (Arc<Pipeline>, bool)
    where
        F: FnOnce() -> Pipeline,
    {
        if let Some(pipeline) = self.entries.read().get(key) {
            return (Arc::clone(pipeline), false);
        }

        let composed = Arc::new(compose());
        let mut entries = self.entries.write();
        let mut inserted = false;
        let pipeline = entries.entry(key.clone()).or_insert_with(|| {
            inserted = true;
            composed
        });
        (Arc::clone(pipeline), inserted)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use keel_http::handler::make_handler;
    use keel_http::protocol::HttpContext;
    use parking_lot::Mutex;

    /// Records its name before and after the rest of the chain.
    struct Trace {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Trace {
        async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
            self.log.lock().push(format!("{}:before", self.name));
            let result = next.run(ctx).await;
            self.log.lock().push(format!("{}:after", self.name));
            result
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(&self, ctx: &mut RequestContext, _next: Next<'_>) -> Result<(), HandlerError> {
            ctx.response_mut().set_status(http::StatusCode::UNAUTHORIZED);
            Ok(())
        }
    }

    fn endpoint(log: &Arc<Mutex<Vec<String>>>) -> BoxHandler {
        let log = Arc::clone(log);
        Arc::new(make_handler(move |_ctx: &mut RequestContext| {
            log.lock().push("endpoint".into());
            async { Ok(()) }.boxed()
        }))
    }

    #[tokio::test]
    async fn middleware_wraps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            [
                Arc::new(Trace { name: "outer", log: Arc::clone(&log) }) as BoxMiddleware,
                Arc::new(Trace { name: "inner", log: Arc::clone(&log) }),
            ],
            endpoint(&log),
        );

        pipeline.run(&mut RequestContext::new()).await.unwrap();
        assert_eq!(*log.lock(), ["outer:before", "inner:before", "endpoint", "inner:after", "outer:after"]);
    }

    #[tokio::test]
    async fn middleware_can_skip_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new([Arc::new(ShortCircuit) as BoxMiddleware], endpoint(&log));

        let mut ctx = RequestContext::new();
        pipeline.run(&mut ctx).await.unwrap();

        assert_eq!(ctx.response().status(), http::StatusCode::UNAUTHORIZED);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn cache_composes_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let cache = PipelineCache::new();
        let key = EndpointKey::new(Method::GET, Atom::from_static("/users/:id"));
        let mut composed = 0;

        let inserted = (0..3)
            .map(|_| {
                let (_, inserted) = cache.get_or_compose(&key, || {
                    composed += 1;
                    Pipeline::new([], endpoint(&log))
                });
                inserted
            })
            .collect::<Vec<_>>();

        assert_eq!(inserted, [true, false, false]);
        assert_eq!(composed, 1);
        assert_eq!(cache.len(), 1);
    }
}
