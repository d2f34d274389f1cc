//! Request routing.
//!
//! Routes are `(method, template)` pairs registered once through [`Router::builder`]. For a
//! request the [`Router`]:
//!
//! 1. serves an extension bearing `GET`/`HEAD` path straight from the static cache if that
//!    literal path was resolved to an asset before
//! 2. looks the literal path up in the method's route cache and, on a miss, tests the
//!    method's patterns in registration order (first match wins) and memoizes the outcome,
//!    misses included
//! 3. falls back to the [`AssetSource`] and then to the [`IndexFallback`] for unmatched,
//!    extension bearing `GET`/`HEAD` paths
//! 4. otherwise runs the not found handler
//!
//! Matched requests run through a [`Pipeline`] composed on first use per endpoint: root
//! middleware outermost, then group middleware from the outermost group inwards, then the
//! route's own middleware, then the handler.
//!
//! Both caches are bounded by the router's cache capacity. Once a cache is full new results
//! are still computed but no longer memoized.

pub mod assets;
mod pattern;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use http::Method;
use keel_http::handler::Handler;
use keel_http::interner::Atom;
use keel_http::protocol::{HandlerError, HttpContext, PathParams, RequestContext};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

use crate::pipeline::{BoxHandler, BoxMiddleware, EndpointKey, Middleware, Pipeline, PipelineCache};
use assets::{ServeAsset, has_extension};

pub use assets::{Asset, AssetSource, IndexFallback, MemoryAssets};
pub use pattern::RoutePattern;

const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Error)]
pub enum RouterBuildError {
    #[error("invalid route pattern {template}: {reason}")]
    InvalidPattern { template: String, reason: String },

    #[error("route {method} {template} is registered twice")]
    DuplicateRoute { method: Method, template: String },

    #[error("a not found handler must be set")]
    MissingNotFound,
}

/// Outcome of [`Router::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMatch {
    /// index of the matched route, see [`Router::pattern`]
    Route(usize),
    /// the resolved asset path
    Static(Atom),
    NotFound,
}

/// Counters for the router's caches.
#[derive(Debug, Default)]
pub struct RouterStats {
    cache_hits: AtomicU64,
    pattern_scans: AtomicU64,
    pipelines_built: AtomicU64,
}

impl RouterStats {
    /// Lookups answered by the route or static cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Lookups that iterated over the registered patterns.
    pub fn pattern_scans(&self) -> u64 {
        self.pattern_scans.load(Ordering::Relaxed)
    }

    /// Pipelines composed and cached.
    pub fn pipelines_built(&self) -> u64 {
        self.pipelines_built.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// One route: method, template, handler and route level middleware.
pub struct Route {
    method: Method,
    template: String,
    handler: BoxHandler,
    middleware: Vec<BoxMiddleware>,
}

macro_rules! route_constructor {
    ($name:ident, $method:ident) => {
        pub fn $name<H: Handler<RequestContext> + 'static>(template: impl Into<String>, handler: H) -> Route {
            Route::new(Method::$method, template, handler)
        }
    };
}

impl Route {
    pub fn new<H: Handler<RequestContext> + 'static>(method: Method, template: impl Into<String>, handler: H) -> Self {
        Self { method, template: template.into(), handler: Arc::new(handler), middleware: Vec::new() }
    }

    route_constructor!(get, GET);
    route_constructor!(post, POST);
    route_constructor!(put, PUT);
    route_constructor!(delete, DELETE);
    route_constructor!(patch, PATCH);
    route_constructor!(head, HEAD);
    route_constructor!(options, OPTIONS);

    /// Adds route level middleware, innermost of the chain.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route").field("method", &self.method).field("template", &self.template).finish_non_exhaustive()
    }
}

enum GroupItem {
    Route(Route),
    Group(RouteGroup),
}

/// Routes sharing a path prefix and middleware. Groups nest.
pub struct RouteGroup {
    prefix: String,
    middleware: Vec<BoxMiddleware>,
    items: Vec<GroupItem>,
}

impl RouteGroup {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), middleware: Vec::new(), items: Vec::new() }
    }

    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.items.push(GroupItem::Route(route));
        self
    }

    #[must_use]
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.items.push(GroupItem::Group(group));
        self
    }

    /// Flattens into `out` in registration order, prefixing templates and stacking
    /// middleware from the outermost group inwards.
    fn flatten(self, prefix: &str, outer: &[BoxMiddleware], out: &mut Vec<Route>) {
        let prefix = format!("{prefix}{}", self.prefix);
        let middleware = outer.iter().chain(&self.middleware).cloned().collect::<Vec<_>>();

        for item in self.items {
            match item {
                GroupItem::Route(mut route) => {
                    route.template = format!("{prefix}{}", route.template);
                    route.middleware = middleware.iter().cloned().chain(route.middleware).collect();
                    out.push(route);
                }
                GroupItem::Group(group) => group.flatten(&prefix, &middleware, out),
            }
        }
    }
}

impl fmt::Debug for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteGroup").field("prefix", &self.prefix).field("items", &self.items.len()).finish_non_exhaustive()
    }
}

pub struct RouterBuilder {
    root: RouteGroup,
    not_found: Option<BoxHandler>,
    assets: Option<(Arc<dyn AssetSource>, IndexFallback)>,
    cache_capacity: usize,
}

impl RouterBuilder {
    fn new() -> Self {
        Self { root: RouteGroup::new(""), not_found: None, assets: None, cache_capacity: DEFAULT_CACHE_CAPACITY }
    }

    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.root = self.root.route(route);
        self
    }

    #[must_use]
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.root = self.root.group(group);
        self
    }

    /// Adds root middleware. It wraps every route, asset and the not found handler.
    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.root = self.root.middleware(middleware);
        self
    }

    #[must_use]
    pub fn not_found<H: Handler<RequestContext> + 'static>(mut self, handler: H) -> Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn assets(mut self, source: impl AssetSource + 'static, fallback: IndexFallback) -> Self {
        self.assets = Some((Arc::new(source), fallback));
        self
    }

    /// Maximum number of memoized paths, per method table and for the static cache.
    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Router, RouterBuildError> {
        let not_found = self.not_found.ok_or(RouterBuildError::MissingNotFound)?;

        let root_middleware = self.root.middleware.clone();
        let root = RouteGroup { middleware: Vec::new(), ..self.root };
        let mut flat = Vec::new();
        root.flatten("", &[], &mut flat);

        let mut routes: Vec<RouteEntry> = Vec::with_capacity(flat.len());
        let mut tables: HashMap<Method, MethodTable> = HashMap::new();
        for route in flat {
            let pattern = RoutePattern::parse(route.method.clone(), route.template)?;
            if routes.iter().any(|entry| entry.pattern == pattern) {
                return Err(RouterBuildError::DuplicateRoute {
                    method: pattern.method().clone(),
                    template: pattern.template().to_string(),
                });
            }

            tables.entry(pattern.method().clone()).or_default().patterns.push(routes.len());
            routes.push(RouteEntry {
                key: EndpointKey::new(pattern.method().clone(), pattern.template().clone()),
                pattern,
                handler: route.handler,
                middleware: route.middleware,
            });
        }

        let assets = self.assets.map(|(source, fallback)| AssetRoutes {
            source,
            fallback,
            served: RwLock::new(HashMap::new()),
            pipelines: PipelineCache::new(),
        });

        Ok(Router {
            routes,
            tables,
            root_middleware,
            not_found,
            not_found_pipeline: OnceLock::new(),
            pipelines: PipelineCache::new(),
            assets,
            cache_capacity: self.cache_capacity,
            saturated: AtomicBool::new(false),
            stats: RouterStats::default(),
        })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder").field("root", &self.root).finish_non_exhaustive()
    }
}

struct RouteEntry {
    pattern: RoutePattern,
    key: EndpointKey,
    handler: BoxHandler,
    middleware: Vec<BoxMiddleware>,
}

#[derive(Default)]
struct MethodTable {
    /// indexes into `Router::routes`, in registration order
    patterns: Vec<usize>,
    cache: RwLock<HashMap<Atom, Option<usize>>>,
}

struct AssetRoutes {
    source: Arc<dyn AssetSource>,
    fallback: IndexFallback,
    /// literal request path to resolved asset path
    served: RwLock<HashMap<Atom, Atom>>,
    pipelines: PipelineCache,
}

pub struct Router {
    routes: Vec<RouteEntry>,
    tables: HashMap<Method, MethodTable>,
    root_middleware: Vec<BoxMiddleware>,
    not_found: BoxHandler,
    not_found_pipeline: OnceLock<Arc<Pipeline>>,
    pipelines: PipelineCache,
    assets: Option<AssetRoutes>,
    cache_capacity: usize,
    saturated: AtomicBool,
    stats: RouterStats,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// The pattern of a [`RouteMatch::Route`] index.
    pub fn pattern(&self, index: usize) -> Option<&RoutePattern> {
        self.routes.get(index).map(|entry| &entry.pattern)
    }

    /// Resolves `path`, pushing the captured placeholders of a matched route into `params`.
    pub fn resolve(&self, method: &Method, path: &Atom, params: &mut PathParams) -> RouteMatch {
        let assets = self.assets.as_ref().filter(|_| is_get_like(method) && has_extension(path));

        if let Some(assets) = assets {
            if let Some(resolved) = assets.served.read().get(path.as_str()) {
                RouterStats::bump(&self.stats.cache_hits);
                return RouteMatch::Static(resolved.clone());
            }
        }

        if let Some(index) = self.match_route(method, path) {
            self.routes[index].pattern.captures(path, params);
            return RouteMatch::Route(index);
        }

        if let Some(resolved) = assets.and_then(|assets| self.resolve_asset(assets, path)) {
            return RouteMatch::Static(resolved);
        }

        RouteMatch::NotFound
    }

    fn match_route(&self, method: &Method, path: &Atom) -> Option<usize> {
        let found = self.tables.get(method).and_then(|table| self.match_in(table, path));
        // HEAD is answered by GET routes when no HEAD route matches
        if found.is_none() && *method == Method::HEAD {
            return self.tables.get(&Method::GET).and_then(|table| self.match_in(table, path));
        }
        found
    }

    fn match_in(&self, table: &MethodTable, path: &Atom) -> Option<usize> {
        if let Some(cached) = table.cache.read().get(path.as_str()) {
            RouterStats::bump(&self.stats.cache_hits);
            return *cached;
        }

        RouterStats::bump(&self.stats.pattern_scans);
        let found = table.patterns.iter().copied().find(|&index| self.routes[index].pattern.matches(path));
        self.remember(&table.cache, path, found);
        found
    }

    fn resolve_asset(&self, assets: &AssetRoutes, path: &Atom) -> Option<Atom> {
        let resolved = if assets.source.get(path).is_some() {
            owned(path)
        } else {
            let index = assets.fallback.index_for(path)?;
            assets.source.get(&index)?;
            Atom::from(index)
        };

        self.remember(&assets.served, path, resolved.clone());
        Some(resolved)
    }

    fn remember<V>(&self, cache: &RwLock<HashMap<Atom, V>>, path: &Atom, value: V) {
        let mut cache = cache.write();
        if cache.len() >= self.cache_capacity && !cache.contains_key(path.as_str()) {
            if !self.saturated.swap(true, Ordering::Relaxed) {
                warn!(capacity = self.cache_capacity, "route cache is full, new paths are no longer memoized");
            }
            return;
        }
        cache.entry(owned(path)).or_insert(value);
    }

    fn route_pipeline(&self, index: usize) -> Arc<Pipeline> {
        let entry = &self.routes[index];
        let (pipeline, built) = self.pipelines.get_or_compose(&entry.key, || {
            let middleware = self.root_middleware.iter().chain(&entry.middleware).cloned();
            Pipeline::new(middleware, Arc::clone(&entry.handler))
        });
        if built {
            RouterStats::bump(&self.stats.pipelines_built);
        }
        pipeline
    }

    fn asset_pipeline(&self, assets: &AssetRoutes, resolved: Atom) -> Arc<Pipeline> {
        let key = EndpointKey::new(Method::GET, resolved);
        let (pipeline, built) = assets.pipelines.get_or_compose(&key, || {
            let endpoint = ServeAsset { source: Arc::clone(&assets.source), path: key.path.clone() };
            Pipeline::new(self.root_middleware.iter().cloned(), Arc::new(endpoint))
        });
        if built {
            RouterStats::bump(&self.stats.pipelines_built);
        }
        pipeline
    }

    fn not_found_pipeline(&self) -> Arc<Pipeline> {
        let pipeline = self.not_found_pipeline.get_or_init(|| {
            RouterStats::bump(&self.stats.pipelines_built);
            Arc::new(Pipeline::new(self.root_middleware.iter().cloned(), Arc::clone(&self.not_found)))
        });
        Arc::clone(pipeline)
    }
}

#[async_trait]
impl Handler<RequestContext> for Router {
    async fn call(&self, ctx: &mut RequestContext) -> Result<(), HandlerError> {
        let method = ctx.request().method().clone();
        let path = ctx.request().path().clone();

        let pipeline = match self.resolve(&method, &path, ctx.path_params_mut()) {
            RouteMatch::Route(index) => self.route_pipeline(index),
            RouteMatch::Static(resolved) => match &self.assets {
                Some(assets) => self.asset_pipeline(assets, resolved),
                None => self.not_found_pipeline(),
            },
            RouteMatch::NotFound => self.not_found_pipeline(),
        };

        pipeline.run(ctx).await
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes.iter().map(|entry| &entry.pattern).collect::<Vec<_>>())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn is_get_like(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Cache keys must not pin the connection's read buffer.
fn owned(path: &Atom) -> Atom {
    Atom::from(path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::assets::MockAssetSource;
    use bytes::Bytes;
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use http::StatusCode;
    use http::header::HeaderValue;
    use keel_http::handler::make_handler;
    use parking_lot::Mutex;

    fn named(name: &'static str) -> impl Handler<RequestContext> {
        make_handler(move |ctx: &mut RequestContext| {
            async move {
                ctx.response_mut().text(name);
                Ok(())
            }
            .boxed()
        })
    }

    fn not_found(ctx: &mut RequestContext) -> BoxFuture<'_, Result<(), HandlerError>> {
        async move {
            ctx.response_mut().set_status(StatusCode::NOT_FOUND);
            Ok(())
        }
        .boxed()
    }

    fn base() -> RouterBuilder {
        Router::builder().not_found(make_handler(not_found))
    }

    fn resolve(router: &Router, method: Method, path: &'static str) -> (RouteMatch, PathParams) {
        let mut params = PathParams::default();
        let matched = router.resolve(&method, &Atom::from_static(path), &mut params);
        (matched, params)
    }

    fn context(method: Method, path: &'static str) -> RequestContext {
        let mut ctx = RequestContext::new();
        *ctx.request_mut().method_mut() = method;
        *ctx.request_mut().path_mut() = Atom::from_static(path);
        ctx
    }

    fn asset(body: &'static str) -> Asset {
        Asset { body: Bytes::from_static(body.as_bytes()), content_type: HeaderValue::from_static("text/html"), last_modified: None }
    }

    #[test]
    fn placeholder_route_captures() {
        let router = base().route(Route::get("/users/:id", named("user"))).build().unwrap();

        let (matched, params) = resolve(&router, Method::GET, "/users/42");
        assert_eq!(matched, RouteMatch::Route(0));
        assert_eq!(params.get("id"), Some("42"));
        assert_eq!(router.pattern(0).unwrap().template(), "/users/:id");
    }

    #[test]
    fn matching_is_memoized() {
        let router = base().route(Route::get("/users/:id", named("user"))).build().unwrap();

        let first = resolve(&router, Method::GET, "/users/42");
        let second = resolve(&router, Method::GET, "/users/42");

        assert_eq!(first, second);
        assert_eq!(router.stats().pattern_scans(), 1);
        assert_eq!(router.stats().cache_hits(), 1);
    }

    #[test]
    fn misses_are_memoized() {
        let router = base().route(Route::get("/users/:id", named("user"))).build().unwrap();

        assert_eq!(resolve(&router, Method::GET, "/nope").0, RouteMatch::NotFound);
        assert_eq!(resolve(&router, Method::GET, "/nope").0, RouteMatch::NotFound);
        assert_eq!(router.stats().pattern_scans(), 1);
        // a method without routes never scans
        assert_eq!(resolve(&router, Method::DELETE, "/users/1").0, RouteMatch::NotFound);
        assert_eq!(router.stats().pattern_scans(), 1);
    }

    #[test]
    fn first_registered_wins() {
        let router = base()
            .route(Route::get("/users/:id", named("by id")))
            .route(Route::get("/users/me", named("me")))
            .build()
            .unwrap();

        assert_eq!(resolve(&router, Method::GET, "/users/me").0, RouteMatch::Route(0));
    }

    #[test]
    fn head_uses_get_routes() {
        let router = base().route(Route::get("/page", named("page"))).build().unwrap();
        assert_eq!(resolve(&router, Method::HEAD, "/page").0, RouteMatch::Route(0));
        assert_eq!(resolve(&router, Method::POST, "/page").0, RouteMatch::NotFound);
    }

    #[test]
    fn head_falls_back_to_get_on_miss() {
        let router = base()
            .route(Route::head("/ping", named("ping")))
            .route(Route::get("/page", named("page")))
            .build()
            .unwrap();

        assert_eq!(resolve(&router, Method::HEAD, "/ping").0, RouteMatch::Route(0));
        assert_eq!(resolve(&router, Method::HEAD, "/page").0, RouteMatch::Route(1));
        // the HEAD miss is memoized as well, so a repeat only hits caches
        assert_eq!(resolve(&router, Method::HEAD, "/page").0, RouteMatch::Route(1));
        assert_eq!(router.stats().pattern_scans(), 3);
        assert_eq!(resolve(&router, Method::HEAD, "/missing").0, RouteMatch::NotFound);
    }

    #[test]
    fn full_cache_stops_memoizing() {
        let router = base().route(Route::get("/users/:id", named("user"))).cache_capacity(1).build().unwrap();

        resolve(&router, Method::GET, "/users/1");
        resolve(&router, Method::GET, "/users/2");
        resolve(&router, Method::GET, "/users/2");
        resolve(&router, Method::GET, "/users/1");

        assert_eq!(router.stats().pattern_scans(), 3);
        assert_eq!(router.stats().cache_hits(), 1);
    }

    #[test]
    fn build_errors() {
        assert!(matches!(Router::builder().build(), Err(RouterBuildError::MissingNotFound)));
        assert!(matches!(
            base().route(Route::get("/a", named("1"))).route(Route::get("/a", named("2"))).build(),
            Err(RouterBuildError::DuplicateRoute { .. })
        ));
        assert!(matches!(base().route(Route::get("no-slash", named("1"))).build(), Err(RouterBuildError::InvalidPattern { .. })));
    }

    struct Trace {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Trace {
        async fn handle(&self, ctx: &mut RequestContext, next: crate::pipeline::Next<'_>) -> Result<(), HandlerError> {
            self.log.lock().push(self.name);
            next.run(ctx).await
        }
    }

    #[tokio::test]
    async fn middleware_order_and_pipeline_reuse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let trace = |name| Trace { name, log: Arc::clone(&log) };

        let router = base()
            .middleware(trace("root"))
            .group(
                RouteGroup::new("/api")
                    .middleware(trace("api"))
                    .group(
                        RouteGroup::new("/v1")
                            .middleware(trace("v1"))
                            .route(Route::get("/items/:id", named("item")).middleware(trace("route"))),
                    ),
            )
            .build()
            .unwrap();

        let mut ctx = context(Method::GET, "/api/v1/items/3");
        router.call(&mut ctx).await.unwrap();
        assert_eq!(*log.lock(), ["root", "api", "v1", "route"]);
        assert_eq!(ctx.param("id"), Some("3"));

        ctx.reset();
        *ctx.request_mut().path_mut() = Atom::from_static("/api/v1/items/4");
        router.call(&mut ctx).await.unwrap();
        assert_eq!(router.stats().pipelines_built(), 1);

        // unknown paths only run root middleware
        log.lock().clear();
        let mut ctx = context(Method::GET, "/elsewhere");
        router.call(&mut ctx).await.unwrap();
        assert_eq!(*log.lock(), ["root"]);
        assert_eq!(ctx.response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn static_cache_short_circuits() {
        let mut source = MockAssetSource::new();
        source.expect_get().withf(|path: &str| path == "/app.js").times(1).returning(|_| Some(asset("x")));
        let router = base().assets(source, IndexFallback::Disabled).build().unwrap();

        assert_eq!(resolve(&router, Method::GET, "/app.js").0, RouteMatch::Static(Atom::from_static("/app.js")));
        assert_eq!(resolve(&router, Method::GET, "/app.js").0, RouteMatch::Static(Atom::from_static("/app.js")));
        assert_eq!(router.stats().cache_hits(), 1);
    }

    #[test]
    fn spa_and_mpa_fallbacks() {
        let mut source = MockAssetSource::new();
        source.expect_get().withf(|path: &str| path.ends_with("index.html")).returning(|_| Some(asset("index")));
        source.expect_get().returning(|_| None);
        let router = base().assets(source, IndexFallback::Spa).build().unwrap();
        assert_eq!(resolve(&router, Method::GET, "/deep/link.html").0, RouteMatch::Static(Atom::from_static("/index.html")));
        // not extension bearing
        assert_eq!(resolve(&router, Method::GET, "/deep/link").0, RouteMatch::NotFound);

        let mut source = MockAssetSource::new();
        source.expect_get().withf(|path: &str| path == "/docs/index.html").returning(|_| Some(asset("docs")));
        source.expect_get().returning(|_| None);
        let router = base().assets(source, IndexFallback::Mpa).build().unwrap();
        assert_eq!(
            resolve(&router, Method::GET, "/docs/missing.html").0,
            RouteMatch::Static(Atom::from_static("/docs/index.html"))
        );
        assert_eq!(resolve(&router, Method::GET, "/other/missing.html").0, RouteMatch::NotFound);
    }

    #[test]
    fn routes_win_over_uncached_assets() {
        let mut source = MockAssetSource::new();
        source.expect_get().never();
        let router = base().route(Route::get("/report.csv", named("csv"))).assets(source, IndexFallback::Spa).build().unwrap();

        assert_eq!(resolve(&router, Method::GET, "/report.csv").0, RouteMatch::Route(0));
    }

    #[tokio::test]
    async fn assets_are_served_through_root_middleware() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut assets = MemoryAssets::new();
        assets.insert("/index.html", "<p>home</p>");
        let router = base()
            .middleware(Trace { name: "root", log: Arc::clone(&log) })
            .assets(assets, IndexFallback::Spa)
            .build()
            .unwrap();

        let mut ctx = context(Method::GET, "/some/page.html");
        router.call(&mut ctx).await.unwrap();

        assert_eq!(*log.lock(), ["root"]);
        assert_eq!(ctx.response().content_type().unwrap(), "text/html; charset=utf-8");
        assert_eq!(ctx.response().status(), StatusCode::OK);
    }
}
