//! Routes, groups, middleware, typed extraction and static assets.
//!
//! ```text
//! curl -v http://127.0.0.1:8080/api/users/42?verbose=true
//! curl -v -H 'Accept-Encoding: gzip' http://127.0.0.1:8080/api/report
//! curl -v http://127.0.0.1:8080/some/page.html
//! ```

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use http::StatusCode;
use http::header::HeaderValue;
use keel_http::handler::make_handler;
use keel_http::protocol::{HandlerError, HttpContext, RequestContext};
use keel_web::extract;
use keel_web::middleware::{AccessLog, Compression};
use keel_web::pipeline::{Middleware, Next};
use keel_web::router::{IndexFallback, MemoryAssets, Route, RouteGroup, Router};
use keel_web::{Server, ServerConfig};
use serde::Deserialize;
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct UserQuery {
    #[serde(default)]
    verbose: bool,
}

fn get_user(ctx: &mut RequestContext) -> BoxFuture<'_, Result<(), HandlerError>> {
    async move {
        let id: u64 = extract::param(ctx, "id")?;
        let query: UserQuery = extract::query(ctx.request())?;
        let body = if query.verbose { format!("user {id}, the verbose edition\r\n") } else { format!("user {id}\r\n") };
        ctx.response_mut().text(body);
        Ok(())
    }
    .boxed()
}

fn report(ctx: &mut RequestContext) -> BoxFuture<'_, Result<(), HandlerError>> {
    async move {
        ctx.response_mut().text("all systems nominal\r\n".repeat(200));
        Ok(())
    }
    .boxed()
}

fn not_found(ctx: &mut RequestContext) -> BoxFuture<'_, Result<(), HandlerError>> {
    async move {
        ctx.response_mut().set_status(StatusCode::NOT_FOUND).text("404 not found\r\n");
        Ok(())
    }
    .boxed()
}

/// Rejects requests without an `x-api-key` header.
struct RequireApiKey;

#[async_trait]
impl Middleware for RequireApiKey {
    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), HandlerError> {
        if ctx.request().headers().contains_key("x-api-key") {
            return next.run(ctx).await;
        }
        ctx.response_mut().set_status(StatusCode::UNAUTHORIZED).insert_header("www-authenticate", HeaderValue::from_static("api-key"));
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut assets = MemoryAssets::new();
    assets.insert("/index.html", "<!doctype html><h1>keel</h1>").insert("/app.js", "console.log('keel')");

    let router = Router::builder()
        .middleware(AccessLog)
        .middleware(Compression::new())
        .group(
            RouteGroup::new("/api")
                .route(Route::get("/users/:id", make_handler(get_user)))
                .route(Route::get("/report", make_handler(report)))
                .group(RouteGroup::new("/admin").middleware(RequireApiKey).route(Route::get("/report", make_handler(report)))),
        )
        .assets(assets, IndexFallback::Spa)
        .not_found(make_handler(not_found));

    let config = ServerConfig { address: "127.0.0.1:8080".parse().unwrap(), accept_loops: 2, ..ServerConfig::default() };
    let server = Server::builder().config(config).router(router).build().unwrap();

    let token = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    if let Err(e) = server.start().await {
        error!(cause = %e, "server failed");
    }
}
