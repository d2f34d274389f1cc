//! Routing, middleware pipelines and the acceptor on top of [`keel_http`].
//!
//! A [`Router`] maps `(method, path template)` pairs to handlers wrapped in middleware,
//! falls back to static assets and finally to a mandatory not found handler. A [`Server`]
//! binds the listening socket and drives one [`keel_http::connection::HttpConnection`] per
//! accepted client with the router as its handler.
//!
//! ```no_run
//! use futures::FutureExt;
//! use keel_http::handler::make_handler;
//! use keel_http::protocol::{HttpContext, RequestContext};
//! use keel_web::middleware::AccessLog;
//! use keel_web::router::{Route, Router};
//! use keel_web::Server;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::builder()
//!     .middleware(AccessLog)
//!     .route(Route::get(
//!         "/users/:id",
//!         make_handler(|ctx: &mut RequestContext| {
//!             async move {
//!                 let body = format!("user {}", ctx.param("id").unwrap_or_default());
//!                 ctx.response_mut().text(body);
//!                 Ok(())
//!             }
//!             .boxed()
//!         }),
//!     ))
//!     .not_found(make_handler(|ctx: &mut RequestContext| {
//!         async move {
//!             ctx.response_mut().set_status(http::StatusCode::NOT_FOUND);
//!             Ok(())
//!         }
//!         .boxed()
//!     }));
//!
//! let server = Server::builder().router(router).build()?;
//! server.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod middleware;
pub mod pipeline;
pub mod router;

mod server;

pub use router::{Router, RouterBuilder};
pub use server::{Server, ServerBuildError, ServerBuilder, ServerConfig, TlsSettings};
