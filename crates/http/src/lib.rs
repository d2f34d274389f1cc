//! An HTTP/1.1 connection engine.
//!
//! `keel-http` owns everything between the socket and the handler: it parses requests
//! straight out of the read buffer, hands a reusable context to a [`handler::Handler`],
//! and serializes the response back, keeping connections alive across pipelined requests.
//!
//! # Example
//!
//! ```no_run
//! use futures::FutureExt;
//! use keel_http::config::ConnectionConfig;
//! use keel_http::connection::HttpConnection;
//! use keel_http::date::DateService;
//! use keel_http::handler::make_handler;
//! use keel_http::interner::ByteInterner;
//! use keel_http::protocol::{HttpContext, RequestContext};
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use tokio_util::sync::CancellationToken;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let config = ConnectionConfig::default();
//!     let interner = Arc::new(ByteInterner::new(config.intern_max_len, config.intern_capacity));
//!     let date = DateService::start();
//!     let handler = Arc::new(make_handler(|ctx: &mut RequestContext| {
//!         async move {
//!             ctx.response_mut().text("Hello World!\r\n");
//!             Ok(())
//!         }
//!         .boxed()
//!     }));
//!     let token = CancellationToken::new();
//!
//!     loop {
//!         let (stream, peer) = listener.accept().await.unwrap();
//!         let (reader, writer) = stream.into_split();
//!         let connection = HttpConnection::new(reader, writer, &config, interner.clone(), date.handle());
//!         let handler = handler.clone();
//!         let token = token.child_token();
//!
//!         tokio::spawn(async move {
//!             let mut ctx = RequestContext::new();
//!             match connection.process(&mut ctx, &handler, &token).await {
//!                 Ok(()) => info!(%peer, "connection finished"),
//!                 Err(e) => error!(%peer, cause = %e, "connection failed"),
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! - [`codec`]: the resumable request parser, body extraction and response framing
//! - [`protocol`]: requests, responses, contexts and errors
//! - [`connection`]: the connection loop, write buffering and context pooling
//! - [`handler`]: the handler contract
//! - [`interner`]: shared byte interning for paths and header values
//! - [`date`]: the cached `Date` header
//! - [`config`]: per-connection limits
//!
//! # Limitations
//!
//! - HTTP/1.1 and HTTP/1.0 only
//! - no TLS, connection upgrades are answered and then closed
//! - request bodies are collected in full before the handler runs, up to `max_body_bytes`

pub mod codec;
pub mod config;
pub mod connection;
pub mod date;
pub mod handler;
pub mod interner;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
