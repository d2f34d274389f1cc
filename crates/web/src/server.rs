//! The acceptor: binds the listening socket, runs the accept loops and hands every
//! accepted connection to a [`HttpConnection`] driven by the [`Router`].

use std::collections::BTreeMap;
use std::io;
use std::net::{Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use keel_http::config::ConnectionConfig;
use keel_http::connection::{ContextPool, HttpConnection};
use keel_http::date::{DateHandle, DateService};
use keel_http::interner::ByteInterner;
use keel_http::protocol::{HttpError, RequestContext};
use serde::Deserialize;
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::router::{Router, RouterBuildError, RouterBuilder};

/// Server wide settings. Every field has a default, so a partial document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: SocketAddr,
    /// Pending connection queue length passed to `listen`
    pub backlog: i32,
    /// Number of concurrent accept loops, at least 1
    pub accept_loops: usize,
    /// Pause after a failed accept
    pub accept_backoff_ms: u64,
    /// TCP keep-alive idle time, `None` leaves the OS default
    pub tcp_keepalive_secs: Option<u64>,
    /// Idle contexts kept for reuse
    pub context_pool_size: usize,
    /// Bound of each route and static cache
    pub route_cache_capacity: usize,
    pub connection: ConnectionConfig,
    pub tls: Option<TlsSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: SocketAddr::from((Ipv6Addr::UNSPECIFIED, 8080)),
            backlog: 1024,
            accept_loops: 1,
            accept_backoff_ms: 10,
            tcp_keepalive_secs: Some(60),
            context_pool_size: 1024,
            route_cache_capacity: 4096,
            connection: ConnectionConfig::default(),
            tls: None,
        }
    }
}

/// TLS settings as plain key/value pairs.
///
/// They are carried for the deployment around the server; the server itself only speaks
/// plain HTTP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct TlsSettings {
    entries: BTreeMap<String, String>,
}

impl TlsSettings {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,

    #[error("invalid server config: {reason}")]
    InvalidConfig { reason: String },

    #[error(transparent)]
    Router(#[from] RouterBuildError),
}

#[derive(Debug)]
pub struct ServerBuilder {
    config: ServerConfig,
    router: Option<RouterBuilder>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { config: ServerConfig::default(), router: None }
    }

    #[must_use]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the routes. The router's cache capacity is taken from the config.
    #[must_use]
    pub fn router(mut self, router: RouterBuilder) -> Self {
        self.router = Some(router);
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let config = self.config;
        if config.accept_loops == 0 {
            return Err(ServerBuildError::InvalidConfig { reason: "accept_loops must be at least 1".into() });
        }
        if config.backlog <= 0 {
            return Err(ServerBuildError::InvalidConfig { reason: "backlog must be positive".into() });
        }
        if config.tls.is_some() {
            warn!("tls settings are not applied by the server, terminate tls in front of it");
        }

        let router = self.router.ok_or(ServerBuildError::MissingRouter)?.cache_capacity(config.route_cache_capacity).build()?;
        Ok(Server { config, router: Arc::new(router), token: CancellationToken::new() })
    }
}

#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
    token: CancellationToken,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The root token. Cancelling it stops the accept loops and every open connection.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn start(&self) -> io::Result<()> {
        let listener = self.bind()?;
        info!(address = %self.config.address, accept_loops = self.config.accept_loops, "start listening");
        self.serve(listener).await;
        Ok(())
    }

    /// Serves connections accepted from `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) {
        let date = DateService::start();
        let shared = Arc::new(Shared {
            router: Arc::clone(&self.router),
            interner: Arc::new(ByteInterner::new(
                self.config.connection.intern_max_len,
                self.config.connection.intern_capacity,
            )),
            pool: ContextPool::new(self.config.context_pool_size),
            date: date.handle(),
            config: self.config.connection.clone(),
        });

        let listener = Arc::new(listener);
        let backoff = Duration::from_millis(self.config.accept_backoff_ms);
        let mut loops = JoinSet::new();
        for loop_id in 0..self.config.accept_loops {
            loops.spawn(accept_loop(loop_id, Arc::clone(&listener), Arc::clone(&shared), self.token.clone(), backoff));
        }

        while let Some(result) = loops.join_next().await {
            if let Err(e) = result {
                error!(cause = %e, "accept loop aborted");
            }
        }
        info!("server stopped");
    }

    fn bind(&self) -> io::Result<TcpListener> {
        let address = self.config.address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
        if address.is_ipv6() {
            // accept IPv4 clients as mapped addresses as well
            socket.set_only_v6(false)?;
        }
        socket.set_reuse_address(true)?;
        if let Some(secs) = self.config.tcp_keepalive_secs {
            socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(secs)))?;
        }
        socket.set_nonblocking(true)?;
        socket.bind(&address.into())?;
        socket.listen(self.config.backlog)?;
        TcpListener::from_std(socket.into())
    }
}

/// What every connection task shares.
struct Shared {
    router: Arc<Router>,
    interner: Arc<ByteInterner>,
    pool: Arc<ContextPool<RequestContext>>,
    date: DateHandle,
    config: ConnectionConfig,
}

async fn accept_loop(
    loop_id: usize,
    listener: Arc<TcpListener>,
    shared: Arc<Shared>,
    token: CancellationToken,
    backoff: Duration,
) {
    loop {
        let accepted = select! {
            biased;
            () = token.cancelled() => {
                debug!(loop_id, "accept loop stopped");
                return;
            }
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(serve_connection(stream, peer, Arc::clone(&shared), token.child_token()));
            }
            Err(e) => {
                warn!(loop_id, cause = %e, "failed to accept");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, shared: Arc<Shared>, token: CancellationToken) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, cause = %e, "failed to disable nagle");
    }

    let (reader, writer) = stream.into_split();
    let connection = HttpConnection::new(reader, writer, &shared.config, Arc::clone(&shared.interner), shared.date.clone());
    let mut ctx = shared.pool.take();

    match connection.process(&mut *ctx, shared.router.as_ref(), &token).await {
        Ok(()) => info!(%peer, "connection finished"),
        Err(HttpError::Cancelled) => info!(%peer, "connection cancelled"),
        Err(e) if e.is_disconnect() => info!(%peer, cause = %e, "peer went away"),
        Err(e) => error!(%peer, cause = %e, "connection failed"),
    }
}
