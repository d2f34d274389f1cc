//! A body of unknown length is sent with chunked framing, one chunk per second.
//!
//! ```text
//! curl -N http://127.0.0.1:8080/ticks
//! ```

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use http_body::Frame;
use http_body_util::StreamBody;
use keel_http::handler::make_handler;
use keel_http::protocol::{HttpContext, RequestContext, ResponseBody};
use keel_web::router::{Route, Router};
use keel_web::{Server, ServerConfig};
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

fn ticks() -> ResponseBody {
    let stream = futures::stream::unfold(0, |tick| async move {
        if tick == 5 {
            return None;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        let frame = Frame::data(Bytes::from(format!("tick {tick}\n")));
        Some((Ok::<_, Infallible>(frame), tick + 1))
    });
    ResponseBody::stream(StreamBody::new(stream))
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder()
        .route(Route::get(
            "/ticks",
            make_handler(|ctx: &mut RequestContext| {
                async move {
                    ctx.response_mut().set_body(ticks());
                    Ok(())
                }
                .boxed()
            }),
        ))
        .not_found(make_handler(|ctx: &mut RequestContext| {
            async move {
                ctx.response_mut().set_status(http::StatusCode::NOT_FOUND);
                Ok(())
            }
            .boxed()
        }));

    let config = ServerConfig { address: "127.0.0.1:8080".parse().unwrap(), ..ServerConfig::default() };
    let server = Server::builder().config(config).router(router).build().unwrap();
    if let Err(e) = server.start().await {
        error!(cause = %e, "server failed");
    }
}
