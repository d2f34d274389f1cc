use futures::FutureExt;
use keel_http::protocol::{HttpContext, RequestContext};
use keel_web::router::{Route, Router};
use keel_web::{Server, ServerConfig};
use tracing::{Level, error};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let router = Router::builder()
        .route(Route::get(
            "/",
            keel_http::handler::make_handler(|ctx: &mut RequestContext| {
                async move {
                    ctx.response_mut().text("hello world");
                    Ok(())
                }
                .boxed()
            }),
        ))
        .not_found(keel_http::handler::make_handler(|ctx: &mut RequestContext| {
            async move {
                ctx.response_mut().set_status(http::StatusCode::NOT_FOUND).text("404 not found");
                Ok(())
            }
            .boxed()
        }));

    let config = ServerConfig { address: "127.0.0.1:3000".parse().unwrap(), ..ServerConfig::default() };
    let server = Server::builder().config(config).router(router).build().unwrap();
    if let Err(e) = server.start().await {
        error!(cause = %e, "server failed");
    }
}
