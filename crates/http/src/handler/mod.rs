//! The contract between the connection engine and whatever produces responses.
//!
//! The engine owns the context; a handler borrows it mutably for one request, reads the
//! parsed [`Request`](crate::protocol::Request) and fills in the
//! [`Response`](crate::protocol::Response). Returning an error (or panicking) is a handler
//! fault: the engine logs it and closes the connection without writing a response. Turning
//! faults into `500` responses is the job of an error handling middleware.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::protocol::{HandlerError, HttpContext};

#[async_trait]
pub trait Handler<C: HttpContext>: Send + Sync {
    async fn call(&self, ctx: &mut C) -> Result<(), HandlerError>;
}

#[async_trait]
impl<C: HttpContext, H: Handler<C> + ?Sized> Handler<C> for Arc<H> {
    async fn call(&self, ctx: &mut C) -> Result<(), HandlerError> {
        (**self).call(ctx).await
    }
}

#[async_trait]
impl<C: HttpContext, H: Handler<C> + ?Sized> Handler<C> for Box<H> {
    async fn call(&self, ctx: &mut C) -> Result<(), HandlerError> {
        (**self).call(ctx).await
    }
}

/// A [`Handler`] backed by a closure, see [`make_handler`].
#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<C, F> Handler<C> for HandlerFn<F>
where
    C: HttpContext,
    F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), HandlerError>> + Send + Sync,
{
    async fn call(&self, ctx: &mut C) -> Result<(), HandlerError> {
        (self.f)(ctx).await
    }
}

/// Wraps a closure returning a boxed future as a [`Handler`].
///
/// ```
/// use futures::FutureExt;
/// use keel_http::handler::make_handler;
/// use keel_http::protocol::{HttpContext, RequestContext};
///
/// let handler = make_handler(|ctx: &mut RequestContext| {
///     async move {
///         ctx.response_mut().text("hello");
///         Ok(())
///     }
///     .boxed()
/// });
/// # let _ = handler;
/// ```
pub fn make_handler<C, F>(f: F) -> HandlerFn<F>
where
    C: HttpContext,
    F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, Result<(), HandlerError>> + Send + Sync,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestContext;
    use futures::FutureExt;
    use http::StatusCode;

    #[tokio::test]
    async fn closure_handler_fills_response() {
        let handler = Arc::new(make_handler(|ctx: &mut RequestContext| {
            async move {
                ctx.response_mut().set_status(StatusCode::ACCEPTED);
                Ok(())
            }
            .boxed()
        }));

        let mut ctx = RequestContext::new();
        handler.call(&mut ctx).await.unwrap();
        assert_eq!(ctx.response().status(), StatusCode::ACCEPTED);
    }
}
