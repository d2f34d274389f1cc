//! Reuse of per-request contexts across connections.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::protocol::HttpContext;

/// A bounded, lock-free pool of contexts.
///
/// [`ContextPool::take`] hands out a pooled context or a fresh one when the pool is empty.
/// The context goes back when the [`PooledContext`] guard drops, after being reset; if the
/// pool is full it is dropped instead. Ownership of the guard makes double returns and use
/// after return impossible.
pub struct ContextPool<C> {
    queue: ArrayQueue<C>,
}

impl<C: HttpContext> ContextPool<C> {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self { queue: ArrayQueue::new(capacity.max(1)) })
    }

    pub fn take(self: &Arc<Self>) -> PooledContext<C> {
        let ctx = self.queue.pop().unwrap_or_default();
        PooledContext { ctx, pool: Arc::clone(self) }
    }

    /// Number of idle contexts.
    pub fn idle(&self) -> usize {
        self.queue.len()
    }
}

impl<C> fmt::Debug for ContextPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool").field("idle", &self.queue.len()).field("capacity", &self.queue.capacity()).finish()
    }
}

pub struct PooledContext<C: HttpContext> {
    ctx: C,
    pool: Arc<ContextPool<C>>,
}

impl<C: HttpContext> Deref for PooledContext<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.ctx
    }
}

impl<C: HttpContext> DerefMut for PooledContext<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.ctx
    }
}

impl<C: HttpContext> Drop for PooledContext<C> {
    fn drop(&mut self) {
        // an empty default stays behind in the dropped guard
        let mut ctx = std::mem::take(&mut self.ctx);
        ctx.reset();
        let _ = self.pool.queue.push(ctx);
    }
}

impl<C: HttpContext> fmt::Debug for PooledContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledContext").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::RequestContext;
    use http::StatusCode;

    #[test]
    fn returned_context_is_reset() {
        let pool = ContextPool::<RequestContext>::new(2);
        {
            let mut ctx = pool.take();
            ctx.response_mut().set_status(StatusCode::NOT_FOUND);
        }
        assert_eq!(pool.idle(), 1);

        let ctx = pool.take();
        assert_eq!(ctx.response().status(), StatusCode::OK);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn full_pool_drops_extra_contexts() {
        let pool = ContextPool::<RequestContext>::new(1);
        let first = pool.take();
        let second = pool.take();
        drop(first);
        drop(second);
        assert_eq!(pool.idle(), 1);
    }
}
