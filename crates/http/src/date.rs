//! Cached value of the `Date` response header.
//!
//! Formatting an IMF-fixdate on every response is wasted work: the value only changes once
//! per second. [`DateService`] refreshes a shared buffer from a background task and every
//! connection reads it through a cheap [`DateHandle`].

use arc_swap::ArcSwap;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

const UPDATE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct DateService {
    current: Arc<ArcSwap<Bytes>>,
    handle: JoinHandle<()>,
}

impl DateService {
    /// Starts the refresh task on the current tokio runtime.
    pub fn start() -> Self {
        Self::with_update_interval(UPDATE_INTERVAL)
    }

    pub fn with_update_interval(update_interval: Duration) -> Self {
        let current = Arc::new(ArcSwap::from_pointee(format_now()));
        let current_arc = Arc::clone(&current);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(update_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                current_arc.store(Arc::new(format_now()));
                trace!("refreshed date header");
            }
        });

        DateService { current, handle }
    }

    pub fn handle(&self) -> DateHandle {
        DateHandle { current: Arc::clone(&self.current) }
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read side of the cached date.
#[derive(Debug, Clone)]
pub struct DateHandle {
    current: Arc<ArcSwap<Bytes>>,
}

impl DateHandle {
    /// A handle formatted once and never refreshed, for use outside a runtime.
    pub fn fixed() -> Self {
        Self { current: Arc::new(ArcSwap::from_pointee(format_now())) }
    }

    pub fn load(&self) -> Bytes {
        self.current.load().as_ref().clone()
    }

    pub(crate) fn write_to(&self, dst: &mut BytesMut) {
        dst.put_slice(&self.current.load());
    }
}

fn format_now() -> Bytes {
    let mut buf = faf_http_date::get_date_buff_no_key();
    faf_http_date::get_date_no_key(&mut buf);
    Bytes::from_owner(buf)
}
