//! Cancellation and SIGINT handling
//!
//! The dispatch loop polls a [`CancelToken`] once per iteration. Cancelling
//! also pings the event loop so a blocked dispatch returns promptly.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use calloop::ping::Ping;
use log::{info, warn};

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    waker: Mutex<Option<Ping>>,
}

/// Shared flag telling the dispatch loop to stop
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns false if it was already requested.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.cancelled.swap(true, Ordering::SeqCst);
        if let Ok(waker) = self.inner.waker.lock() {
            if let Some(ping) = waker.as_ref() {
                ping.ping();
            }
        }
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Wake `ping` whenever the token is cancelled
    pub fn set_waker(&self, ping: Ping) {
        if let Ok(mut waker) = self.inner.waker.lock() {
            *waker = Some(ping);
        }
    }

    /// Stop waking the event loop
    pub fn clear_waker(&self) {
        if let Ok(mut waker) = self.inner.waker.lock() {
            waker.take();
        }
    }
}

/// Cancel `token` on the first SIGINT. A second SIGINT exits immediately.
pub fn install_interrupt_handler(token: CancelToken) -> Result<()> {
    ctrlc::set_handler(move || {
        if token.cancel() {
            info!("Interrupt received, shutting down");
        } else {
            warn!("Second interrupt, exiting immediately");
            std::process::exit(130);
        }
    })
    .context("Failed to install SIGINT handler")
}
