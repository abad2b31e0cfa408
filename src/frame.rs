//! Frame pacing
//!
//! Repaints are driven by the compositor: every submitted frame requests a
//! one-shot frame callback, and the next repaint happens when that callback
//! fires. [`FramePacer`] tracks the outstanding callback (at most one) and
//! [`FrameLoop`] runs the repaint transition over a double-buffered
//! [`BufferPool`].
//!
//! The protocol side is behind the [`Presenter`] trait so the state machine
//! can be exercised without a compositor.

use std::fmt;

use log::{debug, trace};
use wayland_client::{protocol::wl_callback, Connection, Dispatch, QueueHandle};

use crate::buffer::{BufferPool, Canvas, DOUBLE_BUFFERED};
use crate::client::ClientState;
use crate::error::{ClientError, Result};
use crate::image::PixelSource;

/// Pacing state of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// No frame callback outstanding, safe to request one
    Idle,
    /// A frame callback is outstanding
    WaitingForFrame,
}

/// Holds the single outstanding frame token
#[derive(Debug)]
pub struct FramePacer<T> {
    pending: Option<T>,
    requested: u64,
    completed: u64,
}

impl<T: PartialEq> FramePacer<T> {
    pub fn new() -> Self {
        Self {
            pending: None,
            requested: 0,
            completed: 0,
        }
    }

    pub fn state(&self) -> FrameState {
        if self.pending.is_some() {
            FrameState::WaitingForFrame
        } else {
            FrameState::Idle
        }
    }

    /// Consume `token` if it is the outstanding one. Stale tokens are ignored.
    pub fn complete(&mut self, token: &T) -> bool {
        if self.pending.as_ref() == Some(token) {
            self.pending = None;
            self.completed += 1;
            true
        } else {
            false
        }
    }

    /// Record a newly requested token, returning the one it supersedes
    pub fn arm(&mut self, token: T) -> Option<T> {
        self.requested += 1;
        self.pending.replace(token)
    }

    /// Drop the outstanding token, if any
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Frame tokens requested so far
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Frame tokens acknowledged by the compositor
    pub fn completed(&self) -> u64 {
        self.completed
    }
}

impl<T: PartialEq> Default for FramePacer<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Protocol operations a repaint needs from a surface
pub trait Presenter {
    /// Pixel buffer type held by the pool
    type Buffer;
    /// One-shot frame notification handle
    type Token: PartialEq + fmt::Debug;

    /// Allocate backing memory for pool slot `slot`
    fn allocate(&mut self, slot: usize) -> Result<Self::Buffer>;

    /// Pixel view over a buffer's memory
    fn canvas(buffer: &mut Self::Buffer) -> Option<Canvas<'_>>;

    /// Attach `buffer`, damage the whole surface, re-assert the toplevel
    /// state, request a frame token and commit
    fn present(&mut self, buffer: &Self::Buffer) -> Self::Token;
}

/// Double-buffered repaint state of one window
pub struct FrameLoop<P: Presenter> {
    pool: BufferPool<P::Buffer, DOUBLE_BUFFERED>,
    pacer: FramePacer<P::Token>,
    presented: u64,
}

impl<P: Presenter> FrameLoop<P> {
    pub fn new() -> Self {
        Self {
            pool: BufferPool::new(),
            pacer: FramePacer::new(),
            presented: 0,
        }
    }

    /// Paint and submit one frame.
    ///
    /// `completed` is the frame token whose notification triggered this
    /// repaint, or `None` for the initial frame. Returns the pool slot that
    /// was submitted.
    pub fn repaint(
        &mut self,
        presenter: &mut P,
        source: &mut dyn PixelSource,
        completed: Option<P::Token>,
    ) -> Result<usize> {
        if let Some(token) = completed {
            if !self.pacer.complete(&token) {
                trace!("ignoring stale frame token {:?}", token);
            }
        }

        let first_frame = self.presented == 0;
        let slot = match self.pool.acquire_with(|slot| presenter.allocate(slot)) {
            Ok(Some(slot)) => slot,
            Ok(None) => return Err(ClientError::BuffersBusy),
            Err(err) if first_frame => return Err(ClientError::FirstBuffer(Box::new(err))),
            Err(err) => return Err(err),
        };

        let buffer = self
            .pool
            .get_mut(slot)
            .ok_or(ClientError::BuffersBusy)?;
        match P::canvas(buffer) {
            Some(mut canvas) => source.paint(&mut canvas),
            None => debug!("buffer in slot {} has no pixel view, skipping paint", slot),
        }

        let token = presenter.present(buffer);
        if let Some(superseded) = self.pacer.arm(token) {
            trace!("frame token {:?} superseded by repaint", superseded);
        }
        self.pool.mark_busy(slot);
        self.presented += 1;

        trace!("presented frame {} from slot {}", self.presented, slot);
        Ok(slot)
    }

    /// Compositor released the buffer in `slot`
    pub fn release(&mut self, slot: usize) {
        if !self.pool.release(slot) {
            debug!("release for idle buffer slot {}", slot);
        }
    }

    pub fn state(&self) -> FrameState {
        self.pacer.state()
    }

    pub fn pacer(&self) -> &FramePacer<P::Token> {
        &self.pacer
    }

    pub fn pool(&self) -> &BufferPool<P::Buffer, DOUBLE_BUFFERED> {
        &self.pool
    }

    /// Frames submitted so far
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Drop the outstanding frame token and every buffer, in that order
    pub fn teardown(&mut self) -> (Option<P::Token>, Vec<P::Buffer>) {
        let token = self.pacer.cancel();
        let buffers = self.pool.drain();
        (token, buffers)
    }
}

impl<P: Presenter> Default for FrameLoop<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatch<wl_callback::WlCallback, ()> for ClientState {
    fn event(
        state: &mut Self,
        callback: &wl_callback::WlCallback,
        event: wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { callback_data } = event {
            trace!("frame done at {} ms", callback_data);
            state.frame_done(callback.clone());
        }
    }
}
