//! Client state and the main dispatch loop
//!
//! [`ClientState`] is the single state object every Wayland event is
//! dispatched to. Each component implements `Dispatch` for the objects it
//! owns; this module ties them together and runs the loop until the session
//! is cancelled, closed by the compositor or the connection drops.

use std::time::Duration;

use calloop::{ping::make_ping, EventLoop};
use calloop_wayland_source::WaylandSource;
use log::{debug, error, info, warn};
use wayland_client::{protocol::wl_callback, Connection, EventQueue};

use crate::display::{Display, Globals};
use crate::error::{ClientError, Result};
use crate::image::PixelSource;
use crate::signal::CancelToken;
use crate::window::{Window, WindowOptions};

/// Why the dispatch loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The cancel token was triggered (SIGINT)
    Interrupted,
    /// The compositor sent `xdg_toplevel.close`
    CloseRequested,
    /// Reading from or dispatching the connection failed
    ConnectionLost,
}

/// State shared by every event handler
pub struct ClientState {
    pub(crate) globals: Globals,
    pub(crate) window: Option<Window>,
    source: Box<dyn PixelSource>,
    fatal: Option<ClientError>,
    close_requested: bool,
}

impl ClientState {
    pub fn new(source: Box<dyn PixelSource>) -> Self {
        Self {
            globals: Globals::default(),
            window: None,
            source,
            fatal: None,
            close_requested: false,
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_ref()
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Create the window, wait for its first configure and paint the first
    /// frame
    pub fn open_window(&mut self, display: &mut Display, options: &WindowOptions) -> Result<()> {
        let window = Window::create(&self.globals, display.queue_handle(), options)?;
        self.window = Some(window);

        while !self.window.as_ref().map_or(true, Window::is_configured) {
            display.queue_mut().blocking_dispatch(self)?;
            if self.close_requested {
                return Ok(());
            }
        }

        if let Some(window) = self.window.as_mut() {
            window.repaint(self.source.as_mut(), None)?;
        }
        Ok(())
    }

    /// Frame callback fired: paint the next frame
    pub(crate) fn frame_done(&mut self, callback: wl_callback::WlCallback) {
        if self.fatal.is_some() {
            return;
        }
        let Some(window) = self.window.as_mut() else {
            return;
        };
        if let Err(e) = window.repaint(self.source.as_mut(), Some(callback)) {
            error!("{}", e);
            self.fatal = Some(e);
        }
    }

    pub(crate) fn release_buffer(&mut self, slot: usize) {
        if let Some(window) = self.window.as_mut() {
            window.release_buffer(slot);
        }
    }

    pub(crate) fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Runtime error raised inside an event handler, if any
    pub fn take_fatal(&mut self) -> Option<ClientError> {
        self.fatal.take()
    }

    /// Destroy the window, if one exists. Returns whether one did.
    pub fn destroy_window(&mut self) -> bool {
        match self.window.take() {
            Some(window) => {
                window.destroy();
                true
            }
            None => false,
        }
    }

    /// Destroy the window, then the connection's globals
    pub fn teardown(&mut self, conn: &Connection) {
        self.destroy_window();
        Display::disconnect(conn, &mut self.globals);
    }
}

/// Dispatch events until the session ends, then tear down the window and
/// the connection.
pub fn run(display: Display, state: &mut ClientState, cancel: &CancelToken) -> Result<Shutdown> {
    let (conn, queue) = display.into_parts();
    let outcome = dispatch_loop(&conn, queue, state, cancel);

    let frames = state.window().map_or(0, Window::frames_presented);
    state.teardown(&conn);
    info!("shmview exiting after {} frames", frames);

    outcome
}

fn dispatch_loop(
    conn: &Connection,
    queue: EventQueue<ClientState>,
    state: &mut ClientState,
    cancel: &CancelToken,
) -> Result<Shutdown> {
    let mut event_loop: EventLoop<ClientState> = EventLoop::try_new()?;
    let handle = event_loop.handle();

    let (ping, ping_source) = make_ping().map_err(calloop::Error::from)?;
    handle
        .insert_source(ping_source, |_, _, _| {})
        .map_err(|e| ClientError::EventLoop(e.error))?;
    WaylandSource::new(conn.clone(), queue)
        .insert(handle)
        .map_err(|e| ClientError::EventLoop(e.error))?;
    cancel.set_waker(ping);

    let outcome = loop {
        if cancel.is_cancelled() {
            break Ok(Shutdown::Interrupted);
        }
        if state.close_requested() {
            break Ok(Shutdown::CloseRequested);
        }
        if let Err(e) = event_loop.dispatch(None::<Duration>, state) {
            warn!("Wayland connection lost: {}", e);
            break Ok(Shutdown::ConnectionLost);
        }
        if let Some(err) = state.take_fatal() {
            break Err(err);
        }
    };

    cancel.clear_waker();
    debug!("dispatch loop finished: {:?}", outcome);
    outcome
}
