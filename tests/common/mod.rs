//! In-process mock compositor for integration tests
//!
//! A `wayland-server` display runs on its own thread and talks to the client
//! under test over a `UnixStream` pair. It implements just enough of
//! `wl_compositor`, `wl_shm` and `xdg_wm_base` to walk a client through
//! bootstrap, window creation and frame pacing, and records what it saw in
//! [`Observed`].

#![allow(dead_code)]

use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use wayland_client::Connection;
use wayland_protocols::xdg::shell::server::{xdg_surface, xdg_toplevel, xdg_wm_base};
use wayland_server::{
    backend::ClientData,
    protocol::{
        wl_buffer, wl_callback, wl_compositor, wl_region, wl_shm, wl_shm_pool, wl_surface,
    },
    Client, DataInit, Dispatch, Display, DisplayHandle, GlobalDispatch, New,
};

pub use wayland_server::protocol::wl_shm::Format as ServerFormat;

/// Serial of the ping sent when `xdg_wm_base` is bound
pub const PING_SERIAL: u32 = 42;

/// What the mock compositor advertises and how it reacts
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Advertise `wl_shm`
    pub shm: bool,
    /// Formats sent when `wl_shm` is bound
    pub formats: Vec<wl_shm::Format>,
    /// Fire pending frame callbacks on every commit
    pub frame_callbacks: bool,
    /// Release the previously shown buffer when a new one is committed
    pub release_buffers: bool,
    /// Send `xdg_toplevel.close` together with the first configure
    pub close_on_configure: bool,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            shm: true,
            formats: vec![wl_shm::Format::Argb8888, wl_shm::Format::Xrgb8888],
            frame_callbacks: false,
            release_buffers: true,
            close_on_configure: false,
        }
    }
}

/// Requests seen by the compositor
#[derive(Debug, Default)]
pub struct Observed {
    pub pongs: Mutex<Vec<u32>>,
    pub title: Mutex<Option<String>>,
    pub app_id: Mutex<Option<String>>,
    pub maximized: AtomicUsize,
    pub region_rects: Mutex<Vec<(i32, i32, i32, i32)>>,
    pub input_region_set: AtomicBool,
    pub configure_acks: AtomicUsize,
    pub commits: AtomicUsize,
    pub buffer_commits: AtomicUsize,
    pub buffers_created: AtomicUsize,
    pub buffers_destroyed: AtomicUsize,
    pub busy_attaches: AtomicUsize,
    pub surfaces_destroyed: AtomicUsize,
    pub toplevels_destroyed: AtomicUsize,
}

impl Observed {
    /// Poll `condition` until it holds or `timeout` elapses
    pub fn wait_for(&self, timeout: Duration, condition: impl Fn(&Observed) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition(self) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition(self)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Handle to a running mock compositor. Dropping it stops the server and
/// closes the client's socket.
pub struct MockCompositor {
    pub observed: Arc<Observed>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MockCompositor {
    /// Start a compositor and return a client connection to it
    pub fn start(options: MockOptions) -> (Self, Connection) {
        let (client_end, server_end) = UnixStream::pair().expect("socket pair");
        let observed = Arc::new(Observed::default());
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let observed = observed.clone();
            let stop = stop.clone();
            thread::spawn(move || serve(server_end, options, observed, stop))
        };

        let conn = Connection::from_socket(client_end).expect("client connection");
        (
            Self {
                observed,
                stop,
                thread: Some(thread),
            },
            conn,
        )
    }

    /// Stop serving and drop the display
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MockCompositor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn serve(stream: UnixStream, options: MockOptions, observed: Arc<Observed>, stop: Arc<AtomicBool>) {
    let mut display: Display<MockState> = Display::new().expect("create display");
    let mut dh = display.handle();

    dh.create_global::<MockState, wl_compositor::WlCompositor, _>(4, ());
    if options.shm {
        dh.create_global::<MockState, wl_shm::WlShm, _>(1, ());
    }
    dh.create_global::<MockState, xdg_wm_base::XdgWmBase, _>(3, ());

    dh.insert_client(stream, Arc::new(MockClient))
        .expect("insert client");

    let mut state = MockState {
        options,
        observed,
        attached: None,
        held: Vec::new(),
        frames: Vec::new(),
        serial: 0,
    };

    while !stop.load(Ordering::SeqCst) {
        let _ = display.dispatch_clients(&mut state);
        let _ = display.flush_clients();
        thread::sleep(Duration::from_millis(1));
    }
}

struct MockClient;
impl ClientData for MockClient {}

struct MockState {
    options: MockOptions,
    observed: Arc<Observed>,
    /// Buffer attached since the last commit
    attached: Option<wl_buffer::WlBuffer>,
    /// Committed buffers not yet released
    held: Vec<wl_buffer::WlBuffer>,
    frames: Vec<wl_callback::WlCallback>,
    serial: u32,
}

impl MockState {
    fn next_serial(&mut self) -> u32 {
        self.serial += 1;
        self.serial
    }

    fn commit(&mut self) {
        self.observed.commits.fetch_add(1, Ordering::SeqCst);

        if let Some(buffer) = self.attached.take() {
            self.observed.buffer_commits.fetch_add(1, Ordering::SeqCst);
            if self.options.release_buffers {
                for previous in self.held.drain(..) {
                    if previous != buffer {
                        previous.release();
                    }
                }
            }
            self.held.push(buffer);
        }

        if self.options.frame_callbacks {
            for callback in self.frames.drain(..) {
                callback.done(0);
            }
        }
    }
}

impl GlobalDispatch<wl_compositor::WlCompositor, ()> for MockState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        data_init.init(resource, ());
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for MockState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_compositor::WlCompositor,
        request: wl_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_compositor::Request::CreateSurface { id } => {
                data_init.init(id, ());
            }
            wl_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_surface::WlSurface,
        request: wl_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            wl_surface::Request::Attach { buffer, .. } => {
                if let Some(buffer) = &buffer {
                    if state.held.contains(buffer) {
                        state.observed.busy_attaches.fetch_add(1, Ordering::SeqCst);
                    }
                }
                state.attached = buffer;
            }
            wl_surface::Request::Frame { callback } => {
                let callback = data_init.init(callback, ());
                state.frames.push(callback);
            }
            wl_surface::Request::SetInputRegion { region } => {
                state
                    .observed
                    .input_region_set
                    .store(region.is_some(), Ordering::SeqCst);
            }
            wl_surface::Request::Commit => state.commit(),
            wl_surface::Request::Destroy => {
                state.observed.surfaces_destroyed.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_region::WlRegion, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_region::WlRegion,
        request: wl_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_region::Request::Add {
            x,
            y,
            width,
            height,
        } = request
        {
            state
                .observed
                .region_rects
                .lock()
                .unwrap()
                .push((x, y, width, height));
        }
    }
}

impl Dispatch<wl_callback::WlCallback, ()> for MockState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_callback::WlCallback,
        _request: wl_callback::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl GlobalDispatch<wl_shm::WlShm, ()> for MockState {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<wl_shm::WlShm>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let shm = data_init.init(resource, ());
        for format in &state.options.formats {
            shm.format(*format);
        }
    }
}

impl Dispatch<wl_shm::WlShm, ()> for MockState {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &wl_shm::WlShm,
        request: wl_shm::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm::Request::CreatePool { id, .. } = request {
            data_init.init(id, ());
        }
    }
}

impl Dispatch<wl_shm_pool::WlShmPool, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &wl_shm_pool::WlShmPool,
        request: wl_shm_pool::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_shm_pool::Request::CreateBuffer { id, .. } = request {
            data_init.init(id, ());
            state.observed.buffers_created.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &wl_buffer::WlBuffer,
        request: wl_buffer::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        if let wl_buffer::Request::Destroy = request {
            state.held.retain(|held| held != resource);
            state.observed.buffers_destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl GlobalDispatch<xdg_wm_base::XdgWmBase, ()> for MockState {
    fn bind(
        _state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<xdg_wm_base::XdgWmBase>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let wm_base = data_init.init(resource, ());
        wm_base.ping(PING_SERIAL);
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_wm_base::XdgWmBase,
        request: xdg_wm_base::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_wm_base::Request::GetXdgSurface { id, .. } => {
                data_init.init(id, ());
            }
            xdg_wm_base::Request::Pong { serial } => {
                state.observed.pongs.lock().unwrap().push(serial);
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        resource: &xdg_surface::XdgSurface,
        request: xdg_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_surface::Request::GetToplevel { id } => {
                let toplevel = data_init.init(id, ());
                toplevel.configure(0, 0, Vec::new());
                resource.configure(state.next_serial());
                if state.options.close_on_configure {
                    toplevel.close();
                }
            }
            xdg_surface::Request::AckConfigure { .. } => {
                state.observed.configure_acks.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for MockState {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &xdg_toplevel::XdgToplevel,
        request: xdg_toplevel::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            xdg_toplevel::Request::SetTitle { title } => {
                *state.observed.title.lock().unwrap() = Some(title);
            }
            xdg_toplevel::Request::SetAppId { app_id } => {
                *state.observed.app_id.lock().unwrap() = Some(app_id);
            }
            xdg_toplevel::Request::SetMaximized => {
                state.observed.maximized.fetch_add(1, Ordering::SeqCst);
            }
            xdg_toplevel::Request::Destroy => {
                state
                    .observed
                    .toplevels_destroyed
                    .fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        }
    }
}
