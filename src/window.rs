//! Window lifecycle
//!
//! A window is a `wl_surface` with an `xdg_toplevel` role, maximized with no
//! parent and an empty input region so pointer input passes through it. The
//! surface is also the [`Presenter`] the frame loop submits buffers to.

use log::{debug, info, trace};
use wayland_client::{
    delegate_noop,
    protocol::{wl_callback, wl_region, wl_shm, wl_surface},
    Connection, Dispatch, QueueHandle,
};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel};

use crate::buffer::{Canvas, ShmBuffer};
use crate::client::ClientState;
use crate::display::Globals;
use crate::error::Result;
use crate::frame::{FrameLoop, FrameState, Presenter};
use crate::image::PixelSource;

/// Parameters for creating a window
#[derive(Debug, Clone, PartialEq)]
pub struct WindowOptions {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub app_id: String,
    /// Preferred buffer format, negotiated against the announced formats
    pub format: wl_shm::Format,
    /// Opaque value fresh buffers are filled with
    pub fill: u32,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            title: "shmview".to_string(),
            app_id: "shmview".to_string(),
            format: wl_shm::Format::Argb8888,
            fill: 0xFFFFFFFF,
        }
    }
}

/// Protocol objects of an on-screen surface
#[derive(Debug)]
pub struct WaylandSurface {
    surface: wl_surface::WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
    shm: wl_shm::WlShm,
    qh: QueueHandle<ClientState>,
    width: u32,
    height: u32,
    format: wl_shm::Format,
    fill: u32,
}

impl WaylandSurface {
    /// Maximized with no parent. Repeated every frame in case the
    /// compositor reset the state.
    fn reassert_toplevel(&self) {
        self.toplevel.set_parent(None);
        self.toplevel.set_maximized();
    }
}

impl Presenter for WaylandSurface {
    type Buffer = ShmBuffer;
    type Token = wl_callback::WlCallback;

    fn allocate(&mut self, slot: usize) -> Result<ShmBuffer> {
        ShmBuffer::allocate(
            &self.shm,
            &self.qh,
            self.width,
            self.height,
            self.format,
            self.fill,
            slot,
        )
    }

    fn canvas(buffer: &mut ShmBuffer) -> Option<Canvas<'_>> {
        buffer.canvas()
    }

    fn present(&mut self, buffer: &ShmBuffer) -> wl_callback::WlCallback {
        self.surface.attach(Some(buffer.wl_buffer()), 0, 0);
        self.surface
            .damage(0, 0, self.width as i32, self.height as i32);
        self.reassert_toplevel();
        let callback = self.surface.frame(&self.qh, ());
        self.surface.commit();
        callback
    }
}

/// A top-level window and its double-buffered frame state
pub struct Window {
    surface: WaylandSurface,
    frames: FrameLoop<WaylandSurface>,
    configured: bool,
}

impl Window {
    /// Create the surface and its xdg-shell role objects.
    ///
    /// The surface is committed once without a buffer so the compositor
    /// sends the initial configure.
    pub fn create(
        globals: &Globals,
        qh: &QueueHandle<ClientState>,
        options: &WindowOptions,
    ) -> Result<Self> {
        let compositor = globals.compositor()?;
        let wm_base = globals.wm_base()?;
        let shm = globals.shm()?.clone();
        let format = globals.negotiate_format(options.format);

        let surface = compositor.create_surface(qh, ());
        let xdg_surface = wm_base.get_xdg_surface(&surface, qh, ());
        let toplevel = xdg_surface.get_toplevel(qh, ());
        toplevel.set_title(options.title.clone());
        toplevel.set_app_id(options.app_id.clone());
        toplevel.set_parent(None);
        toplevel.set_maximized();

        // Visual only: accept no pointer input
        let region = compositor.create_region(qh, ());
        region.add(0, 0, 0, 0);
        surface.set_input_region(Some(&region));
        region.destroy();

        surface.commit();

        info!(
            "Created {}x{} window ({:?} buffers)",
            options.width, options.height, format
        );

        Ok(Self {
            surface: WaylandSurface {
                surface,
                xdg_surface,
                toplevel,
                shm,
                qh: qh.clone(),
                width: options.width,
                height: options.height,
                format,
                fill: options.fill,
            },
            frames: FrameLoop::new(),
            configured: false,
        })
    }

    /// Paint and submit a frame; see [`FrameLoop::repaint`]
    pub fn repaint(
        &mut self,
        source: &mut dyn PixelSource,
        completed: Option<wl_callback::WlCallback>,
    ) -> Result<usize> {
        self.frames.repaint(&mut self.surface, source, completed)
    }

    /// Compositor released the buffer in `slot`
    pub fn release_buffer(&mut self, slot: usize) {
        trace!("buffer slot {} released", slot);
        self.frames.release(slot);
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn frame_state(&self) -> FrameState {
        self.frames.state()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames.presented()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface.width, self.surface.height)
    }

    /// Release the frame token, both buffers, the role objects and the
    /// surface, in that order. Safe on a window that never painted.
    pub fn destroy(mut self) {
        let (token, buffers) = self.frames.teardown();
        drop(token);
        let released = buffers.len();
        drop(buffers);

        self.surface.toplevel.destroy();
        self.surface.xdg_surface.destroy();
        self.surface.surface.destroy();

        debug!(
            "Window destroyed after {} frames ({} buffers released)",
            self.frames.presented(),
            released
        );
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for ClientState {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            if let Some(window) = state.window.as_mut() {
                window.configured = true;
            }
            trace!("acked configure {}", serial);
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for ClientState {
    fn event(
        state: &mut Self,
        _toplevel: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => {
                // Fixed-size buffers; the suggested size is only logged
                trace!("toplevel configure {}x{}", width, height);
            }
            xdg_toplevel::Event::Close => {
                info!("Compositor asked the window to close");
                state.request_close();
            }
            _ => {}
        }
    }
}

delegate_noop!(ClientState: ignore wl_surface::WlSurface);
delegate_noop!(ClientState: wl_region::WlRegion);
