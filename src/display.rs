//! Connection bootstrap
//!
//! Connects to the compositor, binds the globals the client needs as the
//! registry announces them, and waits until the shm formats are known.
//!
//! Two roundtrips are needed. The first one guarantees every `global` event
//! for already-existing globals has been processed, which is where `wl_shm`
//! gets bound. The bind request is sent after the first sync, so the
//! `wl_shm.format` events it triggers are only guaranteed to have arrived
//! once a second sync completes.

use log::{debug, info, warn};
use wayland_client::{
    delegate_noop,
    protocol::{wl_compositor, wl_registry, wl_shm},
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum,
};
use wayland_protocols::xdg::shell::client::xdg_wm_base;

use crate::client::ClientState;
use crate::error::{ClientError, Result};

/// Format every compositor must support and this client requires
pub const REQUIRED_FORMAT: wl_shm::Format = wl_shm::Format::Xrgb8888;

const COMPOSITOR_VERSION: u32 = 1;
const SHM_VERSION: u32 = 1;

/// Globals bound from the registry
#[derive(Debug, Default)]
pub struct Globals {
    pub compositor: Option<wl_compositor::WlCompositor>,
    pub shm: Option<wl_shm::WlShm>,
    pub wm_base: Option<xdg_wm_base::XdgWmBase>,
    formats: Vec<wl_shm::Format>,
}

impl Globals {
    /// Whether the compositor announced `format`
    pub fn has_format(&self, format: wl_shm::Format) -> bool {
        self.formats.contains(&format)
    }

    /// Shm formats announced so far
    pub fn formats(&self) -> &[wl_shm::Format] {
        &self.formats
    }

    /// Buffer format to use: `preferred` when announced, otherwise the
    /// required format
    pub fn negotiate_format(&self, preferred: wl_shm::Format) -> wl_shm::Format {
        if self.has_format(preferred) {
            preferred
        } else {
            warn!(
                "{:?} not announced by the compositor, falling back to {:?}",
                preferred, REQUIRED_FORMAT
            );
            REQUIRED_FORMAT
        }
    }

    pub fn compositor(&self) -> Result<&wl_compositor::WlCompositor> {
        self.compositor
            .as_ref()
            .ok_or(ClientError::MissingGlobal("wl_compositor"))
    }

    pub fn shm(&self) -> Result<&wl_shm::WlShm> {
        self.shm.as_ref().ok_or(ClientError::MissingGlobal("wl_shm"))
    }

    pub fn wm_base(&self) -> Result<&xdg_wm_base::XdgWmBase> {
        self.wm_base
            .as_ref()
            .ok_or(ClientError::MissingGlobal("xdg_wm_base"))
    }

    /// Ensure the mandatory capabilities were announced
    pub fn check(&self) -> Result<()> {
        self.shm()?;
        if !self.has_format(REQUIRED_FORMAT) {
            return Err(ClientError::MissingFormat(REQUIRED_FORMAT));
        }
        Ok(())
    }
}

/// A bootstrapped connection and its event queue
pub struct Display {
    conn: Connection,
    queue: EventQueue<ClientState>,
    qh: QueueHandle<ClientState>,
}

impl Display {
    /// Connect using `WAYLAND_DISPLAY` / `WAYLAND_SOCKET` and bind globals
    pub fn connect(state: &mut ClientState) -> Result<Self> {
        let conn = Connection::connect_to_env()?;
        Self::bootstrap(conn, state)
    }

    /// Bind globals over an already established connection
    pub fn bootstrap(conn: Connection, state: &mut ClientState) -> Result<Self> {
        let mut queue = conn.new_event_queue();
        let qh = queue.handle();
        let _registry = conn.display().get_registry(&qh, ());

        queue.roundtrip(state)?;
        state.globals.shm()?;

        queue.roundtrip(state)?;
        state.globals.check()?;

        info!(
            "Connected to compositor; shm formats: {:?}",
            state.globals.formats()
        );

        Ok(Self { conn, queue, qh })
    }

    pub fn queue_handle(&self) -> &QueueHandle<ClientState> {
        &self.qh
    }

    pub fn queue_mut(&mut self) -> &mut EventQueue<ClientState> {
        &mut self.queue
    }

    /// Split into the parts the dispatch loop takes ownership of
    pub fn into_parts(self) -> (Connection, EventQueue<ClientState>) {
        (self.conn, self.queue)
    }

    /// Destroy bound globals and flush the connection
    pub fn disconnect(conn: &Connection, globals: &mut Globals) {
        if let Some(wm_base) = globals.wm_base.take() {
            wm_base.destroy();
        }
        // wl_shm v1 and wl_compositor have no destructor requests
        globals.shm = None;
        globals.compositor = None;
        if let Err(e) = conn.flush() {
            debug!("flush on disconnect failed: {}", e);
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for ClientState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        else {
            return;
        };

        let globals = &mut state.globals;
        if interface == wl_compositor::WlCompositor::interface().name {
            globals.compositor = Some(registry.bind(name, COMPOSITOR_VERSION, qh, ()));
        } else if interface == wl_shm::WlShm::interface().name {
            globals.shm = Some(registry.bind(name, SHM_VERSION, qh, ()));
        } else if interface == xdg_wm_base::XdgWmBase::interface().name {
            let version = version.min(xdg_wm_base::XdgWmBase::interface().version);
            globals.wm_base = Some(registry.bind(name, version, qh, ()));
        } else {
            return;
        }
        debug!("bound {} v{} (name {})", interface, version, name);
    }
}

impl Dispatch<wl_shm::WlShm, ()> for ClientState {
    fn event(
        state: &mut Self,
        _shm: &wl_shm::WlShm,
        event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format {
            format: WEnum::Value(format),
        } = event
        {
            state.globals.formats.push(format);
        }
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for ClientState {
    fn event(
        _state: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

delegate_noop!(ClientState: wl_compositor::WlCompositor);
