//! # shmview
//!
//! A minimal Wayland client that shows a PNG in a maximized, click-through
//! toplevel. Frames are painted into two shared-memory buffers and paced by
//! the compositor's frame callbacks.
//!
//! ## Architecture
//!
//! - `display`: connection bootstrap and global binding
//! - `window`: surface and xdg-shell role lifecycle
//! - `buffer`: double-buffer pool, shm buffers and pixel views
//! - `frame`: frame-callback pacing and the repaint transition
//! - `image`: PNG source painted into each frame
//! - `client`: dispatch state and the main loop
//! - `signal`: cancellation and SIGINT handling
//! - `config`: configuration parsing and validation
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shmview::{client, ClientState, CancelToken, Display, PngSource, WindowOptions};
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut state = ClientState::new(Box::new(PngSource::new("/usr/share/shmview/image.png")));
//!     let mut display = Display::connect(&mut state)?;
//!     state.open_window(&mut display, &WindowOptions::default())?;
//!     client::run(display, &mut state, &CancelToken::new())?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod frame;
pub mod image;
pub mod signal;
pub mod window;

// Re-export main types for easy access
pub use client::{ClientState, Shutdown};
pub use config::ShmviewConfig;
pub use display::Display;
pub use error::ClientError;
pub use image::PngSource;
pub use signal::CancelToken;
pub use window::{Window, WindowOptions};

/// Version information for shmview
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
