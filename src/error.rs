//! Error types for the shmview client
//!
//! Every failure the protocol core can hit is a variant of [`ClientError`].
//! Startup failures (connection, globals, formats, window creation) and
//! runtime failures (buffer exhaustion, shm allocation) all end the session;
//! the split only matters for diagnostics.

use std::io;

use thiserror::Error;
use wayland_backend::client::WaylandError;
use wayland_client::{protocol::wl_shm, ConnectError, DispatchError};

/// Errors raised while talking to the compositor
#[derive(Debug, Error)]
pub enum ClientError {
    /// The Wayland socket could not be opened
    #[error("failed to connect to the Wayland compositor: {0}")]
    Connect(#[from] ConnectError),

    /// A required global was never announced by the registry
    #[error("No {0} global")]
    MissingGlobal(&'static str),

    /// The compositor does not support a required shm pixel format
    #[error("{0:?} shm format not available")]
    MissingFormat(wl_shm::Format),

    /// Reading or dispatching events failed
    #[error("dispatching Wayland events failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// Writing requests to the socket failed
    #[error("Wayland connection error: {0}")]
    Connection(#[from] WaylandError),

    /// The anonymous file backing a buffer could not be created
    #[error("creating a buffer file for {size} B failed: {source}")]
    ShmFile {
        size: usize,
        #[source]
        source: io::Error,
    },

    /// Mapping the buffer file into memory failed
    #[error("mmap failed: {0}")]
    Map(#[source] io::Error),

    /// Requested buffer dimensions do not fit the wire protocol
    #[error("invalid buffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// The very first buffer of the session could not be created
    #[error("Failed to create the first buffer: {0}")]
    FirstBuffer(#[source] Box<ClientError>),

    /// Both buffers are still held by the compositor at repaint time
    #[error("Both buffers busy at repaint. Server bug?")]
    BuffersBusy,

    /// The event loop could not be set up or polled
    #[error("event loop error: {0}")]
    EventLoop(#[from] calloop::Error),
}

impl ClientError {
    /// Whether this error can only happen before the first frame
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            ClientError::Connect(_)
                | ClientError::MissingGlobal(_)
                | ClientError::MissingFormat(_)
                | ClientError::InvalidSize { .. }
                | ClientError::FirstBuffer(_)
        )
    }

    /// Process exit code for a session that ended with this error
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Result alias for protocol operations
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_global_names_capability() {
        let err = ClientError::MissingGlobal("wl_shm");
        assert_eq!(err.to_string(), "No wl_shm global");
        assert!(err.is_startup());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_buffer_diagnostics_are_distinct() {
        let first = ClientError::FirstBuffer(Box::new(ClientError::InvalidSize {
            width: 0,
            height: 0,
        }));
        let busy = ClientError::BuffersBusy;

        assert!(first.to_string().starts_with("Failed to create the first buffer"));
        assert!(busy.to_string().contains("Both buffers busy"));
        assert!(first.is_startup());
        assert!(!busy.is_startup());
    }

    #[test]
    fn test_missing_format_message() {
        let err = ClientError::MissingFormat(wl_shm::Format::Xrgb8888);
        assert_eq!(err.to_string(), "Xrgb8888 shm format not available");
    }
}
