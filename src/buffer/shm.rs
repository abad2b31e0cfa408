//! Shared-memory pixel buffers
//!
//! A [`ShmBuffer`] owns an anonymous file mapping and the `wl_buffer` that
//! exposes it to the compositor. The file descriptor is closed as soon as the
//! buffer is registered; the mapping lives until the buffer is dropped, which
//! also destroys the protocol object.

use std::fs::File;
use std::io;
use std::os::fd::AsFd;

use log::debug;
use memmap2::MmapMut;
use wayland_client::{
    delegate_noop,
    protocol::{wl_buffer, wl_shm, wl_shm_pool},
    Connection, Dispatch, QueueHandle,
};

use super::canvas::{self, Canvas, BYTES_PER_PIXEL};
use crate::client::ClientState;
use crate::error::{ClientError, Result};

/// Create an unlinked file of `size` bytes suitable for sharing with the
/// compositor
#[cfg(target_os = "linux")]
pub fn create_anonymous_file(size: u64) -> io::Result<File> {
    use std::ffi::CString;
    use std::os::fd::FromRawFd;

    let name = CString::new("shmview-buffer")
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let fd = unsafe { libc::memfd_create(name.as_ptr(), libc::MFD_CLOEXEC) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    let file = unsafe { File::from_raw_fd(fd) };
    file.set_len(size)?;
    Ok(file)
}

#[cfg(not(target_os = "linux"))]
pub fn create_anonymous_file(size: u64) -> io::Result<File> {
    let file = tempfile::tempfile()?;
    file.set_len(size)?;
    Ok(file)
}

/// Mapped shared memory registered with the compositor as a `wl_buffer`
#[derive(Debug)]
pub struct ShmBuffer {
    buffer: wl_buffer::WlBuffer,
    map: MmapMut,
    width: u32,
    height: u32,
}

impl ShmBuffer {
    /// Allocate a `width x height` buffer of `format` for pool slot `slot`,
    /// pre-filled with `fill`.
    pub fn allocate(
        shm: &wl_shm::WlShm,
        qh: &QueueHandle<ClientState>,
        width: u32,
        height: u32,
        format: wl_shm::Format,
        fill: u32,
        slot: usize,
    ) -> Result<Self> {
        let invalid = || ClientError::InvalidSize { width, height };
        let size = canvas::byte_len(width, height).ok_or_else(invalid)?;
        let stride = width as usize * BYTES_PER_PIXEL;
        let wire_size = i32::try_from(size).map_err(|_| invalid())?;
        let wire_stride = i32::try_from(stride).map_err(|_| invalid())?;
        if size == 0 {
            return Err(invalid());
        }

        let file = create_anonymous_file(size as u64)
            .map_err(|source| ClientError::ShmFile { size, source })?;
        let mut map = unsafe { MmapMut::map_mut(&file) }.map_err(ClientError::Map)?;

        let pool = shm.create_pool(file.as_fd(), wire_size, qh, ());
        let buffer = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            wire_stride,
            format,
            qh,
            slot,
        );
        pool.destroy();
        drop(file);

        // Paint the padding so undrawn pixels are never garbage
        canvas::fill_pixels(&mut map, fill);

        debug!(
            "allocated shm buffer slot={} {}x{} {:?} ({} B)",
            slot, width, height, format, size
        );

        Ok(Self {
            buffer,
            map,
            width,
            height,
        })
    }

    pub fn wl_buffer(&self) -> &wl_buffer::WlBuffer {
        &self.buffer
    }

    /// Pixel view over the mapped memory
    pub fn canvas(&mut self) -> Option<Canvas<'_>> {
        Canvas::new(&mut self.map[..], self.width, self.height)
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

impl Dispatch<wl_buffer::WlBuffer, usize> for ClientState {
    fn event(
        state: &mut Self,
        _buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        slot: &usize,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            state.release_buffer(*slot);
        }
    }
}

delegate_noop!(ClientState: wl_shm_pool::WlShmPool);
