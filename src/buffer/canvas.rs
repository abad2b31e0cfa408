//! Bounds-checked view over 32-bit pixel memory
//!
//! Pixels are stored the way `wl_shm` expects the `*RGB8888` formats: one
//! little-endian `u32` per pixel, `0xAARRGGBB`, rows packed with a stride of
//! `width * 4`.

/// Bytes per pixel for every format this client uses
pub const BYTES_PER_PIXEL: usize = 4;

/// Mutable pixel view over a buffer of exactly `width * height * 4` bytes
#[derive(Debug)]
pub struct Canvas<'a> {
    bytes: &'a mut [u8],
    width: u32,
    height: u32,
}

impl<'a> Canvas<'a> {
    /// Wrap `bytes`, returning `None` when its length does not match the
    /// dimensions.
    pub fn new(bytes: &'a mut [u8], width: u32, height: u32) -> Option<Self> {
        let expected = byte_len(width, height)?;
        if bytes.len() != expected {
            return None;
        }
        Some(Self {
            bytes,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of bytes in one row
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Raw pixel bytes
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Set every pixel to `argb`
    pub fn fill(&mut self, argb: u32) {
        fill_pixels(self.bytes, argb);
    }

    /// Write one pixel; out-of-range coordinates are ignored and return false
    pub fn put(&mut self, x: u32, y: u32, argb: u32) -> bool {
        match self.offset(x, y) {
            Some(at) => {
                self.bytes[at..at + BYTES_PER_PIXEL].copy_from_slice(&argb.to_le_bytes());
                true
            }
            None => false,
        }
    }

    /// Read one pixel
    pub fn get(&self, x: u32, y: u32) -> Option<u32> {
        let at = self.offset(x, y)?;
        let mut px = [0u8; BYTES_PER_PIXEL];
        px.copy_from_slice(&self.bytes[at..at + BYTES_PER_PIXEL]);
        Some(u32::from_le_bytes(px))
    }

    /// Mutable bytes of row `y`
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.height {
            return None;
        }
        let stride = self.stride();
        let start = y as usize * stride;
        Some(&mut self.bytes[start..start + stride])
    }

    /// True when every pixel equals `argb`
    pub fn is_filled_with(&self, argb: u32) -> bool {
        let px = argb.to_le_bytes();
        self.bytes.chunks_exact(BYTES_PER_PIXEL).all(|c| c == px)
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.stride() + x as usize * BYTES_PER_PIXEL)
    }
}

/// Byte length of a `width x height` buffer, `None` on overflow
pub fn byte_len(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(BYTES_PER_PIXEL)
}

/// Fill raw pixel memory with a repeated `argb` value
pub fn fill_pixels(bytes: &mut [u8], argb: u32) {
    let px = argb.to_le_bytes();
    for chunk in bytes.chunks_exact_mut(BYTES_PER_PIXEL) {
        chunk.copy_from_slice(&px);
    }
}
