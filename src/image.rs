//! Image source for repaints
//!
//! [`PngSource`] decodes a PNG file once and copies it into every frame at
//! the origin. No scaling or cropping happens: pixels outside the image, or
//! image pixels outside the buffer, are left untouched. A file that cannot be
//! read or decoded leaves the buffer as it is and is retried on the next
//! frame.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use png::{ColorType, Transformations};

use crate::buffer::Canvas;

/// Something that can draw into a frame's pixel memory
pub trait PixelSource {
    fn paint(&mut self, canvas: &mut Canvas<'_>);
}

/// Decoded image in `0xAARRGGBB` pixels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl DecodedImage {
    /// Decode a PNG stream, normalizing every color type to 8-bit ARGB
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let mut decoder = png::Decoder::new(reader);
        decoder.set_transformations(Transformations::EXPAND | Transformations::STRIP_16);
        let mut reader = decoder.read_info().context("Failed to read PNG header")?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader
            .next_frame(&mut buf)
            .context("Failed to decode PNG image data")?;

        let channels = match frame.color_type {
            ColorType::Grayscale => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
            ColorType::Indexed => bail!("palette was not expanded"),
        };

        let (width, height) = (frame.width, frame.height);
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in buf[..frame.buffer_size()]
            .chunks(frame.line_size)
            .take(height as usize)
        {
            for px in row.chunks_exact(channels).take(width as usize) {
                pixels.push(match px {
                    &[g] => argb(0xff, g, g, g),
                    &[g, a] => argb(a, g, g, g),
                    &[r, g, b] => argb(0xff, r, g, b),
                    &[r, g, b, a] => argb(a, r, g, b),
                    _ => bail!("unexpected {}-byte pixel", px.len()),
                });
            }
        }

        if pixels.len() != width as usize * height as usize {
            bail!("PNG image data is truncated");
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Decode the PNG at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open file {}", path.display()))?;
        Self::decode(BufReader::new(file))
            .with_context(|| format!("Failed to decode {}", path.display()))
    }

    /// Copy the overlapping region into `canvas` at the origin
    pub fn blit(&self, canvas: &mut Canvas<'_>) {
        let cols = self.width.min(canvas.width()) as usize;
        let rows = self.height.min(canvas.height());

        for y in 0..rows {
            let start = y as usize * self.width as usize;
            let src = &self.pixels[start..start + cols];
            if let Some(dst) = canvas.row_mut(y) {
                for (out, px) in dst.chunks_exact_mut(4).zip(src) {
                    out.copy_from_slice(&px.to_le_bytes());
                }
            }
        }
    }
}

fn argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    u32::from(a) << 24 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b)
}

/// Paints a PNG file into every frame
#[derive(Debug)]
pub struct PngSource {
    path: PathBuf,
    image: Option<DecodedImage>,
    failures: u64,
}

impl PngSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            image: None,
            failures: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decoded image, loading it on first use
    pub fn image(&mut self) -> Option<&DecodedImage> {
        if self.image.is_none() {
            match DecodedImage::open(&self.path) {
                Ok(image) => {
                    info!(
                        "Loaded {} ({}x{})",
                        self.path.display(),
                        image.width,
                        image.height
                    );
                    self.image = Some(image);
                }
                Err(e) => {
                    if self.failures == 0 {
                        warn!("{:#}", e);
                    } else {
                        debug!("{:#}", e);
                    }
                    self.failures += 1;
                }
            }
        }
        self.image.as_ref()
    }

    /// Number of failed load attempts
    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl PixelSource for PngSource {
    fn paint(&mut self, canvas: &mut Canvas<'_>) {
        if let Some(image) = self.image() {
            image.blit(canvas);
        }
    }
}
