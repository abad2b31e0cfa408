//! Configuration management for shmview
//!
//! Settings are read from a TOML file. Every section is optional and falls
//! back to the defaults below, which reproduce the classic behavior: a
//! 1920x1080 maximized window showing one PNG over an opaque white fill.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wayland_client::protocol::wl_shm;

use crate::window::WindowOptions;

/// Largest width or height accepted for the window buffers
pub const MAX_DIMENSION: u32 = 16384;

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShmviewConfig {
    /// Window geometry and identity
    #[serde(default)]
    pub window: WindowConfig,

    /// Image painted into every frame
    #[serde(default)]
    pub image: ImageConfig,

    /// Shared-memory buffer settings
    #[serde(default)]
    pub buffer: BufferConfig,

    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowConfig {
    /// Buffer width (pixels)
    pub width: u32,

    /// Buffer height (pixels)
    pub height: u32,

    /// Toplevel title
    #[serde(default = "WindowConfig::default_title")]
    pub title: String,

    /// Toplevel app id
    #[serde(default = "WindowConfig::default_app_id")]
    pub app_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageConfig {
    /// Absolute path of the PNG to display
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BufferConfig {
    /// ARGB value fresh buffers are filled with
    pub fill: u32,

    /// Pixel format: "argb8888" or "xrgb8888"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GeneralConfig {
    /// Enable debug logging
    pub debug: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            title: Self::default_title(),
            app_id: Self::default_app_id(),
        }
    }
}

impl WindowConfig {
    fn default_title() -> String {
        "shmview".to_string()
    }
    fn default_app_id() -> String {
        "shmview".to_string()
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/usr/share/shmview/image.png"),
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            fill: 0xFFFFFFFF,
            format: "argb8888".to_string(),
        }
    }
}

impl BufferConfig {
    /// Parsed pixel format
    pub fn shm_format(&self) -> Result<wl_shm::Format> {
        match self.format.to_ascii_lowercase().as_str() {
            "argb8888" => Ok(wl_shm::Format::Argb8888),
            "xrgb8888" => Ok(wl_shm::Format::Xrgb8888),
            other => anyhow::bail!("Invalid buffer format: {}", other),
        }
    }
}

impl ShmviewConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = expand_home(path.as_ref())?;

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ShmviewConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let (w, h) = (self.window.width, self.window.height);
        if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
            anyhow::bail!(
                "Invalid window size {}x{}: each side must be between 1 and {}",
                w,
                h,
                MAX_DIMENSION
            );
        }

        if !self.image.path.is_absolute() {
            anyhow::bail!(
                "Invalid image path {}: must be absolute",
                self.image.path.display()
            );
        }

        if self.buffer.fill >> 24 != 0xFF {
            anyhow::bail!(
                "Invalid fill {:#010x}: alpha must be 0xFF",
                self.buffer.fill
            );
        }

        self.buffer.shm_format()?;

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, contents).context("Failed to write configuration file")?;

        Ok(())
    }

    /// Window creation parameters derived from this configuration
    pub fn window_options(&self) -> Result<WindowOptions> {
        Ok(WindowOptions {
            width: self.window.width,
            height: self.window.height,
            title: self.window.title.clone(),
            app_id: self.window.app_id.clone(),
            format: self.buffer.shm_format()?,
            fill: self.buffer.fill,
        })
    }
}

/// Expand a leading `~` to `$HOME`
fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").context("Failed to get HOME environment variable")?;
            Ok(Path::new(&home).join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}
