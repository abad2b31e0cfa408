//! # shmview
//!
//! Displays a PNG in a maximized, click-through Wayland window using two
//! shared-memory buffers and frame-callback pacing.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::{error, info};

use shmview::{
    client, signal, CancelToken, ClientError, ClientState, Display, PngSource, ShmviewConfig,
    Shutdown, WindowOptions,
};

#[derive(Parser)]
#[command(name = "shmview")]
#[command(about = "Show a PNG in a click-through Wayland window using shared memory buffers")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/shmview/shmview.toml")]
    config: String,

    /// PNG to display (overrides the configuration)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Buffer width in pixels
    #[arg(long)]
    width: Option<u32>,

    /// Buffer height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = load_config(&cli);

    // Initialize logging
    let filter = if cli.debug || loaded.config.general.debug {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    info!("🚀 Starting shmview");
    info!(
        "📄 Version: {} ({} built {} for {})",
        shmview::VERSION,
        option_env!("GIT_COMMIT").unwrap_or("unknown"),
        env!("BUILD_DATE"),
        env!("TARGET_TRIPLE")
    );

    let config = match apply_overrides(loaded, &cli) {
        Ok(config) => config,
        Err(e) => {
            report(&format!("Invalid settings: {:#}", e));
            return ExitCode::from(1);
        }
    };
    let options = match config.window_options() {
        Ok(options) => options,
        Err(e) => {
            report(&format!("Invalid settings: {:#}", e));
            return ExitCode::from(1);
        }
    };

    match run(&config, &options) {
        Ok(shutdown) => {
            info!("👋 shmview stopped ({:?})", shutdown);
            ExitCode::SUCCESS
        }
        Err(e) => {
            report(&failure_message(&e));
            ExitCode::from(e.exit_code())
        }
    }
}

/// Load the configuration file, falling back to defaults. Logging is not up
/// yet, so failures are remembered and reported by `apply_overrides`.
fn load_config(cli: &Cli) -> LoadedConfig {
    match ShmviewConfig::load(&cli.config) {
        Ok(config) => LoadedConfig {
            config,
            error: None,
        },
        Err(e) => LoadedConfig {
            config: ShmviewConfig::default(),
            error: Some(format!("{:#}", e)),
        },
    }
}

struct LoadedConfig {
    config: ShmviewConfig,
    error: Option<String>,
}

fn apply_overrides(loaded: LoadedConfig, cli: &Cli) -> Result<ShmviewConfig> {
    let mut config = match loaded.error {
        None => {
            info!("✅ Configuration loaded from: {}", cli.config);
            loaded.config
        }
        Some(e) => {
            error!("❌ Failed to load configuration: {}", e);
            info!("📝 Using default configuration");
            loaded.config
        }
    };

    // Override config with CLI flags
    if let Some(image) = &cli.image {
        config.image.path = image.clone();
    }
    if let Some(width) = cli.width {
        config.window.width = width;
    }
    if let Some(height) = cli.height {
        config.window.height = height;
    }
    if cli.debug {
        config.general.debug = true;
    }

    config.validate()?;
    Ok(config)
}

fn run(config: &ShmviewConfig, options: &WindowOptions) -> Result<Shutdown, ClientError> {
    info!("🖼️ Image: {}", config.image.path.display());
    let source = PngSource::new(&config.image.path);
    let mut state = ClientState::new(Box::new(source));

    let cancel = CancelToken::new();
    if let Err(e) = signal::install_interrupt_handler(cancel.clone()) {
        error!("Failed to install SIGINT handler: {:#}", e);
    }

    let mut display = Display::connect(&mut state)?;
    state.open_window(&mut display, options)?;
    info!("✅ Window ready, entering event loop");

    client::run(display, &mut state, &cancel)
}

fn failure_message(err: &ClientError) -> String {
    if err.is_startup() {
        format!("Startup failed: {}", err)
    } else {
        format!("Session failed: {}", err)
    }
}

/// Fatal diagnostic: logged and printed to stderr
fn report(message: &str) {
    error!("❌ {}", message);
    eprintln!("shmview: {}", message);
}
