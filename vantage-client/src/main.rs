//! Vantage client entry point.
//!
//! ```text
//! vantage-client                    Stream using vantage-client.toml
//! vantage-client --config <path>    Load a custom config TOML
//! vantage-client --window <title>   Override the captured window
//! vantage-client --remote <addr>    Override the consumer address
//! vantage-client --gen-config       Write default config to stdout
//! ```
//!
//! Press Escape (or Ctrl-C) to stop.

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vantage_client::config::ClientConfig;
use vantage_core::stop::{DEFAULT_POLL_INTERVAL, spawn_watcher, stop_on_ctrl_c};
use vantage_core::templates::load_template;
use vantage_core::{
    CpuImageOps, EscapeKey, FrameSource, GdiCapturer, KeyHook, SendInputSink, StopSignal,
    StreamService, Templates, UdpTransport, key_channel,
};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "vantage-client",
    about = "Streams a game window's state and video over UDP and replays remote key state"
)]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "vantage-client.toml")]
    config: PathBuf,

    /// Title of the window to capture.
    #[arg(short, long)]
    window: Option<String>,

    /// Consumer address, e.g. 192.168.0.10:12345.
    #[arg(short, long)]
    remote: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        println!("{}", ClientConfig::default_toml()?);
        return Ok(());
    }

    let (mut config, origin) = ClientConfig::load(&cli.config);
    if let Some(window) = cli.window {
        config.capture.window_name = window;
    }
    if let Some(remote) = cli.remote {
        config.network.remote_addr = remote;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("vantage-client v{}", env!("CARGO_PKG_VERSION"));
    origin.log(&cli.config);
    info!("window: {:?}", config.capture.window_name);
    info!(
        "remote: {} (bind {})",
        config.network.remote_addr, config.network.bind_addr
    );
    info!(
        "target FPS: {}, frame {}x{}, codec {} level {}",
        config.capture.fps,
        config.capture.frame_width,
        config.capture.frame_height,
        config.encoding.codec,
        config.encoding.level
    );

    let stream_config = config.to_stream_config()?;

    let mut templates = Templates::embedded();
    match &config.detection.portal_template {
        Some(path) => {
            templates = templates.with_portal(load_template(path)?);
            info!("portal template: {}", path.display());
        }
        None => info!("no portal template configured; portal search disabled"),
    }

    // Start-up failures are fatal.
    let capturer = GdiCapturer::for_window(&config.capture.window_name)?;
    info!(
        "capture region: {}x{} at {:?}",
        capturer.width(),
        capturer.height(),
        capturer.region()
    );

    let transport = UdpTransport::bind(
        config.network.bind_addr.as_str(),
        config.network.remote_addr.as_str(),
        config.recv_timeout(),
    )?;
    info!("UDP socket bound to {}", transport.local_addr()?);

    let (key_tx, key_rx) = key_channel();
    let hook = match KeyHook::install(key_tx) {
        Ok(hook) => Some(hook),
        Err(e) => {
            warn!("key hook unavailable, pressed keys will not be reported: {e}");
            None
        }
    };

    let stop = StopSignal::new();
    let watcher = spawn_watcher(EscapeKey, stop.clone(), DEFAULT_POLL_INTERVAL)?;
    tokio::spawn(stop_on_ctrl_c(stop.clone()));

    let service = StreamService::new(
        capturer,
        CpuImageOps::new(),
        SendInputSink::new(),
        templates,
        transport,
        key_rx,
        stream_config,
        stop.clone(),
    );
    let result = tokio::task::spawn_blocking(move || service.run()).await?;

    stop.stop();
    drop(hook);
    if watcher.join().is_err() {
        warn!("stop watcher panicked");
    }

    let (sent, received) = result?;
    info!(
        "shutdown: {} frames sent, {} dropped, {} action packets replayed",
        sent.sent, sent.dropped, received.packets
    );
    Ok(())
}
