//! Configuration for the Vantage client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vantage_core::encoder::EncoderConfig;
use vantage_core::minimap::DetectionConfig;
use vantage_core::{Codec, MAX_PAYLOAD_SIZE, StreamConfig, VantageError};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: NetworkConfig,
    pub capture: CaptureConfig,
    pub encoding: EncodingConfig,
    pub detection: DetectionSettings,
    pub pacing: PacingConfig,
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Consumer address frames are sent to and actions arrive from.
    pub remote_addr: String,
    /// Local UDP address to bind.
    pub bind_addr: String,
    /// Receive-loop poll interval in milliseconds.
    pub recv_timeout_ms: u64,
}

/// Window and frame settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Title of the window whose client area is streamed.
    pub window_name: String,
    /// Target frames per second (1..=120).
    pub fps: u32,
    /// Canonical frame width sent on the wire.
    pub frame_width: u32,
    /// Canonical frame height sent on the wire.
    pub frame_height: u32,
}

/// Payload compression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// "zlib" or "zstd".
    pub codec: String,
    pub level: i32,
    /// Largest payload sent; bigger frames are dropped.
    pub max_payload: usize,
}

/// Template matching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub player_threshold: f32,
    pub portal_threshold: f32,
    /// PNG portal icon. Portal search is disabled without it.
    pub portal_template: Option<PathBuf>,
    /// Collapse portal hits closer than this many pixels (0 = off).
    pub dedup_radius: u32,
    /// Frames between minimap searches while it has not been found.
    pub relocate_interval: u32,
}

/// Frame pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// How long before each deadline to stop sleeping and spin.
    pub busy_wait_margin_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            remote_addr: "127.0.0.1:12345".into(),
            bind_addr: "0.0.0.0:0".into(),
            recv_timeout_ms: 100,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_name: "MapleStory".into(),
            fps: 24,
            frame_width: 512,
            frame_height: 288,
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "zlib".into(),
            level: 6,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }
}

impl Default for DetectionSettings {
    fn default() -> Self {
        let detection = DetectionConfig::default();
        Self {
            player_threshold: detection.player_threshold,
            portal_threshold: detection.portal_threshold,
            portal_template: None,
            dedup_radius: detection.dedup_radius,
            relocate_interval: detection.relocate_interval,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            busy_wait_margin_ms: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// Where a loaded configuration came from.
#[derive(Debug)]
pub enum ConfigOrigin {
    File,
    /// No readable file; defaults used.
    Missing,
    /// The file did not parse; defaults used.
    Invalid(toml::de::Error),
}

impl ConfigOrigin {
    /// Report the outcome. Call once logging is initialised.
    pub fn log(&self, path: &Path) {
        match self {
            ConfigOrigin::File => tracing::info!("config loaded from {}", path.display()),
            ConfigOrigin::Missing => {
                tracing::info!("no config at {}; using defaults", path.display())
            }
            ConfigOrigin::Invalid(e) => {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display())
            }
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> (Self, ConfigOrigin) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(cfg) => (cfg, ConfigOrigin::File),
                Err(e) => (Self::default(), ConfigOrigin::Invalid(e)),
            },
            Err(_) => (Self::default(), ConfigOrigin::Missing),
        }
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Default configuration as pretty TOML.
    pub fn default_toml() -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&Self::default())
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.network.recv_timeout_ms.max(1))
    }

    /// Convert into the core service configuration.
    pub fn to_stream_config(&self) -> Result<StreamConfig, VantageError> {
        let codec: Codec = self.encoding.codec.parse()?;
        Ok(StreamConfig {
            fps: self.capture.fps,
            busy_wait_margin: Duration::from_millis(self.pacing.busy_wait_margin_ms),
            encoder: EncoderConfig {
                width: self.capture.frame_width.max(1),
                height: self.capture.frame_height.max(1),
                codec,
                level: self.encoding.level,
                max_payload: self.encoding.max_payload.min(MAX_PAYLOAD_SIZE),
            },
            detection: DetectionConfig {
                player_threshold: self.detection.player_threshold,
                portal_threshold: self.detection.portal_threshold,
                dedup_radius: self.detection.dedup_radius,
                relocate_interval: self.detection.relocate_interval,
            },
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────
