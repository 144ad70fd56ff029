// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Layered configuration (`spec.md` §9 ambient stack "Configuration").
//!
//! Grounded in `apps/skit/src/config.rs::load()`'s `Figment` layering: built-in defaults,
//! overridden by an optional TOML file, overridden by `BUNNYMUX_`-prefixed environment
//! variables. A missing config file is not an error — it just means "use the defaults" —
//! matching the teacher's `ConfigLoadResult::file_missing` signal.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default output sample rate when no `--sample-rate` override is given.
fn default_sample_rate() -> u32 {
    48000
}

/// Default output channel count when no `--channels` override is given.
fn default_channels() -> u16 {
    2
}

/// Default output video codec.
fn default_video_codec() -> String {
    "rawvideo".to_string()
}

/// Default output audio codec.
fn default_audio_codec() -> String {
    "pcm_f32le".to_string()
}

fn default_progress_throttle_hz() -> u64 {
    60
}

/// Default track pipeline channel-capacity tuning (`spec.md` §5.1), exposed so a host
/// can trade peak memory for throughput on constrained deployments.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BufferConfig {
    pub stage_queue_capacity: usize,
    pub progress_channel_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { stage_queue_capacity: 4, progress_channel_capacity: 16 }
    }
}

/// Default conversion target parameters, overridable per run by CLI flags
/// (`spec.md` §6 "User-facing surface").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConvertConfig {
    #[serde(default = "default_video_codec")]
    pub video_codec: String,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_progress_throttle_hz")]
    pub progress_throttle_hz: u64,
    pub buffers: BufferConfig,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            progress_throttle_hz: default_progress_throttle_hz(),
            buffers: BufferConfig::default(),
        }
    }
}

/// Console log level and format (`spec.md` §9 ambient stack "Logging/tracing").
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: LogLevel::Info }
    }
}

/// Top-level configuration, merged from defaults, an optional TOML file, and
/// environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub convert: ConvertConfig,
    pub log: LogConfig,
}

/// The result of a [`load`] call: the merged config, plus whether the requested file was
/// absent (so the caller can log a notice instead of silently proceeding).
pub struct ConfigLoadResult {
    pub config: Config,
    pub file_missing: Option<String>,
}

/// Loads configuration layered defaults → optional TOML file → `BUNNYMUX_`-prefixed
/// environment variables (double underscore as the nesting separator, e.g.
/// `BUNNYMUX_CONVERT__SAMPLE_RATE=44100`).
///
/// # Errors
///
/// Returns the underlying `figment::Error` if the TOML file exists but fails to parse,
/// or if an environment variable can't be coerced to its target type.
pub fn load(config_path: &str) -> Result<ConfigLoadResult, Box<figment::Error>> {
    let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));
    let mut file_missing = None;
    if std::path::Path::new(config_path).exists() {
        figment = figment.merge(Toml::file(config_path));
    } else {
        file_missing = Some(config_path.to_string());
    }
    let config: Config =
        figment.merge(Env::prefixed("BUNNYMUX_").split("__")).extract().map_err(Box::new)?;
    Ok(ConfigLoadResult { config, file_missing })
}

/// Renders the default configuration as TOML, for `bunnymux config default`.
#[must_use]
pub fn generate_default() -> String {
    toml::to_string_pretty(&Config::default()).unwrap_or_default()
}
