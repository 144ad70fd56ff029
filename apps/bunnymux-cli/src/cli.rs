// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Command-line surface (`spec.md` §9 ambient stack "CLI").
//!
//! Grounded in `apps/skit/src/cli.rs`'s `Cli`/`Commands` shape and its injected
//! `LogInitFn` testability seam, pared down from a server's `serve`/`config` split to a
//! one-shot `convert`/`config` split.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use crate::config;

#[derive(Parser, Debug)]
#[command(name = "bunnymux", version, about = "Convert media containers track by track")]
pub struct Cli {
    /// Path to an optional TOML config file.
    #[arg(long, default_value = "bunnymux.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert one input fixture container into an output fixture container.
    Convert(ConvertArgs),
    /// Inspect configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Input fixture container path.
    pub input: PathBuf,
    /// Output fixture container path.
    pub output: PathBuf,

    /// Target video width. Omit to preserve the source's aspect ratio against `--height`,
    /// or the source width if neither is given.
    #[arg(long)]
    pub width: Option<u32>,
    /// Target video height.
    #[arg(long)]
    pub height: Option<u32>,
    /// Target video codec tag (e.g. `avc1`, `rawvideo`).
    #[arg(long)]
    pub video_codec: Option<String>,
    /// Target audio codec tag (e.g. `opus`, `pcm_f32le`).
    #[arg(long)]
    pub audio_codec: Option<String>,
    /// Target audio sample rate in Hz.
    #[arg(long)]
    pub sample_rate: Option<u32>,
    /// Target channel count.
    #[arg(long)]
    pub channels: Option<u16>,
    /// Drop every video track.
    #[arg(long)]
    pub discard_video: bool,
    /// Drop every audio track.
    #[arg(long)]
    pub discard_audio: bool,
    /// Trim start, in seconds from the start of the source.
    #[arg(long)]
    pub trim_start: Option<f64>,
    /// Trim end, in seconds from the start of the source.
    #[arg(long)]
    pub trim_end: Option<f64>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the default configuration as TOML.
    Default,
    /// Print the configuration JSON schema.
    Schema,
}

fn handle_config_default_command() -> ExitCode {
    println!("{}", config::generate_default());
    ExitCode::SUCCESS
}

fn handle_config_schema_command() -> ExitCode {
    let schema = schemars::schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        },
        Err(e) => {
            eprintln!("failed to render config schema: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Dispatches on the parsed subcommand. `convert` is handled by the caller since it
/// needs the async runtime and logging already initialized; this only handles the
/// synchronous `config` inspection commands that don't touch the conversion pipeline.
#[must_use]
pub fn handle_config_command(command: &ConfigCommands) -> ExitCode {
    match command {
        ConfigCommands::Default => handle_config_default_command(),
        ConfigCommands::Schema => handle_config_schema_command(),
    }
}
