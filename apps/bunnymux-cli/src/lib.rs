// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

// Allow println/eprintln in the CLI binary - these are for direct user output, not logging
#![allow(clippy::disallowed_macros)]

//! `bunnymux-cli`: a command-line driver for the Mediabunny conversion pipeline
//! (`spec.md` §6 "User-facing surface").
//!
//! The conversion core treats demuxing and muxing as pluggable contracts
//! (`bunnymux_backends::{PacketSource, MuxerAdapter}`) and ships only in-memory
//! reference implementations, since bit-level container parsing is out of scope
//! (`spec.md` §1). This binary's [`container`] module is the file-backed stand-in a real
//! host application would replace with an actual MP4/WebM/WAV reader and writer: a small
//! JSON fixture format carrying track descriptors and packet payloads, read into an
//! `InMemorySource` and written out of a `FileMuxer`.

pub mod cli;
pub mod config;
pub mod container;
pub mod logging;

pub use cli::{Cli, Commands};
pub use config::{Config, ConfigLoadResult};
