// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared tuning constants for the conversion controller and track pipelines.
//!
//! This module provides the canonical default values referenced by the controller and
//! by individual pipeline stages, so the numbers only need to be changed in one place.
//!
//! # Channel Capacity Guidelines
//!
//! `spec.md` §4.3 fixes the bounded channel capacity between adjacent pipeline stages
//! at 4 units of decoded media (frames or packets), deliberately small: this is a batch
//! conversion core, not a low-latency streaming server, so there is no benefit to deep
//! buffering and a real cost in peak memory when several tracks transcode concurrently.

use std::time::Duration;

/// Bounded channel capacity between adjacent track-pipeline stages
/// (decode → transform → encode → mux). `spec.md` §4.3.
pub const STAGE_QUEUE_CAPACITY: usize = 4;

/// Capacity of the progress-update channel from a track pipeline to the controller.
/// Updates are `try_send`-based best-effort (`spec.md` §4.4), so this only needs to
/// absorb a short burst, not the whole run.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Capacity of the state-update channel from a track pipeline to the controller.
pub const STATE_CHANNEL_CAPACITY: usize = 16;

/// Default progress callback delivery rate (`spec.md` §4.4: "no faster than 60Hz").
pub const DEFAULT_PROGRESS_THROTTLE_HZ: u64 = 60;

/// Pause before the single permitted encoder retry on a transient failure
/// (`spec.md` §4.3 edge case: "Encoder rejects a frame transiently").
pub const ENCODER_RETRY_PAUSE: Duration = Duration::from_millis(10);

/// Initial capacity of the PTS-reordering heap a transcode stage keeps for codecs with
/// a B-frame reorder window. Grows past this if a backend reports a deeper window; this
/// is a allocation-avoidance hint, not a hard limit.
pub const PTS_REORDER_HEAP_DEFAULT_CAPACITY: usize = 8;

/// Default capacity for the decoder/encoder async/blocking handoff channel, for backends
/// that host their codec on a `spawn_blocking` worker task (`spec.md` §9 design note).
pub const DEFAULT_CODEC_CHANNEL_CAPACITY: usize = 8;
