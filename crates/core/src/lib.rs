// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Core data model for the Mediabunny conversion pipeline.
//!
//! This crate defines the types the conversion core operates on; it has no opinion on
//! how input is demuxed, how packets are decoded/encoded, or how output is muxed — those
//! are external collaborators specified as traits in `bunnymux-backends`.
//!
//! ## Core Modules
//!
//! - [`time`]: rational timestamps and frame-rate fractions
//! - [`track`]: track descriptors, codec identifiers, intrinsic parameters
//! - [`packet`]: coded packets flowing from source to muxer/decoder
//! - [`frame`]: transient decoded frames flowing through a transcode pipeline
//! - [`plan`]: per-track plans (discard/copy/transcode) and transform configuration
//! - [`trim`]: trim window semantics
//! - [`progress`]: progress accounting and throttled callback delivery
//! - [`state`]: track pipeline lifecycle state
//! - [`error`]: the crate-wide error type
//! - [`frame_pool`]: pooled audio sample buffers (reused across decode/transform/encode)

pub mod error;
pub mod frame;
pub mod frame_pool;
pub mod packet;
pub mod plan;
pub mod progress;
pub mod state;
pub mod time;
pub mod track;
pub mod trim;

pub use error::ConversionError;
pub use frame::{ColorSpace, DecodedFrame, PixelBuffer};
pub use frame_pool::{AudioFramePool, FramePool, PooledFrameData, PooledSamples};
pub use packet::Packet;
pub use plan::{DecoderConfig, EncoderConfig, FitMode, MixPolicy, TrackPlan, TransformConfig};
pub use progress::{ProgressState, ProgressThrottle, TrackProgress};
pub use state::{state_helpers, PipelineState, PipelineStateUpdate};
pub use time::{Rational, Timestamp};
pub use track::{CodecId, TrackDescriptor, TrackId, TrackKind, TrackParams};
pub use trim::{TrimRequest, TrimWindow};
