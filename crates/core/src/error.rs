// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for the conversion pipeline.
//!
//! One flat enum covering both `init`-time failures (codec/request negotiation)
//! and `execute`-time failures (demux/decode/encode/mux), matching the error
//! kinds a conversion controller is required to surface.

use thiserror::Error;

/// Errors produced by the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// No backend or output-format mapping exists for a codec. Fatal, from `init`.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// A user override cannot be satisfied (e.g. odd dimension with an AVC/HEVC target).
    /// Fatal, from `init`.
    #[error("incompatible request: {0}")]
    IncompatibleRequest(String),

    /// Every track was discarded or unsupported; the negotiated output would be empty.
    #[error("no output tracks")]
    NoOutputTracks,

    /// Input demuxing failed while executing.
    #[error("demux error: {0}")]
    DemuxError(String),

    /// A decoder rejected or failed on a packet.
    #[error("decode error on track {track_id}: {message}")]
    DecodeError { track_id: u32, message: String },

    /// An encoder failed (after the single permitted retry).
    #[error("encode error on track {track_id}: {message}")]
    EncodeError { track_id: u32, message: String },

    /// The muxer adapter rejected a track, a packet, or failed to finalize.
    #[error("muxer error: {0}")]
    MuxerError(String),

    /// Cancellation was observed before the conversion completed.
    #[error("cancelled")]
    Cancelled,

    /// A condition the implementation asserts can never happen, happened.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    /// I/O failure from a transport-adjacent operation (e.g. opening a source/sink).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pipeline-stage task panicked or was aborted.
    #[error("pipeline stage task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

/// Convenience alias for Results produced by this crate and its dependents.
pub type Result<T> = std::result::Result<T, ConversionError>;

impl ConversionError {
    /// True for the distinguished cancellation error (`spec.md` §7: "distinguished from
    /// other failures").
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
