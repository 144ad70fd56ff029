// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Track plans and transform configuration (`spec.md` §3 "Track plan" / "Transform config",
//! §4.2 "Plan Negotiation").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::time::Rational;
use crate::track::CodecId;

/// How a video transform stage fits source dimensions into target dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Scale to fit entirely within the target box, letterboxing the remainder.
    Contain,
    /// Scale to fill the target box entirely, cropping the overflow.
    Cover,
    /// Scale to the target box, ignoring aspect ratio.
    Fill,
}

/// How a multi-channel audio transform stage maps source to target channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MixPolicy {
    Downmix,
    Upmix,
    Passthrough,
}

/// Per-track transform parameters (`spec.md` §3 "Transform config").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransformConfig {
    Video {
        target_width: u32,
        target_height: u32,
        target_frame_rate: Option<Rational>,
        fit_mode: FitMode,
    },
    Audio {
        target_sample_rate: u32,
        target_channels: u16,
        mix_policy: MixPolicy,
    },
}

/// Decoder configuration handed to a `Decoder` backend at pipeline start.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub codec: CodecId,
}

/// Encoder configuration handed to an `Encoder` backend at pipeline start.
///
/// `requires_fixed_frame_size` resolves the tail-padding open question from `spec.md` §9:
/// the backend declares whether it needs silence-padded frames, rather than the transform
/// stage guessing per codec (see `SPEC_FULL.md` §9).
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    pub codec: CodecId,
    pub bitrate: Option<u32>,
    pub requires_fixed_frame_size: bool,
    pub fixed_frame_size: Option<usize>,
}

/// The per-track decision produced during controller initialization (`spec.md` §4.2).
/// Immutable for the duration of the conversion.
#[derive(Debug, Clone)]
pub enum TrackPlan {
    /// Track dropped from output.
    Discard,
    /// Bit-exact packet forwarding; keyframes aligned.
    Copy { source_codec: CodecId, codec_private: Option<bytes::Bytes> },
    /// Full decode/transform/encode pipeline.
    Transcode { decoder_cfg: DecoderConfig, transform_cfg: TransformConfig, encoder_cfg: EncoderConfig },
}

impl TrackPlan {
    #[must_use]
    pub const fn is_discard(&self) -> bool {
        matches!(self, Self::Discard)
    }
}
