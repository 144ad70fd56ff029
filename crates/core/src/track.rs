// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Track descriptors: immutable per-track metadata produced by input probing
//! (`spec.md` §2 item 1, §3 "Track descriptor").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::time::{Rational, Timestamp};

/// Opaque per-track identifier, stable for the lifetime of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct TrackId(pub u32);

/// The three track kinds a container may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    Video,
    Audio,
    Subtitle,
}

/// A codec identifier. Kept as a plain string tag (e.g. `"avc1"`, `"opus"`, `"vp9"`)
/// rather than a closed enum: new codecs are added by registering a backend
/// (`CodecBackendRegistry`), not by extending this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct CodecId(pub String);

impl CodecId {
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CodecId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Intrinsic stream parameters, split by track kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackParams {
    Video {
        width: u32,
        height: u32,
        frame_rate: Option<Rational>,
    },
    Audio {
        sample_rate: u32,
        channels: u16,
    },
    Subtitle,
}

impl TrackParams {
    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        match self {
            Self::Video { .. } => TrackKind::Video,
            Self::Audio { .. } => TrackKind::Audio,
            Self::Subtitle => TrackKind::Subtitle,
        }
    }
}

/// Immutable per-track metadata surfaced by the input contract (`spec.md` §6).
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDescriptor {
    pub id: TrackId,
    pub codec: CodecId,
    pub params: TrackParams,
    /// Declared duration, if the source reports one. `spec.md` §9 open question:
    /// when this disagrees with the sum of packet durations, the declared value wins
    /// (see `SPEC_FULL.md` §9).
    pub duration: Option<Timestamp>,
    /// The time base packets on this track are expressed in.
    pub time_base: Timestamp,
    /// Codec-private / extradata payload needed to remux or to configure a decoder
    /// (SPS/PPS, `CodecPrivate`, `dOps` header, etc). `None` for codecs that don't need one.
    pub codec_private: Option<bytes::Bytes>,
}

impl TrackDescriptor {
    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        self.params.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_params_kind_matches_variant() {
        let video = TrackParams::Video { width: 1920, height: 1080, frame_rate: None };
        assert_eq!(video.kind(), TrackKind::Video);

        let audio = TrackParams::Audio { sample_rate: 48000, channels: 2 };
        assert_eq!(audio.kind(), TrackKind::Audio);
    }
}
