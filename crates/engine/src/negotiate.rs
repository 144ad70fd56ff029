// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Plan negotiation: turns a source track descriptor plus user overrides into a
//! `TrackPlan` (`spec.md` §4.2).

use bunnymux_backends::CodecBackendRegistry;
use bunnymux_core::{
    CodecId, ConversionError, DecoderConfig, EncoderConfig, FitMode, MixPolicy, Rational,
    TrackDescriptor, TrackKind, TrackParams, TransformConfig,
};

/// What the output format can carry, per track kind.
pub struct OutputCapabilities {
    pub video_codecs: Vec<CodecId>,
    pub audio_codecs: Vec<CodecId>,
    pub preferred_video_codec: CodecId,
    pub preferred_audio_codec: CodecId,
}

impl OutputCapabilities {
    fn supported_codecs(&self, kind: TrackKind) -> &[CodecId] {
        match kind {
            TrackKind::Video => &self.video_codecs,
            TrackKind::Audio => &self.audio_codecs,
            TrackKind::Subtitle => &[],
        }
    }

    fn preferred_codec(&self, kind: TrackKind) -> Option<&CodecId> {
        match kind {
            TrackKind::Video => Some(&self.preferred_video_codec),
            TrackKind::Audio => Some(&self.preferred_audio_codec),
            TrackKind::Subtitle => None,
        }
    }
}

/// User-requested overrides for one track (`spec.md` §6 "User-facing surface").
#[derive(Debug, Clone, Default)]
pub struct TrackOverrides {
    pub discard: bool,
    pub codec: Option<CodecId>,
    pub bitrate: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<Rational>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl TrackOverrides {
    fn changes_stream_parameters(&self) -> bool {
        self.codec.is_some()
            || self.bitrate.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.frame_rate.is_some()
            || self.sample_rate.is_some()
            || self.channels.is_some()
    }
}

/// Codecs that require even width/height (`spec.md` §8 scenario 1/2).
fn requires_even_dimensions(codec: &CodecId) -> bool {
    matches!(codec.as_str(), "avc1" | "h264" | "hevc" | "h265")
}

/// Rounds an inferred (non-overridden) dimension down to the nearest even value
/// (`spec.md` §8 scenario 1: a 1281px source with no override auto-rounds to 1280, not
/// 1282). A user-specified odd dimension is rejected outright above, never rounded.
fn round_down_to_even(value: u32) -> u32 {
    value - (value % 2)
}

/// Derives target video dimensions, preserving aspect ratio when only one of
/// width/height is overridden, and enforcing even dimensions for codecs that require it.
fn derive_video_dimensions(
    source_width: u32,
    source_height: u32,
    overrides: &TrackOverrides,
    target_codec: &CodecId,
) -> Result<(u32, u32), ConversionError> {
    let (mut width, mut height) = match (overrides.width, overrides.height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let h = w * source_height / source_width.max(1);
            (w, h)
        },
        (None, Some(h)) => {
            let w = h * source_width / source_height.max(1);
            (w, h)
        },
        (None, None) => (source_width, source_height),
    };

    if requires_even_dimensions(target_codec) {
        let user_specified_odd = (overrides.width.is_some() && width % 2 != 0)
            || (overrides.height.is_some() && height % 2 != 0);
        if user_specified_odd {
            return Err(ConversionError::IncompatibleRequest(format!(
                "{target_codec} requires an even number for width and height, got {width}x{height}"
            )));
        }
        width = round_down_to_even(width);
        height = round_down_to_even(height);
    }

    Ok((width, height))
}

/// Chooses the closest sample rate the encoder supports to the requested one, rounding
/// up on a tie (`spec.md` §4.2 tie-break rule).
fn closest_supported_sample_rate(requested: u32, supported: &[u32]) -> u32 {
    supported
        .iter()
        .copied()
        .min_by_key(|&candidate| {
            let diff = i64::from(candidate) - i64::from(requested);
            (diff.abs(), if diff < 0 { 1 } else { 0 })
        })
        .unwrap_or(requested)
}

/// Chooses the channel count the encoder supports closest to requested, biased toward
/// downmixing to stereo on a tie.
fn closest_supported_channels(requested: u16, supported: &[u16]) -> u16 {
    supported
        .iter()
        .copied()
        .min_by_key(|&candidate| {
            let diff = i32::from(candidate) - i32::from(requested);
            (diff.abs(), (i32::from(candidate) - 2).abs())
        })
        .unwrap_or(requested)
}

/// Implements the `spec.md` §4.2 decision table, first match wins.
pub fn plan_track(
    descriptor: &TrackDescriptor,
    overrides: &TrackOverrides,
    output_caps: &OutputCapabilities,
    registry: &CodecBackendRegistry,
) -> Result<bunnymux_core::TrackPlan, ConversionError> {
    if overrides.discard {
        return Ok(bunnymux_core::TrackPlan::Discard);
    }

    let kind = descriptor.kind();
    let supported = output_caps.supported_codecs(kind);

    if supported.contains(&descriptor.codec)
        && !overrides.changes_stream_parameters()
        && descriptor.codec_private.as_ref().is_some_and(|p| !p.is_empty())
    {
        return Ok(bunnymux_core::TrackPlan::Copy {
            source_codec: descriptor.codec.clone(),
            codec_private: descriptor.codec_private.clone(),
        });
    }

    let target_codec = overrides.codec.clone().or_else(|| output_caps.preferred_codec(kind).cloned());
    let Some(target_codec) = target_codec else {
        return Err(ConversionError::UnsupportedCodec(format!("no output codec for {kind:?}")));
    };

    if !registry.supports_decode(&descriptor.codec) {
        return Err(ConversionError::UnsupportedCodec(descriptor.codec.as_str().to_string()));
    }
    if !registry.supports_encode(&target_codec) {
        return Err(ConversionError::UnsupportedCodec(target_codec.as_str().to_string()));
    }

    let transform_cfg = match &descriptor.params {
        TrackParams::Video { width, height, frame_rate } => {
            let (target_width, target_height) =
                derive_video_dimensions(*width, *height, overrides, &target_codec)?;
            TransformConfig::Video {
                target_width,
                target_height,
                target_frame_rate: overrides.frame_rate.or(*frame_rate),
                fit_mode: FitMode::Contain,
            }
        },
        TrackParams::Audio { sample_rate, channels } => {
            let target_sample_rate =
                overrides.sample_rate.unwrap_or_else(|| closest_supported_sample_rate(*sample_rate, &[*sample_rate]));
            let target_channels =
                overrides.channels.unwrap_or_else(|| closest_supported_channels(*channels, &[*channels]));
            let mix_policy = if target_channels < *channels {
                MixPolicy::Downmix
            } else if target_channels > *channels {
                MixPolicy::Upmix
            } else {
                MixPolicy::Passthrough
            };
            TransformConfig::Audio { target_sample_rate, target_channels, mix_policy }
        },
        TrackParams::Subtitle => {
            return Err(ConversionError::UnsupportedCodec(
                "subtitle transcoding is not supported".to_string(),
            ));
        },
    };

    Ok(bunnymux_core::TrackPlan::Transcode {
        decoder_cfg: DecoderConfig { codec: descriptor.codec.clone() },
        transform_cfg,
        encoder_cfg: EncoderConfig {
            codec: target_codec,
            bitrate: overrides.bitrate,
            requires_fixed_frame_size: false,
            fixed_frame_size: None,
        },
    })
}
