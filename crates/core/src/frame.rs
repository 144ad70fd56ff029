// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Decoded frames (`spec.md` §3 "DecodedFrame (video)" / "DecodedFrame (audio)").
//!
//! Transient: a `DecodedFrame` exists only within one pipeline step, between a
//! decode/transform stage and the next. Audio frames reuse the teacher's
//! [`crate::frame_pool`] so the transform stage's resample/remix work can mutate
//! in place via `Arc::make_mut` without a fresh heap allocation per frame.

use std::sync::Arc;

use crate::frame_pool::PooledSamples;
use crate::time::Timestamp;

/// Color space tag attached to a decoded video frame. Conversion between tags is the
/// transform stage's job (`spec.md` §4.3); this type only names the source/target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Bt601,
    Bt709,
    Bt2020,
}

/// A planar pixel buffer for one decoded video frame.
///
/// `planes` holds one `Vec<u8>` per plane (e.g. Y, U, V for 4:2:0) with `strides[i]`
/// bytes per row of `planes[i]`. This is a plain owned buffer, not pooled: video frames
/// vary too widely in size across a conversion (trimmed/cropped/scaled) for fixed-bucket
/// pooling to pay for itself the way it does for fixed-size audio chunks.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pub planes: Vec<Vec<u8>>,
    pub strides: Vec<usize>,
}

impl PixelBuffer {
    #[must_use]
    pub const fn new(planes: Vec<Vec<u8>>, strides: Vec<usize>) -> Self {
        Self { planes, strides }
    }
}

/// A decoded, transient frame flowing through a transcode pipeline.
#[derive(Debug, Clone)]
pub enum DecodedFrame {
    Video {
        buffer: Arc<PixelBuffer>,
        width: u32,
        height: u32,
        pts: Timestamp,
        color_space: ColorSpace,
    },
    Audio {
        samples: Arc<PooledSamples>,
        sample_rate: u32,
        channels: u16,
        pts: Timestamp,
        frame_count: usize,
    },
}

impl DecodedFrame {
    #[must_use]
    pub const fn pts(&self) -> Timestamp {
        match self {
            Self::Video { pts, .. } | Self::Audio { pts, .. } => *pts,
        }
    }

    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video { .. })
    }

    #[must_use]
    pub const fn is_audio(&self) -> bool {
        matches!(self, Self::Audio { .. })
    }

    /// Re-timestamp this frame, as happens when the clock coordinator rebases output PTS.
    #[must_use]
    pub fn with_pts(self, new_pts: Timestamp) -> Self {
        match self {
            Self::Video { buffer, width, height, color_space, .. } => {
                Self::Video { buffer, width, height, pts: new_pts, color_space }
            },
            Self::Audio { samples, sample_rate, channels, frame_count, .. } => {
                Self::Audio { samples, sample_rate, channels, pts: new_pts, frame_count }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_pool::FramePool;

    #[test]
    fn with_pts_preserves_other_fields() {
        let pool = FramePool::<f32>::preallocated(&[960], 1);
        let samples = Arc::new(pool.get(960));
        let frame = DecodedFrame::Audio {
            samples,
            sample_rate: 48000,
            channels: 2,
            pts: Timestamp::new(0, 48000),
            frame_count: 480,
        };
        let retimed = frame.with_pts(Timestamp::new(48000, 48000));
        assert_eq!(retimed.pts(), Timestamp::new(48000, 48000));
        assert!(retimed.is_audio());
    }
}
