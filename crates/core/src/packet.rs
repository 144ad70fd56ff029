// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Coded packets (`spec.md` §3 "Packet").

use bytes::Bytes;

use crate::time::Timestamp;
use crate::track::TrackId;

/// One coded unit of a media track: one NAL-unit access unit, one Opus packet, etc.
///
/// Invariant (`spec.md` §3): within one track, `dts` is monotonically non-decreasing and
/// `pts >= dts - max_reorder_window`. The pipeline does not re-validate this on every
/// packet (that cost belongs to the demuxer); `debug_assert`s in the pipeline stages
/// catch violations in non-release builds.
#[derive(Debug, Clone)]
pub struct Packet {
    pub track_id: TrackId,
    pub data: Bytes,
    pub pts: Timestamp,
    pub dts: Timestamp,
    pub duration: Timestamp,
    pub is_keyframe: bool,
}

impl Packet {
    #[must_use]
    pub const fn new(
        track_id: TrackId,
        data: Bytes,
        pts: Timestamp,
        dts: Timestamp,
        duration: Timestamp,
        is_keyframe: bool,
    ) -> Self {
        Self { track_id, data, pts, dts, duration, is_keyframe }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
