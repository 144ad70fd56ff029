// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The input/demuxer contract (`spec.md` §6 "Input contract (demuxer)").
//!
//! A conforming source enumerates tracks up front and then yields packets per track in
//! DTS order, forward-only, with backward seek limited to keyframes. Grounded in the
//! teacher's streaming-reader shape (`crates/nodes/src/containers/wav.rs`'s
//! `StreamingReader`), simplified from an async duplex byte stream to a synchronous
//! in-memory queue since bit-level container parsing is out of scope here.

use std::collections::VecDeque;

use bunnymux_core::{ConversionError, Packet, Timestamp, TrackDescriptor, TrackId};

/// What the conversion core requires from an input container.
pub trait PacketSource: Send {
    /// All tracks, as probed up front. Immutable for the lifetime of the source.
    fn tracks(&self) -> &[TrackDescriptor];

    /// Pull the next packet for `track_id`, or `None` at EOF. Packets are monotonic in
    /// DTS within a track (`spec.md` §3 invariant).
    fn next_packet(&mut self, track_id: TrackId) -> Result<Option<Packet>, ConversionError>;

    /// Seek backward to the keyframe at or before `target`, returning the keyframe's
    /// actual timestamp. Used by the copy pipeline when the trim start falls on a
    /// non-keyframe packet (`spec.md` §4.3).
    fn seek_to_keyframe(
        &mut self,
        track_id: TrackId,
        target: Timestamp,
    ) -> Result<Timestamp, ConversionError>;

    /// Best-effort total duration, if the container declares one.
    fn duration_estimate(&self) -> Option<Timestamp>;
}

/// A reference `PacketSource` backed by pre-loaded, in-memory packet queues.
///
/// Used by integration tests (`spec.md` §8 end-to-end scenarios) to drive the
/// conversion controller without a real container parser.
pub struct InMemorySource {
    tracks: Vec<TrackDescriptor>,
    packets: Vec<VecDeque<Packet>>,
}

impl InMemorySource {
    /// `packets[i]` must be the full, DTS-ordered packet queue for `tracks[i]`.
    #[must_use]
    pub fn new(tracks: Vec<TrackDescriptor>, packets: Vec<Vec<Packet>>) -> Self {
        debug_assert_eq!(tracks.len(), packets.len());
        let packets = packets.into_iter().map(VecDeque::from).collect();
        Self { tracks, packets }
    }

    fn index_of(&self, track_id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }
}

impl PacketSource for InMemorySource {
    fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    fn next_packet(&mut self, track_id: TrackId) -> Result<Option<Packet>, ConversionError> {
        let Some(idx) = self.index_of(track_id) else {
            return Err(ConversionError::InternalInvariant(format!(
                "next_packet called for unknown track {track_id:?}"
            )));
        };
        Ok(self.packets[idx].pop_front())
    }

    fn seek_to_keyframe(
        &mut self,
        track_id: TrackId,
        target: Timestamp,
    ) -> Result<Timestamp, ConversionError> {
        let Some(idx) = self.index_of(track_id) else {
            return Err(ConversionError::InternalInvariant(format!(
                "seek_to_keyframe called for unknown track {track_id:?}"
            )));
        };

        // Find the last keyframe at or before `target`, drop everything before it.
        let queue = &self.packets[idx];
        let mut keyframe_pos = None;
        for (pos, packet) in queue.iter().enumerate() {
            if packet.pts > target {
                break;
            }
            if packet.is_keyframe {
                keyframe_pos = Some(pos);
            }
        }

        let Some(pos) = keyframe_pos else {
            return Err(ConversionError::DemuxError(format!(
                "no keyframe at or before {target:?} on track {track_id:?}"
            )));
        };

        let actual = self.packets[idx][pos].pts;
        self.packets[idx].drain(..pos);
        Ok(actual)
    }

    fn duration_estimate(&self) -> Option<Timestamp> {
        self.tracks.iter().filter_map(|t| t.duration).max()
    }
}
