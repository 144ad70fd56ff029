// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The output/muxer contract (`spec.md` §4.5, §6 "Output contract (muxer)").
//!
//! Grounded in the teacher's demuxer-side container nodes
//! (`crates/nodes/src/containers/{wav,webm}.rs`), mirrored to the write side. Production
//! MP4/WebM/WAV writers are out of scope (`spec.md` §1); `RecordingMuxer` is an in-memory
//! reference implementation used by the engine's integration tests to assert the
//! ordering/finalization invariants of `spec.md` §8.
//!
//! The core serializes all `write_packet` calls through a single mutex held for the
//! duration of one call (`spec.md` §4.5, §9 "Shared muxer across pipelines") — that
//! serialization lives in `bunnymux_engine::controller`, not here: this trait describes
//! what a single call does, not how concurrent pipelines coordinate access to it.

use bunnymux_core::{CodecId, ConversionError, Packet, TrackKind};

/// Opaque handle returned by `add_track`, passed back on every `write_packet` call for
/// that track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackHandle(pub u32);

/// The output-format-specific sink the controller drives.
pub trait MuxerAdapter: Send {
    /// Register an output track before `begin()`. Returns a handle used for all
    /// subsequent `write_packet` calls for this track.
    fn add_track(
        &mut self,
        kind: TrackKind,
        codec: &CodecId,
        codec_private: Option<&bytes::Bytes>,
    ) -> Result<TrackHandle, ConversionError>;

    /// Writes headers/ftyp/EBML header/etc. Called once, after every `add_track` call.
    fn begin(&mut self) -> Result<(), ConversionError>;

    /// Packets for one track must arrive in DTS order; the muxer may re-interleave
    /// across tracks but must not reorder within a track (`spec.md` §5).
    fn write_packet(&mut self, track: TrackHandle, packet: Packet) -> Result<(), ConversionError>;

    /// Writes trailing indexes (moov, cues). Only valid once every started track has
    /// reached EOF.
    fn finalize(self: Box<Self>) -> Result<(), ConversionError>;

    /// Releases resources; the output sink's contents afterward are undefined and the
    /// caller is expected to discard them (`spec.md` §7).
    fn abort(self: Box<Self>);
}

#[derive(Debug, Clone)]
struct RecordedTrack {
    kind: TrackKind,
    codec: CodecId,
    packets: Vec<Packet>,
}

/// An in-memory `MuxerAdapter` that records everything it's told, for assertions in
/// tests (`spec.md` §8: packet counts, DTS ordering, post-cancellation silence).
pub struct RecordingMuxer {
    tracks: Vec<RecordedTrack>,
    began: bool,
    finalized: bool,
    aborted: bool,
}

impl Default for RecordingMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingMuxer {
    #[must_use]
    pub const fn new() -> Self {
        Self { tracks: Vec::new(), began: false, finalized: false, aborted: false }
    }

    #[must_use]
    pub fn packet_count(&self, track: TrackHandle) -> usize {
        self.tracks.get(track.0 as usize).map_or(0, |t| t.packets.len())
    }

    #[must_use]
    pub fn packets(&self, track: TrackHandle) -> &[Packet] {
        self.tracks.get(track.0 as usize).map_or(&[], |t| t.packets.as_slice())
    }

    #[must_use]
    pub const fn began(&self) -> bool {
        self.began
    }

    #[must_use]
    pub const fn finalized(&self) -> bool {
        self.finalized
    }

    #[must_use]
    pub const fn aborted(&self) -> bool {
        self.aborted
    }

    #[must_use]
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

impl MuxerAdapter for RecordingMuxer {
    fn add_track(
        &mut self,
        kind: TrackKind,
        codec: &CodecId,
        _codec_private: Option<&bytes::Bytes>,
    ) -> Result<TrackHandle, ConversionError> {
        if self.began {
            return Err(ConversionError::MuxerError(
                "add_track called after begin()".to_string(),
            ));
        }
        let handle = TrackHandle(u32::try_from(self.tracks.len()).map_err(|_| {
            ConversionError::InternalInvariant("too many tracks for u32 handle".to_string())
        })?);
        self.tracks.push(RecordedTrack { kind, codec: codec.clone(), packets: Vec::new() });
        Ok(handle)
    }

    fn begin(&mut self) -> Result<(), ConversionError> {
        self.began = true;
        Ok(())
    }

    fn write_packet(&mut self, track: TrackHandle, packet: Packet) -> Result<(), ConversionError> {
        if !self.began {
            return Err(ConversionError::MuxerError(
                "write_packet called before begin()".to_string(),
            ));
        }
        let Some(recorded) = self.tracks.get_mut(track.0 as usize) else {
            return Err(ConversionError::MuxerError(format!("unknown track handle {track:?}")));
        };
        if let Some(prev) = recorded.packets.last() {
            if packet.dts < prev.dts {
                return Err(ConversionError::InternalInvariant(format!(
                    "packet dts went backward on track {track:?}: {:?} < {:?}",
                    packet.dts, prev.dts
                )));
            }
        }
        recorded.packets.push(packet);
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<(), ConversionError> {
        self.finalized = true;
        Ok(())
    }

    fn abort(mut self: Box<Self>) {
        self.aborted = true;
    }
}

#[cfg(test)]
mod tests {
    use bunnymux_core::{Timestamp, TrackId};

    use super::*;

    #[test]
    fn rejects_packets_before_begin() {
        let mut muxer = RecordingMuxer::new();
        let handle = muxer.add_track(TrackKind::Audio, &CodecId::new("pcm_f32le"), None).unwrap();
        let packet = Packet::new(
            TrackId(0),
            bytes::Bytes::new(),
            Timestamp::zero(48000),
            Timestamp::zero(48000),
            Timestamp::zero(48000),
            true,
        );
        assert!(muxer.write_packet(handle, packet).is_err());
    }

    #[test]
    fn rejects_dts_going_backward() {
        let mut muxer = RecordingMuxer::new();
        let handle = muxer.add_track(TrackKind::Audio, &CodecId::new("pcm_f32le"), None).unwrap();
        muxer.begin().unwrap();

        let first = Packet::new(
            TrackId(0),
            bytes::Bytes::new(),
            Timestamp::new(960, 48000),
            Timestamp::new(960, 48000),
            Timestamp::new(960, 48000),
            true,
        );
        muxer.write_packet(handle, first).unwrap();

        let second = Packet::new(
            TrackId(0),
            bytes::Bytes::new(),
            Timestamp::zero(48000),
            Timestamp::zero(48000),
            Timestamp::new(960, 48000),
            false,
        );
        assert!(muxer.write_packet(handle, second).is_err());
    }
}
