// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A JSON fixture container format standing in for a real demuxer/muxer
//! (`bunnymux_backends::{PacketSource, MuxerAdapter}` are the out-of-scope seams those
//! would fill, per `spec.md` §1). Grounded in `bunnymux_backends::source::InMemorySource`
//! and `bunnymux_backends::mux::RecordingMuxer`'s shapes: this just adds file I/O and a
//! hex payload encoding around the same in-memory structures.

use std::path::Path;

use bunnymux_backends::{InMemorySource, MuxerAdapter, TrackHandle};
use bunnymux_core::{CodecId, ConversionError, Packet, Timestamp, TrackDescriptor, TrackKind, TrackParams};
use serde::{Deserialize, Serialize};

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Result<Vec<u8>, ConversionError> {
    if s.len() % 2 != 0 {
        return Err(ConversionError::DemuxError("odd-length hex payload".to_string()));
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|e| ConversionError::DemuxError(format!("invalid hex payload: {e}")))
        })
        .collect()
}

#[derive(Debug, Serialize, Deserialize)]
struct TimestampDto {
    num: i64,
    den: u32,
}

impl From<Timestamp> for TimestampDto {
    fn from(ts: Timestamp) -> Self {
        Self { num: ts.numerator, den: ts.denominator }
    }
}

impl From<TimestampDto> for Timestamp {
    fn from(dto: TimestampDto) -> Self {
        Self::new(dto.num, dto.den)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TrackDto {
    id: u32,
    codec: String,
    params: TrackParams,
    duration: Option<TimestampDto>,
    time_base_den: u32,
    codec_private_hex: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PacketDto {
    pts: TimestampDto,
    dts: TimestampDto,
    duration: TimestampDto,
    is_keyframe: bool,
    data_hex: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContainerFile {
    tracks: Vec<TrackDto>,
    packets: Vec<Vec<PacketDto>>,
}

/// Reads a fixture file from `path` into an [`InMemorySource`].
///
/// # Errors
///
/// `Io` if the file cannot be read, `DemuxError` if its contents aren't a well-formed
/// fixture.
pub fn load_source(path: &Path) -> Result<InMemorySource, ConversionError> {
    let raw = std::fs::read_to_string(path)?;
    let file: ContainerFile =
        serde_json::from_str(&raw).map_err(|e| ConversionError::DemuxError(e.to_string()))?;

    let mut tracks = Vec::with_capacity(file.tracks.len());
    let mut packets = Vec::with_capacity(file.packets.len());

    for (track, track_packets) in file.tracks.into_iter().zip(file.packets) {
        let codec_private = track
            .codec_private_hex
            .map(|hex| from_hex(&hex).map(bytes::Bytes::from))
            .transpose()?;
        tracks.push(TrackDescriptor {
            id: bunnymux_core::TrackId(track.id),
            codec: CodecId::new(track.codec),
            params: track.params,
            duration: track.duration.map(Timestamp::from),
            time_base: Timestamp::zero(track.time_base_den),
            codec_private,
        });

        let mut decoded_packets = Vec::with_capacity(track_packets.len());
        for packet in track_packets {
            decoded_packets.push(Packet::new(
                bunnymux_core::TrackId(tracks.last().expect("just pushed").id.0),
                bytes::Bytes::from(from_hex(&packet.data_hex)?),
                packet.pts.into(),
                packet.dts.into(),
                packet.duration.into(),
                packet.is_keyframe,
            ));
        }
        packets.push(decoded_packets);
    }

    Ok(InMemorySource::new(tracks, packets))
}

#[derive(Debug, Clone)]
struct RecordedTrack {
    kind: TrackKind,
    codec: CodecId,
    codec_private: Option<bytes::Bytes>,
    packets: Vec<Packet>,
}

/// A file-backed [`MuxerAdapter`] that buffers every recorded track in memory and
/// serializes them to the fixture format at `finalize()`. Mirrors
/// `bunnymux_backends::mux::RecordingMuxer`'s bookkeeping, adding the JSON write.
pub struct FileMuxer {
    path: std::path::PathBuf,
    tracks: Vec<RecordedTrack>,
    began: bool,
}

impl FileMuxer {
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into(), tracks: Vec::new(), began: false }
    }
}

impl MuxerAdapter for FileMuxer {
    fn add_track(
        &mut self,
        kind: TrackKind,
        codec: &CodecId,
        codec_private: Option<&bytes::Bytes>,
    ) -> Result<TrackHandle, ConversionError> {
        if self.began {
            return Err(ConversionError::MuxerError("add_track called after begin()".to_string()));
        }
        let handle = TrackHandle(u32::try_from(self.tracks.len()).map_err(|_| {
            ConversionError::InternalInvariant("too many tracks for u32 handle".to_string())
        })?);
        self.tracks.push(RecordedTrack {
            kind,
            codec: codec.clone(),
            codec_private: codec_private.cloned(),
            packets: Vec::new(),
        });
        Ok(handle)
    }

    fn begin(&mut self) -> Result<(), ConversionError> {
        self.began = true;
        Ok(())
    }

    fn write_packet(&mut self, track: TrackHandle, packet: Packet) -> Result<(), ConversionError> {
        if !self.began {
            return Err(ConversionError::MuxerError("write_packet called before begin()".to_string()));
        }
        let Some(recorded) = self.tracks.get_mut(track.0 as usize) else {
            return Err(ConversionError::MuxerError(format!("unknown track handle {track:?}")));
        };
        recorded.packets.push(packet);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), ConversionError> {
        let file = ContainerFile {
            tracks: self
                .tracks
                .iter()
                .enumerate()
                .map(|(id, t)| TrackDto {
                    id: u32::try_from(id).unwrap_or(u32::MAX),
                    codec: t.codec.as_str().to_string(),
                    params: match t.kind {
                        TrackKind::Video => {
                            TrackParams::Video { width: 0, height: 0, frame_rate: None }
                        },
                        TrackKind::Audio => TrackParams::Audio { sample_rate: 0, channels: 0 },
                        TrackKind::Subtitle => TrackParams::Subtitle,
                    },
                    duration: None,
                    time_base_den: 1,
                    codec_private_hex: t.codec_private.as_deref().map(to_hex),
                })
                .collect(),
            packets: self
                .tracks
                .iter()
                .map(|t| {
                    t.packets
                        .iter()
                        .map(|p| PacketDto {
                            pts: p.pts.into(),
                            dts: p.dts.into(),
                            duration: p.duration.into(),
                            is_keyframe: p.is_keyframe,
                            data_hex: to_hex(&p.data),
                        })
                        .collect()
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ConversionError::MuxerError(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn abort(self: Box<Self>) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bunnymux_backends::PacketSource;

    fn fixture_json() -> &'static str {
        r#"{
            "tracks": [
                {
                    "id": 0,
                    "codec": "pcm_f32le",
                    "params": {"kind": "audio", "sample_rate": 48000, "channels": 2},
                    "duration": {"num": 1, "den": 1},
                    "time_base_den": 48000,
                    "codec_private_hex": null
                }
            ],
            "packets": [
                [
                    {
                        "pts": {"num": 0, "den": 48000},
                        "dts": {"num": 0, "den": 48000},
                        "duration": {"num": 960, "den": 48000},
                        "is_keyframe": true,
                        "data_hex": "cdcc4c3e"
                    }
                ]
            ]
        }"#
    }

    #[test]
    fn loads_tracks_and_packets_from_fixture() {
        let dir = std::env::temp_dir().join("bunnymux-cli-test-fixture.json");
        std::fs::write(&dir, fixture_json()).unwrap();

        let mut source = load_source(&dir).unwrap();
        assert_eq!(source.tracks().len(), 1);
        let packet = source.next_packet(bunnymux_core::TrackId(0)).unwrap().unwrap();
        assert_eq!(packet.data.len(), 4);

        std::fs::remove_file(&dir).ok();
    }

    #[test]
    fn hex_round_trips() {
        let bytes = [0u8, 1, 255, 16];
        let hex = to_hex(&bytes);
        assert_eq!(from_hex(&hex).unwrap(), bytes);
    }
}
