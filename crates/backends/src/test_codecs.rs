// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Minimal codec backends used to exercise transcode pipelines in tests without a real
//! codec dependency.
//!
//! `PcmDecoder`/`PcmEncoder` are the zero-loss codec the round-trip property in
//! `spec.md` §8 ("zero-loss codec ⇒ bit-identical samples") is checked against: they
//! interpret a packet's payload as raw interleaved `f32` samples and never quantize or
//! drop data. `RawVideoDecoder`/`RawVideoEncoder` do the analogous thing for video,
//! treating a packet's payload as a single uncompressed planar frame. Both pairs are
//! grounded in the teacher's `opus.rs` codec shape (configure-then-push, `flush` drains
//! nothing because there's no internal reorder buffer) with the worker-thread plumbing
//! stripped out, since there's no blocking C library call to isolate.

use bunnymux_core::frame_pool::FramePool;
use bunnymux_core::{ColorSpace, ConversionError, DecodedFrame, Packet, PixelBuffer};

use crate::codec::{Decoder, Encoder};

/// Decodes packets whose payload is raw little-endian interleaved `f32` samples.
pub struct PcmDecoder {
    sample_rate: u32,
    channels: u16,
    pool: FramePool<f32>,
}

impl PcmDecoder {
    #[must_use]
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self { sample_rate, channels, pool: FramePool::audio_default() }
    }
}

impl Decoder for PcmDecoder {
    fn decode(
        &mut self,
        packet: &Packet,
        emit: &mut dyn FnMut(DecodedFrame),
    ) -> Result<(), ConversionError> {
        if packet.data.len() % 4 != 0 {
            return Err(ConversionError::DecodeError {
                track_id: packet.track_id.0,
                message: format!("payload length {} not a multiple of 4 bytes", packet.data.len()),
            });
        }
        let sample_count = packet.data.len() / 4;
        let mut pooled = self.pool.get(sample_count);
        for (dst, chunk) in pooled.as_mut_slice().iter_mut().zip(packet.data.chunks_exact(4)) {
            let bytes: [u8; 4] = chunk.try_into().expect("chunks_exact(4) yields 4 bytes");
            *dst = f32::from_le_bytes(bytes);
        }
        let frame_count = sample_count / usize::from(self.channels).max(1);
        emit(DecodedFrame::Audio {
            samples: std::sync::Arc::new(pooled),
            sample_rate: self.sample_rate,
            channels: self.channels,
            pts: packet.pts,
            frame_count,
        });
        Ok(())
    }

    fn flush(&mut self, _emit: &mut dyn FnMut(DecodedFrame)) -> Result<(), ConversionError> {
        Ok(())
    }
}

/// Encodes decoded audio frames back into raw little-endian interleaved `f32` packets.
#[derive(Default)]
pub struct PcmEncoder;

impl PcmEncoder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Encoder for PcmEncoder {
    fn encode(
        &mut self,
        frame: &DecodedFrame,
        emit: &mut dyn FnMut(Packet),
    ) -> Result<(), ConversionError> {
        let DecodedFrame::Audio { samples, pts, .. } = frame else {
            return Err(ConversionError::EncodeError {
                track_id: 0,
                message: "pcm encoder received a non-audio frame".to_string(),
            });
        };
        let mut bytes = Vec::with_capacity(samples.len() * 4);
        for sample in samples.as_slice() {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        emit(Packet::new(
            bunnymux_core::TrackId(0),
            bytes::Bytes::from(bytes),
            *pts,
            *pts,
            bunnymux_core::Timestamp::zero(1),
            true,
        ));
        Ok(())
    }

    fn flush(&mut self, _emit: &mut dyn FnMut(Packet)) -> Result<(), ConversionError> {
        Ok(())
    }
}

/// Decodes packets whose payload is a single uncompressed I420 planar frame.
pub struct RawVideoDecoder {
    width: u32,
    height: u32,
}

impl RawVideoDecoder {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn plane_sizes(&self) -> [usize; 3] {
        let luma = (self.width * self.height) as usize;
        let chroma = luma / 4;
        [luma, chroma, chroma]
    }
}

impl Decoder for RawVideoDecoder {
    fn decode(
        &mut self,
        packet: &Packet,
        emit: &mut dyn FnMut(DecodedFrame),
    ) -> Result<(), ConversionError> {
        let sizes = self.plane_sizes();
        let expected: usize = sizes.iter().sum();
        if packet.data.len() != expected {
            return Err(ConversionError::DecodeError {
                track_id: packet.track_id.0,
                message: format!(
                    "expected I420 frame of {expected} bytes, got {}",
                    packet.data.len()
                ),
            });
        }

        let mut offset = 0;
        let mut planes = Vec::with_capacity(3);
        for size in sizes {
            planes.push(packet.data[offset..offset + size].to_vec());
            offset += size;
        }
        let strides = vec![self.width as usize, self.width as usize / 2, self.width as usize / 2];

        emit(DecodedFrame::Video {
            buffer: std::sync::Arc::new(PixelBuffer::new(planes, strides)),
            width: self.width,
            height: self.height,
            pts: packet.pts,
            color_space: ColorSpace::Bt709,
        });
        Ok(())
    }

    fn flush(&mut self, _emit: &mut dyn FnMut(DecodedFrame)) -> Result<(), ConversionError> {
        Ok(())
    }
}

/// Encodes decoded video frames back into a single uncompressed I420 planar packet.
#[derive(Default)]
pub struct RawVideoEncoder;

impl RawVideoEncoder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Encoder for RawVideoEncoder {
    fn encode(
        &mut self,
        frame: &DecodedFrame,
        emit: &mut dyn FnMut(Packet),
    ) -> Result<(), ConversionError> {
        let DecodedFrame::Video { buffer, pts, .. } = frame else {
            return Err(ConversionError::EncodeError {
                track_id: 0,
                message: "raw video encoder received a non-video frame".to_string(),
            });
        };
        let mut bytes = Vec::new();
        for plane in &buffer.planes {
            bytes.extend_from_slice(plane);
        }
        emit(Packet::new(
            bunnymux_core::TrackId(0),
            bytes::Bytes::from(bytes),
            *pts,
            *pts,
            bunnymux_core::Timestamp::zero(1),
            true,
        ));
        Ok(())
    }

    fn flush(&mut self, _emit: &mut dyn FnMut(Packet)) -> Result<(), ConversionError> {
        Ok(())
    }
}
