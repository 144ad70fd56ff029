// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The decoder/encoder contract (`spec.md` §6 "Codec contract") and a capability
//! registry used to resolve a `CodecId` to a backend during plan negotiation
//! (`spec.md` §4.2).
//!
//! Grounded in the teacher's `NodeRegistry` (`crates/core/src/registry.rs`, a name-keyed
//! factory map consulted when a pipeline graph is instantiated) for the registry shape,
//! and in `audio/codecs/opus.rs`'s worker-hosted codec for the callback-per-output-unit
//! calling convention: a real backend runs its codec on a blocking worker thread and
//! calls back into the pipeline stage as output becomes available, rather than
//! allocating a `Vec` per call.

use bunnymux_core::{CodecId, ConversionError, DecodedFrame, Packet};

/// A stateful decoder for one track, owned by the pipeline stage driving it.
///
/// `decode` is called once per input packet, in order, and invokes `emit` zero or more
/// times (a single packet may produce zero frames during decoder warm-up, or more than
/// one after a format's internal reordering). `flush` drains any frames buffered
/// internally by the decoder once the packet stream ends.
pub trait Decoder: Send {
    fn decode(
        &mut self,
        packet: &Packet,
        emit: &mut dyn FnMut(DecodedFrame),
    ) -> Result<(), ConversionError>;

    fn flush(&mut self, emit: &mut dyn FnMut(DecodedFrame)) -> Result<(), ConversionError>;
}

/// A stateful encoder for one track, owned by the pipeline stage driving it.
///
/// Mirrors [`Decoder`]: `encode` is called once per transformed frame and invokes `emit`
/// zero or more times; `flush` drains any packets buffered internally (e.g. a B-frame
/// reorder window) once the frame stream ends.
pub trait Encoder: Send {
    fn encode(
        &mut self,
        frame: &DecodedFrame,
        emit: &mut dyn FnMut(Packet),
    ) -> Result<(), ConversionError>;

    fn flush(&mut self, emit: &mut dyn FnMut(Packet)) -> Result<(), ConversionError>;
}

/// Builds a configured `Decoder` for one track. Boxed so the registry can hold a
/// heterogeneous set of codec backends behind one map.
pub type DecoderFactory = Box<dyn Fn() -> Box<dyn Decoder> + Send + Sync>;

/// Builds a configured `Encoder` for one track.
pub type EncoderFactory = Box<dyn Fn() -> Box<dyn Encoder> + Send + Sync>;

/// Resolves a [`CodecId`] to a decoder or encoder factory during plan negotiation.
///
/// Analogous to the teacher's `NodeRegistry`: a name-keyed map populated at startup,
/// consulted read-only thereafter. Unlike `NodeRegistry`, there is no dynamic
/// registration of user-supplied node types at runtime — the set of known codecs is
/// fixed once the registry is built.
#[derive(Default)]
pub struct CodecBackendRegistry {
    decoders: std::collections::HashMap<String, DecoderFactory>,
    encoders: std::collections::HashMap<String, EncoderFactory>,
}

impl CodecBackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_decoder<F>(&mut self, codec: &CodecId, factory: F)
    where
        F: Fn() -> Box<dyn Decoder> + Send + Sync + 'static,
    {
        self.decoders.insert(codec.as_str().to_string(), Box::new(factory));
    }

    pub fn register_encoder<F>(&mut self, codec: &CodecId, factory: F)
    where
        F: Fn() -> Box<dyn Encoder> + Send + Sync + 'static,
    {
        self.encoders.insert(codec.as_str().to_string(), Box::new(factory));
    }

    #[must_use]
    pub fn supports_decode(&self, codec: &CodecId) -> bool {
        self.decoders.contains_key(codec.as_str())
    }

    #[must_use]
    pub fn supports_encode(&self, codec: &CodecId) -> bool {
        self.encoders.contains_key(codec.as_str())
    }

    pub fn build_decoder(&self, codec: &CodecId) -> Result<Box<dyn Decoder>, ConversionError> {
        self.decoders
            .get(codec.as_str())
            .map(|factory| factory())
            .ok_or_else(|| ConversionError::UnsupportedCodec(codec.as_str().to_string()))
    }

    pub fn build_encoder(&self, codec: &CodecId) -> Result<Box<dyn Encoder>, ConversionError> {
        self.encoders
            .get(codec.as_str())
            .map(|factory| factory())
            .ok_or_else(|| ConversionError::UnsupportedCodec(codec.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::test_codecs::{PcmDecoder, PcmEncoder};

    use super::*;

    #[test]
    fn registry_reports_support_after_registration() {
        let mut registry = CodecBackendRegistry::new();
        let pcm = CodecId::new("pcm_f32le");
        registry.register_decoder(&pcm, || Box::new(PcmDecoder::new(48000, 2)));
        registry.register_encoder(&pcm, || Box::new(PcmEncoder::new()));

        assert!(registry.supports_decode(&pcm));
        assert!(registry.supports_encode(&pcm));
        assert!(!registry.supports_decode(&CodecId::new("vp9")));
    }

    #[test]
    fn unsupported_codec_errors_on_build() {
        let registry = CodecBackendRegistry::new();
        let err = registry.build_decoder(&CodecId::new("vp9")).unwrap_err();
        assert!(matches!(err, ConversionError::UnsupportedCodec(_)));
    }
}
