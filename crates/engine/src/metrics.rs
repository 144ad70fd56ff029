// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Per-pipeline-stage `OpenTelemetry` instruments (`spec.md` §5 ambient stack).
//!
//! Grounded in the teacher's `audio/codecs/opus.rs` (`meter.u64_counter(...)`,
//! `meter.f64_histogram(...)`) and `containers/wav.rs` instrument naming. No OTLP
//! exporter is wired here — that belongs to a host binary, same split the teacher draws
//! between its node library and `apps/skit`'s telemetry setup.

use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};

/// One set of instruments, created once per [`crate::controller::ConversionController`]
/// and shared by every track pipeline it spawns.
pub struct PipelineMetrics {
    pub frames_decoded: Counter<u64>,
    pub frames_encoded: Counter<u64>,
    pub packets_muxed: Counter<u64>,
    pub decode_duration: Histogram<f64>,
    pub encode_duration: Histogram<f64>,
    pub transform_duration: Histogram<f64>,
}

impl PipelineMetrics {
    #[must_use]
    pub fn new() -> Self {
        let meter = global::meter("bunnymux_engine");
        Self {
            frames_decoded: meter.u64_counter("frames_decoded").build(),
            frames_encoded: meter.u64_counter("frames_encoded").build(),
            packets_muxed: meter.u64_counter("packets_muxed").build(),
            decode_duration: meter.f64_histogram("decode_duration").build(),
            encode_duration: meter.f64_histogram("encode_duration").build(),
            transform_duration: meter.f64_histogram("transform_duration").build(),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
