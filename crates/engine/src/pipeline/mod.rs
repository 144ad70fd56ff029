// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Track pipeline execution (`spec.md` §4.3).
//!
//! One pipeline per non-discard track, started concurrently by the controller and
//! sharing the muxer, the clock coordinator, and a cancellation signal. Split by plan
//! kind into [`copy`] (bit-exact remux) and [`transcode`] (decode/transform/encode),
//! grounded respectively in the teacher's `file_read.rs` source-node shape and
//! `audio/codecs/opus.rs`'s worker-hosted codec shape.

pub mod copy;
pub mod transcode;

use std::sync::Arc;

use bunnymux_backends::{Decoder, Encoder, MuxerAdapter, PacketSource, TrackHandle};
use bunnymux_core::{state_helpers, ConversionError, PipelineStateUpdate, TrackDescriptor, TrackPlan};
use tokio::sync::{mpsc, Mutex};

use crate::clock::ClockCoordinator;
use crate::metrics::PipelineMetrics;

/// The codec backend instances a `Transcode` plan needs, built once during controller
/// initialization (`spec.md` §4.1: pipelines exclusively own their codec resources).
pub struct TranscodeResources {
    pub decoder: Box<dyn Decoder>,
    pub encoder: Box<dyn Encoder>,
}

/// A global completion fraction, already computed and monotonicity-filtered by
/// [`ClockCoordinator::report_progress`] at the moment a track pipeline advanced past a
/// new high-water output PTS.
#[derive(Debug, Clone, Copy)]
pub struct TrackProgressUpdate {
    pub track_id: bunnymux_core::TrackId,
    pub fraction: f64,
}

/// Shared context every track pipeline needs, regardless of plan kind.
pub struct PipelineContext {
    pub clock: Arc<ClockCoordinator>,
    pub muxer: Arc<Mutex<Box<dyn MuxerAdapter>>>,
    pub progress_tx: mpsc::Sender<TrackProgressUpdate>,
    pub state_tx: Option<mpsc::Sender<PipelineStateUpdate>>,
    pub metrics: Arc<PipelineMetrics>,
}

/// Runs one track plan end to end, dispatching to the copy or transcode executor.
///
/// # Errors
///
/// Returns the first fatal error encountered, or `Cancelled` if the shared cancellation
/// signal trips before completion.
pub async fn run_track_pipeline(
    descriptor: TrackDescriptor,
    plan: TrackPlan,
    resources: Option<TranscodeResources>,
    handle: TrackHandle,
    source: Arc<Mutex<Box<dyn PacketSource>>>,
    ctx: PipelineContext,
) -> Result<(), ConversionError> {
    let track_id = descriptor.id;
    state_helpers::emit_initializing(&ctx.state_tx, track_id);

    let result = match plan {
        TrackPlan::Discard => Ok(()),
        TrackPlan::Copy { .. } => copy::run(descriptor, handle, source, &ctx).await,
        TrackPlan::Transcode { transform_cfg, .. } => {
            let Some(resources) = resources else {
                return Err(ConversionError::InternalInvariant(
                    "transcode plan without codec resources".to_string(),
                ));
            };
            transcode::run(descriptor, handle, source, resources, transform_cfg, &ctx).await
        },
    };

    match &result {
        Ok(()) => state_helpers::emit_done(&ctx.state_tx, track_id),
        Err(ConversionError::Cancelled) => state_helpers::emit_cancelled(&ctx.state_tx, track_id),
        Err(err) => state_helpers::emit_failed(&ctx.state_tx, track_id, err.to_string()),
    }

    result
}
