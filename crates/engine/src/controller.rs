// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The conversion controller: the top-level orchestrator (`spec.md` §2 item 7, §4.1).
//!
//! Grounded in the teacher's `Engine::run_oneshot_pipeline` (`crates/engine/src/oneshot.rs`):
//! probe input, build/wire the runtime, spawn one task per unit of work, pump a single
//! result channel back to the caller. Unlike the teacher's node-graph wiring this
//! controller's "graph" is fixed-shape (one pipeline per track, all feeding one muxer)
//! so there is no dynamic connection step.

use std::collections::HashMap;
use std::sync::Arc;

use bunnymux_backends::{CodecBackendRegistry, MuxerAdapter, PacketSource, TrackHandle};
use bunnymux_core::{
    state_helpers, ConversionError, PipelineStateUpdate, ProgressThrottle, TrackDescriptor,
    TrackKind, TrackPlan, TrimWindow,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

use crate::clock::ClockCoordinator;
use crate::constants::{DEFAULT_PROGRESS_THROTTLE_HZ, PROGRESS_CHANNEL_CAPACITY, STATE_CHANNEL_CAPACITY};
use crate::metrics::PipelineMetrics;
use crate::negotiate::{plan_track, OutputCapabilities, TrackOverrides};
use crate::pipeline::{self, PipelineContext, TrackProgressUpdate, TranscodeResources};

/// Per-track user request, keyed by track id (`spec.md` §6 user-facing surface).
pub type TrackOverridesMap = HashMap<bunnymux_core::TrackId, TrackOverrides>;

/// What the controller needs to initialize: the probed input, the output format's
/// capabilities, per-track overrides, and the requested trim window.
pub struct ConversionRequest {
    pub trim: Option<bunnymux_core::TrimRequest>,
    pub overrides: TrackOverridesMap,
}

/// A single `fraction ∈ [0, 1]` observer, invoked at most at the configured rate
/// (`spec.md` §4.1 `on_progress`).
pub type ProgressObserver = Box<dyn Fn(f64) + Send + Sync>;

struct PlannedTrack {
    descriptor: TrackDescriptor,
    plan: TrackPlan,
    handle: TrackHandle,
}

/// Owns all track pipelines, the muxer adapter, and the clock coordinator for one
/// conversion (`spec.md` §3 "Ownership").
///
/// Every field that `execute` needs to mutate is already behind its own lock or atomic
/// (`source`, `muxer`, `clock`, `progress_observer`), so `execute` and `cancel` both take
/// `&self`: a caller can hold the controller behind an `Arc`, spawn `execute()` onto a
/// task, and call `cancel()` from elsewhere while it runs (`spec.md` §4.1 "`execute()`,
/// `cancel()`, `on_progress(cb)`" as concurrent API surface).
pub struct ConversionController {
    source: Arc<Mutex<Box<dyn PacketSource>>>,
    muxer: Arc<Mutex<Box<dyn MuxerAdapter>>>,
    registry: Arc<CodecBackendRegistry>,
    clock: Arc<ClockCoordinator>,
    planned: Vec<PlannedTrack>,
    progress_observer: Mutex<Option<ProgressObserver>>,
}

impl ConversionController {
    /// Probes the input, negotiates a plan per track, and pre-opens the muxer with the
    /// final list of output tracks (`spec.md` §4.1 "Initialization algorithm").
    ///
    /// # Errors
    ///
    /// `IncompatibleRequest` if a user override cannot be satisfied, `NoOutputTracks` if
    /// every track was discarded or unsupported.
    pub async fn init(
        source: Box<dyn PacketSource>,
        mut muxer: Box<dyn MuxerAdapter>,
        output_caps: &OutputCapabilities,
        registry: CodecBackendRegistry,
        request: ConversionRequest,
    ) -> Result<Self, ConversionError> {
        let registry = Arc::new(registry);
        let descriptors = source.tracks().to_vec();

        let mut planned = Vec::new();
        for descriptor in &descriptors {
            let overrides = request.overrides.get(&descriptor.id).cloned().unwrap_or_default();
            let plan = plan_track(descriptor, &overrides, output_caps, &registry)?;
            if plan.is_discard() {
                continue;
            }

            let codec_private = match &plan {
                TrackPlan::Copy { codec_private, .. } => codec_private.clone(),
                _ => None,
            };
            let encoder_codec = match &plan {
                TrackPlan::Copy { source_codec, .. } => source_codec.clone(),
                TrackPlan::Transcode { encoder_cfg, .. } => encoder_cfg.codec.clone(),
                TrackPlan::Discard => unreachable!("discard plans are filtered above"),
            };

            let handle = muxer.add_track(descriptor.kind(), &encoder_codec, codec_private.as_ref())?;
            planned.push(PlannedTrack { descriptor: descriptor.clone(), plan, handle });
        }

        if planned.is_empty() {
            return Err(ConversionError::NoOutputTracks);
        }

        let output_time_base = planned
            .iter()
            .find(|t| t.descriptor.kind() == TrackKind::Video)
            .map_or_else(|| bunnymux_core::Timestamp::zero(1), |t| bunnymux_core::Timestamp::zero(90000));

        let mut track_durations = HashMap::new();
        for track in &planned {
            if let Some(duration) = track.descriptor.duration {
                track_durations.insert(track.descriptor.id, duration);
            }
        }

        let trim = resolve_trim_window(request.trim, output_time_base);
        let clock = Arc::new(ClockCoordinator::new(trim, output_time_base, track_durations));

        Ok(Self {
            source: Arc::new(Mutex::new(source)),
            muxer: Arc::new(Mutex::new(muxer)),
            registry,
            clock,
            planned,
            progress_observer: Mutex::new(None),
        })
    }

    /// Registers the single progress observer (`spec.md` §4.1 `on_progress`). Call this
    /// before sharing the controller across tasks; `execute` takes the observer once, at
    /// the start of the run.
    pub fn on_progress(&mut self, observer: ProgressObserver) {
        self.progress_observer = Mutex::new(Some(observer));
    }

    /// Runs every planned pipeline to completion (`spec.md` §4.1 "Execution algorithm").
    ///
    /// # Errors
    ///
    /// The first fatal error from any pipeline, or `Cancelled` if `cancel()` was called
    /// first. On success, `muxer.finalize()` has been called; on failure or
    /// cancellation, `muxer.abort()` has been called instead.
    pub async fn execute(&self) -> Result<(), ConversionError> {
        {
            let mut muxer = self.muxer.lock().await;
            muxer.begin()?;
        }

        let (progress_tx, progress_rx) = mpsc::channel::<TrackProgressUpdate>(PROGRESS_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = mpsc::channel::<PipelineStateUpdate>(STATE_CHANNEL_CAPACITY);
        drop(state_rx);

        let observer = self.progress_observer.lock().await.take();
        let progress_task = tokio::spawn(run_progress_relay(progress_rx, observer));
        let metrics = Arc::new(PipelineMetrics::new());

        let mut join_set = JoinSet::new();
        for track in &self.planned {
            let resources = match &track.plan {
                TrackPlan::Transcode { decoder_cfg, encoder_cfg, .. } => Some(TranscodeResources {
                    decoder: self.registry.build_decoder(&decoder_cfg.codec)?,
                    encoder: self.registry.build_encoder(&encoder_cfg.codec)?,
                }),
                _ => None,
            };

            let ctx = PipelineContext {
                clock: self.clock.clone(),
                muxer: self.muxer.clone(),
                progress_tx: progress_tx.clone(),
                state_tx: Some(state_tx.clone()),
                metrics: metrics.clone(),
            };
            let source = self.source.clone();
            join_set.spawn(pipeline::run_track_pipeline(
                track.descriptor.clone(),
                track.plan.clone(),
                resources,
                track.handle,
                source,
                ctx,
            ));
        }
        drop(progress_tx);
        drop(state_tx);

        while let Some(joined) = join_set.join_next().await {
            if let Err(err) = joined? {
                self.clock.fail(err);
            }
        }

        let _ = progress_task.await;

        let mut muxer = self.muxer.lock().await;
        let owned = std::mem::replace(&mut *muxer, Box::new(NullMuxer));
        if let Some(err) = self.clock.take_root_cause() {
            owned.abort();
            return Err(err);
        }
        owned.finalize()
    }

    /// Signals cancellation; resolves once every pipeline has released its resources
    /// (`spec.md` §4.1 `cancel`, §5 "Cancellation semantics").
    pub fn cancel(&self) {
        self.clock.cancel();
    }
}

/// A placeholder left behind by `std::mem::replace` once the real muxer has been
/// consumed by `finalize`/`abort`; never observed outside that swap.
struct NullMuxer;

impl MuxerAdapter for NullMuxer {
    fn add_track(
        &mut self,
        _kind: TrackKind,
        _codec: &bunnymux_core::CodecId,
        _codec_private: Option<&bytes::Bytes>,
    ) -> Result<TrackHandle, ConversionError> {
        Err(ConversionError::InternalInvariant("add_track called on consumed muxer".to_string()))
    }

    fn begin(&mut self) -> Result<(), ConversionError> {
        Err(ConversionError::InternalInvariant("begin called on consumed muxer".to_string()))
    }

    fn write_packet(
        &mut self,
        _track: TrackHandle,
        _packet: bunnymux_core::Packet,
    ) -> Result<(), ConversionError> {
        Err(ConversionError::InternalInvariant("write_packet called on consumed muxer".to_string()))
    }

    fn finalize(self: Box<Self>) -> Result<(), ConversionError> {
        Ok(())
    }

    fn abort(self: Box<Self>) {}
}

fn resolve_trim_window(
    request: Option<bunnymux_core::TrimRequest>,
    output_time_base: bunnymux_core::Timestamp,
) -> TrimWindow {
    let Some(request) = request else { return TrimWindow::unbounded() };
    let denom = output_time_base.denominator.max(1);
    #[allow(clippy::cast_possible_truncation)]
    let start = request
        .start_secs
        .map_or_else(|| bunnymux_core::Timestamp::zero(denom), |s| bunnymux_core::Timestamp::new((s * f64::from(denom)) as i64, denom));
    #[allow(clippy::cast_possible_truncation)]
    let end = request
        .end_secs
        .map(|s| bunnymux_core::Timestamp::new((s * f64::from(denom)) as i64, denom));
    TrimWindow::new(start, end)
}

/// Forwards the already-computed global fraction from each pipeline's progress reports
/// to the caller's observer, rate-limited to `DEFAULT_PROGRESS_THROTTLE_HZ`
/// (`spec.md` §9 "Progress throttling"). Exists to decouple pipeline tasks from a
/// potentially slow observer callback: pipelines `try_send` and move on, this task owns
/// the only blocking wait on the observer.
async fn run_progress_relay(mut progress_rx: mpsc::Receiver<TrackProgressUpdate>, observer: Option<ProgressObserver>) {
    let Some(observer) = observer else {
        while progress_rx.recv().await.is_some() {}
        return;
    };

    let mut throttle = ProgressThrottle::new(DEFAULT_PROGRESS_THROTTLE_HZ);
    while let Some(update) = progress_rx.recv().await {
        if let Some(fraction) = throttle.maybe_emit(update.fraction) {
            observer(fraction);
        }
    }
}

#[cfg(test)]
mod tests {
    use bunnymux_backends::test_codecs::{PcmDecoder, PcmEncoder};
    use bunnymux_backends::{InMemorySource, RecordingMuxer};
    use bunnymux_core::{CodecId, Timestamp, TrackId, TrackParams};

    use super::*;

    fn caps() -> OutputCapabilities {
        OutputCapabilities {
            video_codecs: vec![],
            audio_codecs: vec![CodecId::new("pcm_f32le")],
            preferred_video_codec: CodecId::new("avc1"),
            preferred_audio_codec: CodecId::new("pcm_f32le"),
        }
    }

    fn registry() -> CodecBackendRegistry {
        let mut registry = CodecBackendRegistry::new();
        let pcm = CodecId::new("pcm_f32le");
        registry.register_decoder(&pcm, || Box::new(PcmDecoder::new(48000, 2)));
        registry.register_encoder(&pcm, || Box::new(PcmEncoder::new()));
        registry
    }

    #[tokio::test]
    async fn empty_track_list_fails_no_output_tracks() {
        let source: Box<dyn PacketSource> = Box::new(InMemorySource::new(vec![], vec![]));
        let muxer: Box<dyn MuxerAdapter> = Box::new(RecordingMuxer::new());
        let request = ConversionRequest { trim: None, overrides: HashMap::new() };

        let err = ConversionController::init(source, muxer, &caps(), registry(), request)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::NoOutputTracks));
    }

    #[tokio::test]
    async fn single_track_copy_executes_successfully() {
        let descriptor = TrackDescriptor {
            id: TrackId(0),
            codec: CodecId::new("pcm_f32le"),
            params: TrackParams::Audio { sample_rate: 48000, channels: 2 },
            duration: Some(Timestamp::new(1, 1)),
            time_base: Timestamp::zero(48000),
            codec_private: Some(bytes::Bytes::from_static(b"x")),
        };
        let packet = bunnymux_core::Packet::new(
            TrackId(0),
            bytes::Bytes::from_static(&[0u8; 16]),
            Timestamp::zero(48000),
            Timestamp::zero(48000),
            Timestamp::new(960, 48000),
            true,
        );
        let source: Box<dyn PacketSource> =
            Box::new(InMemorySource::new(vec![descriptor], vec![vec![packet]]));
        let muxer: Box<dyn MuxerAdapter> = Box::new(RecordingMuxer::new());
        let request = ConversionRequest { trim: None, overrides: HashMap::new() };

        let controller =
            ConversionController::init(source, muxer, &caps(), registry(), request).await.unwrap();
        controller.execute().await.unwrap();
    }
}
