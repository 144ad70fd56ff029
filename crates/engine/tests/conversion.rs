// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end conversion scenarios and boundary behaviors (`spec.md` §8).
//!
//! Grounded in the teacher's `crates/nodes/src/containers/tests.rs` integration-test
//! style: build a small fixture, drive the real component end to end, assert on
//! observable side effects rather than internals. `ConversionController::execute`
//! takes `&self` but still swaps the `Box<dyn MuxerAdapter>` out for a placeholder
//! internally to call its consuming `finalize`/`abort`, so [`CountingMuxer`] reports
//! what it recorded through a shared handle instead of its own (unrecoverable)
//! post-run state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

use bunnymux_backends::test_codecs::{PcmDecoder, PcmEncoder};
use bunnymux_backends::{CodecBackendRegistry, InMemorySource, MuxerAdapter, PacketSource, TrackHandle};
use bunnymux_core::{
    CodecId, ConversionError, Packet, Timestamp, TrackDescriptor, TrackId, TrackKind, TrackParams,
    TrimRequest,
};
use bunnymux_engine::{ConversionController, ConversionRequest, OutputCapabilities, TrackOverrides};

#[derive(Clone, Default)]
struct RecordedCounts {
    per_track: Arc<Mutex<HashMap<u32, Vec<Timestamp>>>>,
    finalized: Arc<AtomicUsize>,
    aborted: Arc<AtomicUsize>,
}

impl RecordedCounts {
    fn packet_count(&self, handle: u32) -> usize {
        self.per_track.lock().unwrap().get(&handle).map_or(0, Vec::len)
    }

    fn pts_sequence(&self, handle: u32) -> Vec<Timestamp> {
        self.per_track.lock().unwrap().get(&handle).cloned().unwrap_or_default()
    }
}

struct CountingMuxer {
    counts: RecordedCounts,
    next_handle: u32,
}

impl CountingMuxer {
    fn new(counts: RecordedCounts) -> Self {
        Self { counts, next_handle: 0 }
    }
}

impl MuxerAdapter for CountingMuxer {
    fn add_track(
        &mut self,
        _kind: TrackKind,
        _codec: &CodecId,
        _codec_private: Option<&bytes::Bytes>,
    ) -> Result<TrackHandle, ConversionError> {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.counts.per_track.lock().unwrap().insert(handle, Vec::new());
        Ok(TrackHandle(handle))
    }

    fn begin(&mut self) -> Result<(), ConversionError> {
        Ok(())
    }

    fn write_packet(&mut self, track: TrackHandle, packet: Packet) -> Result<(), ConversionError> {
        self.counts.per_track.lock().unwrap().entry(track.0).or_default().push(packet.pts);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<(), ConversionError> {
        self.counts.finalized.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn abort(self: Box<Self>) {
        self.counts.aborted.fetch_add(1, Ordering::SeqCst);
    }
}

fn video_descriptor(id: u32, codec: &str) -> TrackDescriptor {
    TrackDescriptor {
        id: TrackId(id),
        codec: CodecId::new(codec),
        params: TrackParams::Video { width: 1920, height: 1080, frame_rate: None },
        duration: Some(Timestamp::new(2, 1)),
        time_base: Timestamp::zero(90000),
        codec_private: Some(bytes::Bytes::from_static(b"sps-pps")),
    }
}

fn audio_descriptor(id: u32, codec: &str, sample_rate: u32, channels: u16) -> TrackDescriptor {
    TrackDescriptor {
        id: TrackId(id),
        codec: CodecId::new(codec),
        params: TrackParams::Audio { sample_rate, channels },
        duration: Some(Timestamp::new(2, 1)),
        time_base: Timestamp::zero(sample_rate),
        codec_private: Some(bytes::Bytes::from_static(b"extradata")),
    }
}

fn packet(track_id: u32, pts_num: i64, time_base: u32, keyframe: bool) -> Packet {
    Packet::new(
        TrackId(track_id),
        bytes::Bytes::from_static(b"packet-payload"),
        Timestamp::new(pts_num, time_base),
        Timestamp::new(pts_num, time_base),
        Timestamp::new(960, time_base),
        keyframe,
    )
}

fn pcm_packet(track_id: u32, pts_num: i64, time_base: u32, samples: &[f32]) -> Packet {
    let mut bytes = Vec::with_capacity(samples.len() * 4);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    Packet::new(
        TrackId(track_id),
        bytes::Bytes::from(bytes),
        Timestamp::new(pts_num, time_base),
        Timestamp::new(pts_num, time_base),
        Timestamp::new(960, time_base),
        true,
    )
}

#[tokio::test]
async fn copy_remux_preserves_track_and_packet_counts() {
    let video = video_descriptor(0, "avc1");
    let audio = audio_descriptor(1, "aac", 48000, 2);

    let video_packets =
        vec![packet(0, 0, 90000, true), packet(0, 3000, 90000, true), packet(0, 6000, 90000, true)];
    let audio_packets = vec![packet(1, 0, 48000, true), packet(1, 960, 48000, true)];

    let source: Box<dyn PacketSource> = Box::new(InMemorySource::new(
        vec![video.clone(), audio.clone()],
        vec![video_packets, audio_packets],
    ));

    let caps = OutputCapabilities {
        video_codecs: vec![CodecId::new("avc1")],
        audio_codecs: vec![CodecId::new("aac")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("aac"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    let controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();
    controller.execute().await.unwrap();

    assert_eq!(counts.finalized.load(Ordering::SeqCst), 1);
    assert_eq!(counts.packet_count(0), 3);
    assert_eq!(counts.packet_count(1), 2);
}

#[tokio::test]
async fn transcode_audio_codec_change_preserves_packet_count_and_pts_order() {
    let descriptor = audio_descriptor(0, "aac_in", 48000, 2);
    // Spaced a full second apart: an audio-only conversion negotiates a 1-unit output
    // time base (no video track to borrow a finer one from), so anything closer
    // together would round to the same output pts and defeat the ordering check below.
    let packets = vec![
        pcm_packet(0, 0, 48000, &[0.1, -0.1, 0.2, -0.2]),
        pcm_packet(0, 48000, 48000, &[0.3, -0.3, 0.4, -0.4]),
        pcm_packet(0, 96000, 48000, &[0.5, -0.5, 0.6, -0.6]),
    ];
    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![packets]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("opus_out")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus_out"),
    };

    let mut registry = CodecBackendRegistry::new();
    let in_codec = CodecId::new("aac_in");
    let out_codec = CodecId::new("opus_out");
    registry.register_decoder(&in_codec, || Box::new(PcmDecoder::new(48000, 2)));
    registry.register_encoder(&out_codec, || Box::new(PcmEncoder::new()));

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    let controller = ConversionController::init(source, muxer, &caps, registry, request).await.unwrap();
    controller.execute().await.unwrap();

    assert_eq!(counts.packet_count(0), 3);
    let pts = counts.pts_sequence(0);
    assert!(pts.windows(2).all(|w| w[0] < w[1]), "expected strictly increasing pts, got {pts:?}");
}

#[tokio::test]
async fn zero_duration_track_with_no_packets_completes_successfully() {
    let mut descriptor = audio_descriptor(0, "pcm_f32le", 48000, 2);
    descriptor.duration = Some(Timestamp::zero(1));

    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![vec![]]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("pcm_f32le")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("pcm_f32le"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    let controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();
    controller.execute().await.unwrap();

    assert_eq!(counts.finalized.load(Ordering::SeqCst), 1);
    assert_eq!(counts.packet_count(0), 0);
}

#[tokio::test]
async fn single_packet_input_copies_exactly_one_packet() {
    let descriptor = audio_descriptor(0, "opus", 48000, 2);
    let packets = vec![packet(0, 0, 48000, true)];
    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![packets]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("opus")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    let controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();
    controller.execute().await.unwrap();

    assert_eq!(counts.packet_count(0), 1);
}

#[tokio::test]
async fn trim_window_past_all_packets_keeps_none() {
    let descriptor = audio_descriptor(0, "opus", 48000, 2);
    let packets = vec![
        packet(0, 5 * 48000, 48000, true),
        packet(0, 6 * 48000, 48000, true),
        packet(0, 7 * 48000, 48000, true),
    ];
    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![packets]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("opus")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    // Audio-only output negotiates a 1-unit time base, so the window is in whole seconds:
    // [0, 1) excludes every packet, which all land at 5s or later.
    let request = ConversionRequest {
        trim: Some(TrimRequest { start_secs: None, end_secs: Some(1.0) }),
        overrides: HashMap::new(),
    };

    let controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();
    controller.execute().await.unwrap();

    assert_eq!(counts.finalized.load(Ordering::SeqCst), 1);
    assert_eq!(counts.packet_count(0), 0);
}

#[tokio::test]
async fn cancelling_before_execute_fails_fast_with_no_packets_written() {
    let descriptor = audio_descriptor(0, "opus", 48000, 2);
    let packets =
        vec![packet(0, 0, 48000, true), packet(0, 960, 48000, true), packet(0, 1920, 48000, true)];
    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![packets]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("opus")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    let controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();
    controller.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_millis(200), controller.execute())
        .await
        .expect("execute should resolve well within the cancellation grace period");

    assert!(matches!(result, Err(ConversionError::Cancelled)));
    assert_eq!(counts.aborted.load(Ordering::SeqCst), 1);
    assert_eq!(counts.packet_count(0), 0);
}

#[tokio::test]
async fn cancelling_concurrently_during_execute_resolves_with_cancelled_within_grace_period() {
    let descriptor = audio_descriptor(0, "opus", 48000, 2);
    let packets: Vec<_> = (0..5000).map(|i| packet(0, i64::from(i) * 960, 48000, true)).collect();
    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![packets]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("opus")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    // `execute` takes `&self`, so a live controller can be shared (via `Arc`) between
    // the task driving the conversion and the caller that cancels it mid-run.
    let controller = Arc::new(
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap(),
    );

    let running = controller.clone();
    let execute_handle = tokio::spawn(async move { running.execute().await });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    controller.cancel();

    let result = tokio::time::timeout(std::time::Duration::from_millis(200), execute_handle)
        .await
        .expect("execute should resolve well within the cancellation grace period")
        .expect("execute task should not panic");

    assert!(matches!(result, Err(ConversionError::Cancelled)));
    assert_eq!(counts.aborted.load(Ordering::SeqCst), 1);
    assert!(
        counts.packet_count(0) < 5000,
        "cancellation should have interrupted the run before every packet was written"
    );
}

#[tokio::test]
async fn discard_override_drops_video_track_entirely() {
    let video = video_descriptor(0, "avc1");
    let audio = audio_descriptor(1, "opus", 48000, 2);
    let video_packets = vec![packet(0, 0, 90000, true)];
    let audio_packets = vec![packet(1, 0, 48000, true), packet(1, 960, 48000, true)];

    let source: Box<dyn PacketSource> = Box::new(InMemorySource::new(
        vec![video, audio],
        vec![video_packets, audio_packets],
    ));

    let caps = OutputCapabilities {
        video_codecs: vec![CodecId::new("avc1")],
        audio_codecs: vec![CodecId::new("opus")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus"),
    };

    let mut overrides = HashMap::new();
    overrides.insert(TrackId(0), TrackOverrides { discard: true, ..Default::default() });

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides };

    let controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();
    controller.execute().await.unwrap();

    // Only the audio track was registered with the muxer; handle 0 is audio here.
    assert_eq!(counts.packet_count(0), 2);
    assert_eq!(counts.packet_count(1), 0);
}

#[tokio::test]
async fn successful_conversion_reports_a_final_progress_fraction_of_one() {
    let descriptor = audio_descriptor(0, "opus", 48000, 2);
    // None of these packets' pts + duration lands exactly on the track's declared
    // 2-second duration, so only a forced final report (not the last packet's own
    // pts) can make the observed fraction reach exactly 1.0.
    let packets =
        vec![packet(0, 0, 48000, true), packet(0, 48000, 48000, true), packet(0, 96000, 48000, true)];
    let source: Box<dyn PacketSource> =
        Box::new(InMemorySource::new(vec![descriptor], vec![packets]));

    let caps = OutputCapabilities {
        video_codecs: vec![],
        audio_codecs: vec![CodecId::new("opus")],
        preferred_video_codec: CodecId::new("avc1"),
        preferred_audio_codec: CodecId::new("opus"),
    };

    let counts = RecordedCounts::default();
    let muxer: Box<dyn MuxerAdapter> = Box::new(CountingMuxer::new(counts.clone()));
    let request = ConversionRequest { trim: None, overrides: HashMap::new() };

    let mut controller =
        ConversionController::init(source, muxer, &caps, CodecBackendRegistry::new(), request)
            .await
            .unwrap();

    let observed = Arc::new(Mutex::new(Vec::<f64>::new()));
    let observed_writer = observed.clone();
    controller.on_progress(Box::new(move |fraction| {
        observed_writer.lock().unwrap().push(fraction);
    }));

    controller.execute().await.unwrap();

    let observed = observed.lock().unwrap();
    let last = *observed.last().expect("at least one progress update should have been observed");
    assert!((last - 1.0).abs() < f64::EPSILON, "expected final fraction to be exactly 1.0, got {last}");
}
