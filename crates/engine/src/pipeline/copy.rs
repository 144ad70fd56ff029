// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Bit-exact remux execution (`spec.md` §4.3 "Copy pipeline").
//!
//! Grounded in the teacher's `file_read.rs`/`wav.rs` source-pull shape, stripped to its
//! essentials: no decode, no reordering, just pull → trim-filter → retimestamp → mux.

use std::sync::Arc;

use bunnymux_backends::{MuxerAdapter, PacketSource, TrackHandle};
use bunnymux_core::{state_helpers, ConversionError, TrackDescriptor};
use tokio::sync::Mutex;

use super::{PipelineContext, TrackProgressUpdate};

/// Codecs whose every packet is independently decodable, so there is no need to seek
/// backward to a keyframe when the trim start lands mid-stream.
fn is_all_keyframe_codec(codec: &bunnymux_core::CodecId) -> bool {
    matches!(codec.as_str(), "pcm_f32le" | "pcm_s16le" | "opus" | "flac")
}

pub async fn run(
    descriptor: TrackDescriptor,
    handle: TrackHandle,
    source: Arc<Mutex<Box<dyn PacketSource>>>,
    ctx: &PipelineContext,
) -> Result<(), ConversionError> {
    let track_id = descriptor.id;
    state_helpers::emit_running(&ctx.state_tx, track_id);

    let trim_start = ctx.clock.trim_start();
    // Rounds the effective trim start down to the preceding keyframe (`spec.md` §9):
    // once the seek lands us there, every packet from that keyframe onward is kept,
    // not filtered against the originally requested (later) trim start.
    let effective_start = if is_all_keyframe_codec(&descriptor.codec) {
        trim_start
    } else {
        let mut source = source.lock().await;
        source.seek_to_keyframe(track_id, trim_start)?
    };

    loop {
        if ctx.clock.is_cancelled() {
            return Err(ConversionError::Cancelled);
        }

        let packet = {
            let mut source = source.lock().await;
            source.next_packet(track_id)?
        };

        let Some(packet) = packet else {
            break;
        };

        if !ctx.clock.should_keep_from(packet.pts, packet.duration, effective_start) {
            continue;
        }

        let output_pts = ctx.clock.rebase(packet.pts);
        let output_dts = ctx.clock.rebase(packet.dts);
        let mut retimed = packet;
        retimed.pts = output_pts;
        retimed.dts = output_dts;

        {
            let mut muxer = ctx.muxer.lock().await;
            muxer.write_packet(handle, retimed)?;
        }
        ctx.metrics.packets_muxed.add(1, &[]);

        if let Some(fraction) = ctx.clock.report_progress(track_id, output_pts) {
            let _ = ctx.progress_tx.try_send(TrackProgressUpdate { track_id, fraction });
        }
    }

    // The last packet's pts rarely lands exactly on the track's declared duration, so
    // without this the global fraction would never reach 1.0 on success (`spec.md` §5
    // "reaches 1.0 iff `execute()` returns success"). Force this track's high-water mark
    // to its full duration once there are no more packets to report.
    if let Some(duration) = descriptor.duration {
        if let Some(fraction) = ctx.clock.report_progress(track_id, duration) {
            let _ = ctx.progress_tx.try_send(TrackProgressUpdate { track_id, fraction });
        }
    }

    state_helpers::emit_draining(&ctx.state_tx, track_id);
    Ok(())
}
