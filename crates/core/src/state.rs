// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pipeline lifecycle state, grounded in the teacher's `NodeState` machine
//! (`crates/core/src/state.rs` in `streamer45-streamkit`) and narrowed to the states a
//! track pipeline actually passes through (`spec.md` §2 item 4, §4.3): a track pipeline
//! has no `Ready`-then-wait-for-`Start` phase (there is no dynamic graph to wire up) and
//! no `Recovering`/`Degraded` phase (encoder retry is a local, invisible detail of the
//! encode stage, not an observable pipeline state; see `spec.md` §4.3 failure semantics).
//!
//! ```text
//!  Initializing -> Running -> Draining -> Done
//!                      \          \
//!                       `--------- Failed { reason }
//!                      \
//!                       `---------- Cancelled
//! ```

use std::time::SystemTime;

use crate::track::TrackId;

/// One track pipeline's lifecycle state.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    /// Decoder/encoder backends are being configured; no packets pulled yet.
    Initializing,
    /// Steady-state processing.
    Running,
    /// Input reached EOF or was trimmed away; flushing decode/transform/encode stages.
    Draining,
    /// All stages flushed and forwarded to the muxer successfully.
    Done,
    /// Terminated by a fatal error (`spec.md` §7).
    Failed { reason: String },
    /// Terminated by cancellation, distinguished from `Failed` (`spec.md` §7).
    Cancelled,
}

impl PipelineState {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed { .. } | Self::Cancelled)
    }
}

/// A state transition, timestamped for logging/diagnostics.
#[derive(Debug, Clone)]
pub struct PipelineStateUpdate {
    pub track_id: TrackId,
    pub state: PipelineState,
    pub timestamp: SystemTime,
}

impl PipelineStateUpdate {
    #[must_use]
    pub fn new(track_id: TrackId, state: PipelineState) -> Self {
        Self { track_id, state, timestamp: SystemTime::now() }
    }
}

/// Best-effort emission helpers, mirroring the teacher's `state_helpers` module: these
/// use `try_send` so a slow or absent observer never blocks the pipeline (`spec.md` §5
/// forbids the controller blocking on anything but the documented suspension points).
pub mod state_helpers {
    use tokio::sync::mpsc;
    use tracing::{debug, info, warn};

    use super::{PipelineState, PipelineStateUpdate};
    use crate::track::TrackId;

    fn emit(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId, state: PipelineState) {
        if let Some(tx) = tx {
            let _ = tx.try_send(PipelineStateUpdate::new(track_id, state));
        }
    }

    pub fn emit_initializing(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId) {
        debug!(?track_id, "pipeline initializing");
        emit(tx, track_id, PipelineState::Initializing);
    }

    pub fn emit_running(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId) {
        debug!(?track_id, "pipeline running");
        emit(tx, track_id, PipelineState::Running);
    }

    pub fn emit_draining(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId) {
        debug!(?track_id, "pipeline draining");
        emit(tx, track_id, PipelineState::Draining);
    }

    pub fn emit_done(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId) {
        info!(?track_id, "pipeline done");
        emit(tx, track_id, PipelineState::Done);
    }

    pub fn emit_failed(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(?track_id, %reason, "pipeline failed");
        emit(tx, track_id, PipelineState::Failed { reason });
    }

    pub fn emit_cancelled(tx: &Option<mpsc::Sender<PipelineStateUpdate>>, track_id: TrackId) {
        info!(?track_id, "pipeline cancelled");
        emit(tx, track_id, PipelineState::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Cancelled.is_terminal());
        assert!(PipelineState::Failed { reason: "x".into() }.is_terminal());
        assert!(!PipelineState::Running.is_terminal());
    }
}
