// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The cross-track clock coordinator (`spec.md` §4.4).
//!
//! Grounded in the teacher's shared-resource policy for the dynamic engine (a
//! `Mutex`-guarded shared struct plus an atomic cancellation flag, `crates/core/src/state.rs`
//! and `crates/engine/src/dynamic_actor.rs`'s control-flow shape), simplified here to the
//! single piece of genuinely shared mutable state a batch conversion needs: the trim
//! window, per-track progress high-water marks, and one cancellation/failure flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use bunnymux_core::{ConversionError, Timestamp, TrackId, TrimWindow};

struct ClockState {
    trim: TrimWindow,
    output_time_base: Timestamp,
    track_durations: HashMap<TrackId, Timestamp>,
    progress_high_water: HashMap<TrackId, Timestamp>,
    last_reported_fraction: f64,
    root_cause: Option<ConversionError>,
}

/// Establishes a common output time origin, applies the trim window, tracks progress,
/// and propagates cancellation/fatal errors across all track pipelines (`spec.md` §4.4).
pub struct ClockCoordinator {
    state: Mutex<ClockState>,
    cancelled: AtomicBool,
}

impl ClockCoordinator {
    #[must_use]
    pub fn new(trim: TrimWindow, output_time_base: Timestamp, track_durations: HashMap<TrackId, Timestamp>) -> Self {
        Self {
            state: Mutex::new(ClockState {
                trim,
                output_time_base,
                track_durations,
                progress_high_water: HashMap::new(),
                last_reported_fraction: 0.0,
                root_cause: None,
            }),
            cancelled: AtomicBool::new(false),
        }
    }

    /// `output_pts = (source_pts - trim.start) * scale`, clamped at 0.
    #[must_use]
    pub fn rebase(&self, source_pts: Timestamp) -> Timestamp {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        let shifted = source_pts - state.trim.start;
        shifted.clamp_non_negative().rebase(state.output_time_base.denominator)
    }

    /// The trim window's start, in source time base, for backends that need to seek
    /// (`spec.md` §4.3 copy-pipeline keyframe rounding).
    #[must_use]
    pub fn trim_start(&self) -> Timestamp {
        #[allow(clippy::unwrap_used)]
        self.state.lock().unwrap().trim.start
    }

    /// Inside the trim window: inclusive start, exclusive end.
    #[must_use]
    pub fn should_keep(&self, pts: Timestamp, duration: Timestamp) -> bool {
        self.should_keep_from(pts, duration, self.trim_start())
    }

    /// Like [`Self::should_keep`] but against `effective_start` instead of the
    /// configured trim start. Used by the copy pipeline once it has seeked to the
    /// keyframe preceding the trim start: every packet from the keyframe onward must be
    /// kept, even ones whose pts falls before the originally requested trim start
    /// (`spec.md` §9 "round down silently to the preceding keyframe").
    #[must_use]
    pub fn should_keep_from(&self, pts: Timestamp, duration: Timestamp, effective_start: Timestamp) -> bool {
        #[allow(clippy::unwrap_used)]
        let state = self.state.lock().unwrap();
        let after_start = pts >= effective_start || (pts < effective_start && pts + duration > effective_start);
        after_start && state.trim.end.is_none_or(|end| pts < end)
    }

    /// Records this track's new high-water output PTS and recomputes the global
    /// weighted-duration fraction. Returns `Some(fraction)` only when it should be
    /// delivered to the controller's observer (monotonic non-decreasing, per `spec.md` §5).
    pub fn report_progress(&self, track_id: TrackId, output_pts: Timestamp) -> Option<f64> {
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        let entry = state.progress_high_water.entry(track_id).or_insert_with(|| Timestamp::zero(1));
        if output_pts <= *entry {
            return None;
        }
        *entry = output_pts;

        let total_weight: f64 = state.track_durations.values().map(|d| d.as_secs_f64()).sum();
        let fraction = if total_weight <= 0.0 {
            0.0
        } else {
            let weighted: f64 = state
                .progress_high_water
                .iter()
                .map(|(id, pts)| {
                    let duration = state.track_durations.get(id).copied().unwrap_or_else(|| Timestamp::zero(1));
                    pts.as_secs_f64().min(duration.as_secs_f64())
                })
                .sum();
            (weighted / total_weight).clamp(0.0, 1.0)
        };

        if fraction < state.last_reported_fraction {
            return None;
        }
        state.last_reported_fraction = fraction;
        Some(fraction)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Records the first failure as the conversion's root cause and trips cancellation
    /// for every other pipeline (`spec.md` §7 propagation policy).
    pub fn fail(&self, err: ConversionError) {
        self.cancelled.store(true, Ordering::SeqCst);
        #[allow(clippy::unwrap_used)]
        let mut state = self.state.lock().unwrap();
        if state.root_cause.is_none() {
            state.root_cause = Some(err);
        }
    }

    /// The first error reported via `fail`, if any, consuming it.
    pub fn take_root_cause(&self) -> Option<ConversionError> {
        #[allow(clippy::unwrap_used)]
        self.state.lock().unwrap().root_cause.take()
    }
}
