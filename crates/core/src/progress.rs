// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Progress accounting (`spec.md` §3 "Progress state", §4.1 `on_progress`, §4.4
//! `report_progress`, §9 "Progress throttling").
//!
//! Grounded in the teacher's `stats::NodeStatsTracker` throttling idiom
//! (time-or-count threshold, `force_send` for a guaranteed final flush), generalized
//! from packet counters to a weighted-by-duration completion fraction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::time::Timestamp;
use crate::track::TrackId;

/// Per-track progress counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackProgress {
    pub bytes_processed: u64,
    pub duration_processed: Timestamp,
}

/// Global progress snapshot handed to `on_progress` observers.
#[derive(Debug, Clone, Default)]
pub struct ProgressState {
    pub per_track: HashMap<TrackId, TrackProgress>,
    pub weighted_fraction: f64,
}

/// Throttles `on_progress` callback delivery to at most `rate_hz`, while guaranteeing the
/// terminal `1.0` update is always delivered exactly once on success even if the previous
/// update was recent (`spec.md` §9).
pub struct ProgressThrottle {
    min_interval: Duration,
    last_emitted: Option<Instant>,
    last_fraction: f64,
    terminal_sent: bool,
}

impl ProgressThrottle {
    #[must_use]
    pub fn new(rate_hz: u64) -> Self {
        let rate_hz = rate_hz.max(1);
        Self {
            min_interval: Duration::from_secs_f64(1.0 / rate_hz as f64),
            last_emitted: None,
            last_fraction: 0.0,
            terminal_sent: false,
        }
    }

    /// Returns `Some(fraction)` if this update should be delivered to the observer now.
    /// `fraction` must already be clamped to `[0, 1]` and monotonic non-decreasing by
    /// the caller (the clock coordinator enforces monotonicity; see `spec.md` §5).
    pub fn maybe_emit(&mut self, fraction: f64) -> Option<f64> {
        debug_assert!(fraction >= self.last_fraction, "progress fraction must be monotonic");

        if (fraction - 1.0).abs() < f64::EPSILON {
            if self.terminal_sent {
                return None;
            }
            self.terminal_sent = true;
            self.last_fraction = fraction;
            self.last_emitted = Some(Instant::now());
            return Some(fraction);
        }

        let should_emit = self
            .last_emitted
            .is_none_or(|last| last.elapsed() >= self.min_interval);
        if !should_emit {
            return None;
        }

        self.last_fraction = fraction;
        self.last_emitted = Some(Instant::now());
        Some(fraction)
    }
}
