// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Trim window (`spec.md` §3 "Trim window").

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// `(start, end)` in output time base. Frames strictly outside are dropped; the first
/// kept video frame of each track is emitted with `pts = 0` (the clock coordinator's
/// `rebase` enforces this, not this type).
#[derive(Debug, Clone, Copy)]
pub struct TrimWindow {
    pub start: Timestamp,
    /// `None` means "through end of source".
    pub end: Option<Timestamp>,
}

impl TrimWindow {
    #[must_use]
    pub const fn unbounded() -> Self {
        Self { start: Timestamp::new(0, 1), end: None }
    }

    #[must_use]
    pub const fn new(start: Timestamp, end: Option<Timestamp>) -> Self {
        Self { start, end }
    }

    /// Inclusive start, exclusive end, as required by `ClockCoordinator::should_keep`.
    #[must_use]
    pub fn contains(&self, pts: Timestamp) -> bool {
        pts >= self.start && self.end.is_none_or(|end| pts < end)
    }
}

/// User-facing trim request, expressed in seconds (the controller converts to the
/// negotiated output time base during `init`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema)]
pub struct TrimRequest {
    pub start_secs: Option<f64>,
    pub end_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let window = TrimWindow::new(Timestamp::new(10, 1), Some(Timestamp::new(20, 1)));
        assert!(!window.contains(Timestamp::new(9, 1)));
        assert!(window.contains(Timestamp::new(10, 1)));
        assert!(window.contains(Timestamp::new(19, 1)));
        assert!(!window.contains(Timestamp::new(20, 1)));
    }

    #[test]
    fn unbounded_end_contains_everything_after_start() {
        let window = TrimWindow::new(Timestamp::new(5, 1), None);
        assert!(window.contains(Timestamp::new(1_000_000, 1)));
    }
}
