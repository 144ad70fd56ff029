// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Rational time values.
//!
//! `spec.md` requires PTS/DTS/duration to be "rational time" without naming a
//! representation (see `SPEC_FULL.md` §3.1). A fixed-point `f64` seconds value would
//! silently lose precision across rebases; we keep the exact `numerator / denominator`
//! pair the way container formats express time bases (e.g. 1/90000).

use std::cmp::Ordering;
use std::ops::{Add, Sub};

/// A point or duration in rational time: `numerator / denominator` time-base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    pub numerator: i64,
    pub denominator: u32,
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::zero(1)
    }
}

impl Timestamp {
    #[must_use]
    pub const fn new(numerator: i64, denominator: u32) -> Self {
        Self { numerator, denominator }
    }

    #[must_use]
    pub const fn zero(denominator: u32) -> Self {
        Self { numerator: 0, denominator }
    }

    /// Seconds as floating point, for logging/progress math where exactness isn't required.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_secs_f64(self) -> f64 {
        (self.numerator as f64) / f64::from(self.denominator)
    }

    /// Re-express this timestamp in a different time base, rounding to the nearest unit.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn rebase(self, new_denominator: u32) -> Self {
        if new_denominator == self.denominator {
            return self;
        }
        let numerator = (i128::from(self.numerator) * i128::from(new_denominator))
            / i128::from(self.denominator);
        Self { numerator: numerator as i64, denominator: new_denominator }
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.numerator < 0
    }

    /// Clamp to zero (used by `ClockCoordinator::rebase`, which must never emit negative PTS).
    #[must_use]
    pub fn clamp_non_negative(self) -> Self {
        if self.is_negative() { Self::zero(self.denominator) } else { self }
    }
}

fn cross_multiply(a: Timestamp, b: Timestamp) -> (i128, i128) {
    (i128::from(a.numerator) * i128::from(b.denominator), i128::from(b.numerator) * i128::from(a.denominator))
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        let (lhs, rhs) = cross_multiply(*self, *other);
        lhs.cmp(&rhs)
    }
}

impl Add for Timestamp {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let rhs = rhs.rebase(self.denominator);
        Self { numerator: self.numerator + rhs.numerator, denominator: self.denominator }
    }
}

impl Sub for Timestamp {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let rhs = rhs.rebase(self.denominator);
        Self { numerator: self.numerator - rhs.numerator, denominator: self.denominator }
    }
}

/// A simple rational number, used for frame rates and aspect-preserving dimension math.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    #[must_use]
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}
