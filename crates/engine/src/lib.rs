// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! bunnymux-engine: plan negotiation, clock coordination, and track pipeline execution
//! for the Mediabunny conversion pipeline (`spec.md` §2, §4).
//!
//! ## Modules
//!
//! - [`negotiate`]: turns a track descriptor plus user overrides into a `TrackPlan`
//! - [`clock`]: the cross-track output clock and cancellation/failure signal
//! - [`pipeline`]: per-track execution (copy and transcode)
//! - [`controller`]: the top-level orchestrator tying the above together
//! - [`constants`]: channel capacities, retry/throttle tunables
//! - [`metrics`]: per-pipeline-stage `OpenTelemetry` instruments

pub mod clock;
pub mod constants;
pub mod controller;
pub mod metrics;
pub mod negotiate;
pub mod pipeline;

pub use clock::ClockCoordinator;
pub use controller::{ConversionController, ConversionRequest, ProgressObserver, TrackOverridesMap};
pub use metrics::PipelineMetrics;
pub use negotiate::{plan_track, OutputCapabilities, TrackOverrides};
pub use pipeline::{run_track_pipeline, PipelineContext, TrackProgressUpdate, TranscodeResources};
