// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Logging initialization (`spec.md` §9 ambient stack "Logging/tracing").
//!
//! Grounded in `apps/skit/src/logging.rs`'s `init_logging`, stripped to the console-only
//! layer: a batch CLI has no file-rotation or OTLP-export story of its own (that's a
//! long-running server concern — see Non-goals).

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogConfig;

fn env_filter_or_level(default_level: tracing::Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}

/// Installs a single console-writing `tracing` subscriber at the configured level,
/// honoring `RUST_LOG` if set.
pub fn init_logging(log_config: &LogConfig) {
    let level: tracing::Level = log_config.level.into();
    let layer = tracing_subscriber::fmt::layer().with_filter(env_filter_or_level(level));
    tracing_subscriber::registry().with(layer).init();
}
