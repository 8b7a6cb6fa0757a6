//! Metrics for guildbot.
//!
//! Thin layer over the `metrics` crate facade. Metric names live in the
//! name modules such as [`polls`] and [`votes`]; [`init_metrics`] installs the
//! Prometheus recorder when the `prometheus` feature is enabled.
//!
//! ```rust,ignore
//! use guildbot_metrics::{counter, votes};
//!
//! counter!(votes::CAST_TOTAL).increment(1);
//! ```

mod definitions;
mod recorder;

pub use {
    definitions::*,
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

pub use metrics::{counter, gauge, histogram};
