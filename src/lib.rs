//! Face, emotion and body pose analysis of recorded videos.
//!
//! The [`analysis`] module drives the per-frame loop: it reads frames from a [`video`] file, runs
//! the [`face`] detector and emotion classifier as well as the [`body`] pose tracker, draws the
//! results onto the frame, and accumulates everything in a [`report::Tally`]. At the end of a run,
//! the tally is rendered into a plain-text [`report::Report`].
//!
//! # Coordinates
//!
//! All 2D coordinates are in image space: X points to the right, Y points *down*. A smaller Y
//! value is higher up on screen, which is what the arm-raise heuristic in [`body::arm`] relies on.
//!
//! # Models
//!
//! Every network is loaded at runtime from a model directory (see [`config::Config`]). The
//! expected file names are listed next to the network types that use them.

use log::LevelFilter;

pub mod analysis;
pub mod body;
pub mod config;
pub mod detection;
pub mod face;
pub mod filter;
pub mod gui;
pub mod image;
pub mod iter;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod rect;
pub mod report;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this library will log at *trace*
/// level. Otherwise, they will log at *debug* level.
///
/// `tract_onnx` will always log at *warn* level. All of this can be overridden with `RUST_LOG`.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
