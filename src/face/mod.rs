//! Face detection and facial emotion classification.

pub mod detection;
pub mod emotion;
