//! Body pose detection, landmark tracking and gesture heuristics.

pub mod arm;
pub mod detection;
pub mod landmark;
