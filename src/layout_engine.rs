//! Pure geometry: adjacency, snapping and screen assignment.

pub mod detector;
pub mod graph;

pub use detector::Detector;
pub use graph::{Orientation, SnapSide};
