//! TorchScript-backed object detection.
//!
//! [`Detector`] wraps a `tch::CModule` exported from a YOLO-family model and
//! turns raw BGR frame bytes into [`DetectionBatch`]es in frame pixel
//! coordinates. The [`DetectionSource`] trait is the seam the pipeline
//! depends on, so tests can substitute a scripted detector.

pub use detector::{Detection, DetectionBatch, DetectionSource, Detector};
pub use labels::class_name;

pub mod detector;
pub mod labels;

pub use tch;
