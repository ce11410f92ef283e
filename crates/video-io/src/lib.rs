//! OpenCV-backed video input/output for the detection pipeline.
//!
//! Everything that touches a real camera, codec, or window lives here behind
//! the narrow traits in [`types`], so the orchestration loop can be exercised
//! against fakes without any hardware present.

pub use capture::CameraSource;
pub use display::WindowDisplay;
pub use types::{CaptureError, Frame, FrameDisplay, FrameFormat, FrameSink, FrameSource};
pub use writer::{RecordingSink, effective_frame_rate};

pub mod capture;
pub mod display;
mod mat;
pub mod types;
pub mod writer;
