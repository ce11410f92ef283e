use anyhow::Result;
use thiserror::Error;

/// Raw BGR frame pulled from a video source.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: i32,
    pub height: i32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy)]
pub enum FrameFormat {
    Bgr8,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to open video source {uri:?}")]
    Open { uri: String },
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Source of decoded frames (camera, file, network stream).
///
/// `read` returns `Ok(None)` when the stream has ended; transient device
/// errors are reported as `Err` and the caller decides how to stop.
pub trait FrameSource {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Frame dimensions (width, height) as reported when the source opened.
    fn frame_size(&self) -> (i32, i32);

    /// Frame rate reported by the source. May be zero or garbage for
    /// devices that do not know; see [`crate::effective_frame_rate`].
    fn frame_rate(&self) -> f64;
}

/// Destination that persists rendered frames, one synchronous write each.
pub trait FrameSink {
    fn write(&mut self, frame: &Frame) -> Result<()>;
}

/// On-screen presentation surface with a key poll.
pub trait FrameDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Poll for a key press for at most `timeout_ms`, returning the key if
    /// one was pressed.
    fn poll_key(&mut self, timeout_ms: i32) -> Result<Option<char>>;
}
