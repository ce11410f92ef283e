//! Camera / stream capture behind [`FrameSource`].

use opencv::{
    prelude::*,
    videoio::{self, VideoCapture},
};
use tracing::{debug, warn};

use crate::{
    mat::mat_to_frame,
    types::{CaptureError, Frame, FrameSource},
};

/// An open capture handle plus the properties queried once at open time.
///
/// The underlying `VideoCapture` is released exactly once when the source is
/// dropped, whichever way the pipeline exits.
pub struct CameraSource {
    cap: VideoCapture,
    uri: String,
    width: i32,
    height: i32,
    frame_rate: f64,
}

impl CameraSource {
    /// Resolve `spec` and open it.
    ///
    /// A specifier that parses as an integer (or looks like `/dev/videoN`)
    /// selects a local device by index; anything else is opened as a URL or
    /// file path. An unopenable source is fatal to the caller; there is no
    /// retry and no fallback.
    pub fn open(spec: &str) -> Result<Self, CaptureError> {
        let cap = open_video_capture(spec)?;

        let width = cap
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .map_err(|e| CaptureError::Other(e.into()))? as i32;
        let height = cap
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .map_err(|e| CaptureError::Other(e.into()))? as i32;
        let frame_rate = cap
            .get(videoio::CAP_PROP_FPS)
            .map_err(|e| CaptureError::Other(e.into()))?;

        debug!(spec, width, height, frame_rate, "capture source opened");

        Ok(Self {
            cap,
            uri: spec.to_string(),
            width,
            height,
            frame_rate,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl FrameSource for CameraSource {
    fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
        let mut mat = Mat::default();
        let grabbed = self
            .cap
            .read(&mut mat)
            .map_err(|e| CaptureError::Other(e.into()))?;

        let size = mat.size().map_err(|e| CaptureError::Other(e.into()))?;
        if !grabbed || size.width <= 0 || size.height <= 0 {
            // End of stream and device hiccups look the same here.
            return Ok(None);
        }

        let frame = mat_to_frame(&mat).map_err(CaptureError::Other)?;
        Ok(Some(frame))
    }

    fn frame_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.cap.release() {
            warn!("failed to release capture source {}: {err}", self.uri);
        }
    }
}

/// Parse an integer or `/dev/videoX` style specifier into a device index.
pub(crate) fn parse_device_index(spec: &str) -> Option<i32> {
    if let Ok(index) = spec.parse::<i32>() {
        return Some(index);
    }
    if let Some(stripped) = spec.strip_prefix("/dev/video") {
        if !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit()) {
            if let Ok(index) = stripped.parse::<i32>() {
                return Some(index);
            }
        }
    }
    None
}

/// Attempt to open a capture input either by device index or URI.
fn open_video_capture(spec: &str) -> Result<VideoCapture, CaptureError> {
    if let Some(index) = parse_device_index(spec) {
        for backend in [videoio::CAP_V4L, videoio::CAP_ANY] {
            match VideoCapture::new(index, backend) {
                Ok(cap) => {
                    if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? {
                        return Ok(cap);
                    }
                }
                Err(err) => {
                    warn!("failed to open device #{index} with backend {backend}: {err}");
                }
            }
        }
        return Err(CaptureError::Open {
            uri: spec.to_string(),
        });
    }

    match VideoCapture::from_file(spec, videoio::CAP_ANY) {
        Ok(cap) => {
            if cap.is_opened().map_err(|e| CaptureError::Other(e.into()))? {
                return Ok(cap);
            }
        }
        Err(err) => {
            warn!("failed to open {spec}: {err}");
        }
    }

    Err(CaptureError::Open {
        uri: spec.to_string(),
    })
}
