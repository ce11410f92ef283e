//! Output video file sink behind [`FrameSink`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use opencv::{core::Size, prelude::*, videoio::VideoWriter};
use tracing::{debug, warn};

use crate::{
    mat::frame_to_mat,
    types::{Frame, FrameSink},
};

/// Rate used when the source cannot report a sane one.
pub const DEFAULT_FRAME_RATE: f64 = 30.0;

/// Frame rate to configure an output writer with.
///
/// Capture backends report zero, negative, or NaN rates for live devices
/// that do not know their own timing; those all fall back to
/// [`DEFAULT_FRAME_RATE`].
pub fn effective_frame_rate(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        DEFAULT_FRAME_RATE
    }
}

/// An open output video file, appended to once per frame.
///
/// Released exactly once on drop, whichever way the pipeline exits.
pub struct RecordingSink {
    writer: VideoWriter,
    path: PathBuf,
}

impl RecordingSink {
    /// Open `path` for writing with the XVID codec at the given rate and
    /// frame size. Every subsequent [`FrameSink::write`] must carry a frame
    /// of exactly this size.
    pub fn open(path: &Path, frame_rate: f64, frame_size: (i32, i32)) -> Result<Self> {
        let fourcc = VideoWriter::fourcc('X', 'V', 'I', 'D')?;
        let (width, height) = frame_size;
        let writer = VideoWriter::new(
            &path.to_string_lossy(),
            fourcc,
            frame_rate,
            Size::new(width, height),
            true,
        )
        .with_context(|| format!("failed to create video writer at {}", path.display()))?;

        if !writer.is_opened()? {
            bail!("failed to open output video file {}", path.display());
        }

        debug!(path = %path.display(), frame_rate, width, height, "recording sink opened");

        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSink for RecordingSink {
    fn write(&mut self, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        self.writer
            .write(&mat)
            .with_context(|| format!("failed to append frame to {}", self.path.display()))?;
        Ok(())
    }
}

impl Drop for RecordingSink {
    fn drop(&mut self) {
        if let Err(err) = self.writer.release() {
            warn!("failed to release video writer {}: {err}", self.path.display());
        }
    }
}
