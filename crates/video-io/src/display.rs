//! On-screen preview window behind [`FrameDisplay`].

use anyhow::Result;
use opencv::highgui;
use tracing::warn;

use crate::{
    mat::frame_to_mat,
    types::{Frame, FrameDisplay},
};

/// A named highgui window. All windows are destroyed when this drops.
pub struct WindowDisplay {
    title: String,
}

impl WindowDisplay {
    pub fn open(title: &str) -> Result<Self> {
        highgui::named_window(title, highgui::WINDOW_AUTOSIZE)?;
        Ok(Self {
            title: title.to_string(),
        })
    }
}

impl FrameDisplay for WindowDisplay {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        let mat = frame_to_mat(frame)?;
        highgui::imshow(&self.title, &mat)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout_ms: i32) -> Result<Option<char>> {
        let key = highgui::wait_key(timeout_ms)?;
        if key < 0 {
            return Ok(None);
        }
        Ok(char::from_u32((key & 0xff) as u32))
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        if let Err(err) = highgui::destroy_all_windows() {
            warn!("failed to destroy display windows: {err}");
        }
    }
}
