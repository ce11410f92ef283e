//! Conversions between [`Frame`] buffers and OpenCV `Mat`s.

use anyhow::{Result, anyhow};
use chrono::Utc;
use opencv::{
    core::{Mat, MatTraitConstManual},
    prelude::*,
};

use crate::types::{Frame, FrameFormat};

/// Copy a BGR frame into an owned, continuous 3-channel `Mat`.
pub(crate) fn frame_to_mat(frame: &Frame) -> Result<Mat> {
    let expected = (frame.width as usize) * (frame.height as usize) * 3;
    if frame.data.len() != expected {
        return Err(anyhow!(
            "frame buffer is {} bytes, expected {} for {}x{} BGR",
            frame.data.len(),
            expected,
            frame.width,
            frame.height
        ));
    }

    let flat = Mat::from_slice(&frame.data)?;
    let shaped = flat.reshape(3, frame.height)?;
    Ok(shaped.try_clone()?)
}

/// Copy a continuous BGR `Mat` out into an owned [`Frame`].
pub(crate) fn mat_to_frame(mat: &Mat) -> Result<Frame> {
    let size = mat.size()?;
    let data = mat.data_bytes()?.to_vec();

    Ok(Frame {
        data,
        width: size.width,
        height: size.height,
        timestamp_ms: Utc::now().timestamp_millis(),
        format: FrameFormat::Bgr8,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgr_frame(width: i32, height: i32) -> Frame {
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for i in 0..(width * height) {
            data.push((i % 251) as u8);
            data.push((i % 83) as u8);
            data.push((i % 17) as u8);
        }
        Frame {
            data,
            width,
            height,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        }
    }

    #[test]
    fn frame_survives_round_trip_through_mat() {
        let frame = bgr_frame(8, 6);
        let mat = frame_to_mat(&frame).unwrap();
        let back = mat_to_frame(&mat).unwrap();
        assert_eq!(back.width, 8);
        assert_eq!(back.height, 6);
        assert_eq!(back.data, frame.data);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let mut frame = bgr_frame(4, 4);
        frame.data.pop();
        assert!(frame_to_mat(&frame).is_err());
    }
}
