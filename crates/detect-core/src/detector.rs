use std::path::Path;

use anyhow::{Context, Result, bail};
use tch::{self, Device, Kind, Tensor};

/// Upper bound on detections kept per frame.
const MAX_DETECTIONS: usize = 512;

/// Single detection for one frame, box corners in frame pixel coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// `[x1, y1, x2, y2]` clamped to the frame.
    pub bbox: [f32; 4],
    pub score: f32,
    pub class_id: i64,
}

/// All detections produced for a single frame. May be empty; an empty batch
/// is a normal result, not an error.
#[derive(Debug, Clone, Default)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
}

impl DetectionBatch {
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }
}

/// Inference backend consumed by the pipeline loop.
///
/// `bgr` is a packed `width * height * 3` BGR8 buffer.
pub trait DetectionSource {
    fn detect(&mut self, bgr: &[u8], width: i32, height: i32) -> Result<DetectionBatch>;
}

/// TorchScript-backed detector wrapper.
pub struct Detector {
    module: tch::CModule,
    device: Device,
    input_size: (i64, i64),
    confidence_threshold: f32,
}

impl Detector {
    /// Load a TorchScript module and prepare it for inference.
    ///
    /// A model that cannot be loaded is a startup failure; the pipeline never
    /// begins its loop.
    pub fn new<P: AsRef<Path>>(model_path: P, device: Device) -> Result<Self> {
        let path = model_path.as_ref();
        let module = tch::CModule::load_on_device(path, device)
            .with_context(|| format!("failed to load detection model {}", path.display()))?;
        Ok(Self {
            module,
            device,
            input_size: (640, 640),
            confidence_threshold: 0.25,
        })
    }

    /// Override the confidence threshold used for filtering detections.
    pub fn with_confidence_threshold(mut self, confidence: f32) -> Self {
        self.confidence_threshold = confidence;
        self
    }

    /// Override the (width, height) the module expects as input.
    pub fn with_input_size(mut self, width: i64, height: i64) -> Self {
        self.input_size = (width, height);
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Converts a BGR frame into a normalized RGB CHW tensor at the model
    /// input size.
    fn bgr_to_tensor(&self, bgr: &[u8], width: i32, height: i32) -> Result<Tensor> {
        let expected = (width as usize) * (height as usize) * 3;
        if bgr.len() != expected {
            bail!(
                "unexpected frame buffer size: got {} bytes, expected {}",
                bgr.len(),
                expected
            );
        }

        let (in_w, in_h) = self.input_size;
        let tensor = Tensor::from_slice(bgr)
            .view([height as i64, width as i64, 3])
            .permute([2, 0, 1])
            .flip([0])
            .unsqueeze(0)
            .to_device(self.device)
            .to_kind(Kind::Float)
            / 255.0;

        if (width as i64, height as i64) == (in_w, in_h) {
            return Ok(tensor);
        }
        Ok(tensor.upsample_bilinear2d([in_h, in_w], false, None::<f64>, None::<f64>))
    }

    /// Executes the module and maps raw predictions back to frame pixels.
    fn infer(&self, input: &Tensor, frame_size: (i32, i32)) -> Result<DetectionBatch> {
        let output = self.module.forward_ts(&[input])?;
        let shape = output.size();
        if shape.len() != 3 {
            bail!("unexpected detector output shape: {shape:?}");
        }
        let batch = shape[0];
        let channels = shape[1];
        if batch != 1 {
            bail!("detector expected batch=1 but received {batch}");
        }
        if channels < 5 {
            bail!("detector output requires at least 5 channels (x,y,w,h,conf), got {channels}");
        }

        let preds = output
            .to_device(Device::Cpu)
            .squeeze_dim(0)
            .permute([1, 0])
            .contiguous();

        let rows: Vec<Vec<f32>> = Vec::<Vec<f32>>::try_from(&preds)?;

        Ok(DetectionBatch {
            detections: decode_rows(
                &rows,
                self.confidence_threshold,
                self.input_size,
                frame_size,
            ),
        })
    }
}

impl DetectionSource for Detector {
    fn detect(&mut self, bgr: &[u8], width: i32, height: i32) -> Result<DetectionBatch> {
        let input = self.bgr_to_tensor(bgr, width, height)?;
        self.infer(&input, (width, height))
    }
}

/// Turn raw prediction rows `(cx, cy, w, h, score[, class])` in model-input
/// coordinates into confidence-filtered detections in frame coordinates.
fn decode_rows(
    rows: &[Vec<f32>],
    confidence_threshold: f32,
    input_size: (i64, i64),
    frame_size: (i32, i32),
) -> Vec<Detection> {
    let (in_w, in_h) = input_size;
    let (frame_w, frame_h) = (frame_size.0 as f32, frame_size.1 as f32);
    let scale_x = frame_w / in_w as f32;
    let scale_y = frame_h / in_h as f32;

    let mut detections = Vec::new();
    for row in rows {
        if row.len() < 5 {
            continue;
        }
        let score = row[4];
        if score < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let x1 = ((cx - w / 2.0) * scale_x).clamp(0.0, frame_w - 1.0);
        let y1 = ((cy - h / 2.0) * scale_y).clamp(0.0, frame_h - 1.0);
        let x2 = ((cx + w / 2.0) * scale_x).clamp(0.0, frame_w - 1.0);
        let y2 = ((cy + h / 2.0) * scale_y).clamp(0.0, frame_h - 1.0);

        let class_id = if row.len() > 5 { row[5] as i64 } else { 0 };
        detections.push(Detection {
            bbox: [x1, y1, x2, y2],
            score,
            class_id,
        });
        if detections.len() >= MAX_DETECTIONS {
            break;
        }
    }

    detections
}
