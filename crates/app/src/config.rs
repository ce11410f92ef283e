use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};

const USAGE: &str = "Usage: spotter [--model <path>] [--camera <index-or-url>] \
[--record] [--output <path>] [--confidence <0-100>]\n\n\
  --model       path to a TorchScript detection model (default: yolov10l.pt)\n\
  --camera      camera index (e.g. '0' or '1') or video stream URL (default: 0)\n\
  --record      also append every annotated frame to the output video file\n\
  --output      where to save the annotated video (default: output.avi)\n\
  --confidence  detection confidence threshold in percent (default: 25)";

/// Resolved run configuration for the unified display / display-and-record
/// pipeline.
#[derive(Clone, Debug)]
pub struct Config {
    pub model: PathBuf,
    pub camera: String,
    pub output: PathBuf,
    pub record: bool,
    /// Confidence threshold as a fraction in `0.0..=1.0`.
    pub confidence: f32,
}

impl Config {
    /// Parse the full process argument vector (`args[0]` is the program
    /// name).
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut model: Option<PathBuf> = None;
        let mut camera: Option<String> = None;
        let mut output: Option<PathBuf> = None;
        let mut record = false;
        let mut confidence: Option<f32> = None;

        let mut idx = 1;
        while idx < args.len() {
            match args[idx].as_str() {
                "--model" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--model requires a value\n\n{USAGE}"))?;
                    model = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--camera" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--camera requires a value\n\n{USAGE}"))?;
                    camera = Some(value.clone());
                    idx += 1;
                }
                "--output" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--output requires a value\n\n{USAGE}"))?;
                    output = Some(PathBuf::from(value));
                    idx += 1;
                }
                "--record" => {
                    record = true;
                    idx += 1;
                }
                "--confidence" => {
                    idx += 1;
                    let value = args
                        .get(idx)
                        .ok_or_else(|| anyhow!("--confidence requires a value\n\n{USAGE}"))?
                        .parse::<f32>()
                        .with_context(|| {
                            "--confidence must be a number between 0 and 100".to_string()
                        })?;
                    if !(0.0..=100.0).contains(&value) {
                        bail!("--confidence must be between 0 and 100");
                    }
                    confidence = Some(value / 100.0);
                    idx += 1;
                }
                "--help" | "-h" => {
                    bail!(USAGE);
                }
                arg => {
                    bail!("Unrecognised argument: {arg}\n\n{USAGE}");
                }
            }
        }

        Ok(Self {
            model: model.unwrap_or_else(|| PathBuf::from("yolov10l.pt")),
            camera: camera.unwrap_or_else(|| "0".to_string()),
            output: output.unwrap_or_else(|| PathBuf::from("output.avi")),
            record,
            confidence: confidence.unwrap_or(0.25),
        })
    }
}
