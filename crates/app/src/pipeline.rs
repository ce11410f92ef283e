//! The capture → inference → annotate → sink loop.
//!
//! One blocking control thread pulls frames from the capture handle, runs
//! the detector, burns annotations in, and hands the rendered frame to the
//! display (and, when recording, the output writer). The loop stops on the
//! first failed read or on the quit key, and is not restartable; every
//! handle is released by drop on the way out.

use anyhow::{Context, Result};
use detect_core::{DetectionSource, Detector, tch::Device};
use tracing::{info, warn};
use video_io::{
    CameraSource, FrameDisplay, FrameSink, FrameSource, RecordingSink, WindowDisplay,
    effective_frame_rate,
};

use crate::{annotation::annotate, config::Config};

const WINDOW_TITLE: &str = "spotter (q to quit)";
const QUIT_KEY: char = 'q';
const KEY_POLL_MS: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StopReason {
    EndOfStream,
    UserQuit,
}

struct LoopSummary {
    frames: u64,
    reason: StopReason,
}

/// Run the pipeline to completion for the given configuration.
pub fn run(config: &Config) -> Result<()> {
    info!("loading model from {}", config.model.display());
    let mut detector = Detector::new(&config.model, Device::cuda_if_available())?
        .with_confidence_threshold(config.confidence);

    let mut source = CameraSource::open(&config.camera)
        .with_context(|| format!("could not open camera/source `{}`", config.camera))?;

    let mut recorder = if config.record {
        let (width, height) = source.frame_size();
        let frame_rate = effective_frame_rate(source.frame_rate());
        Some(RecordingSink::open(
            &config.output,
            frame_rate,
            (width, height),
        )?)
    } else {
        None
    };

    let mut display = WindowDisplay::open(WINDOW_TITLE)?;

    info!(
        "streaming from `{}`, press '{QUIT_KEY}' to quit",
        config.camera
    );
    let summary = run_loop(
        &mut source,
        &mut detector,
        &mut display,
        recorder.as_mut().map(|sink| sink as &mut dyn FrameSink),
    )?;

    match summary.reason {
        StopReason::EndOfStream => info!("stream ended after {} frames", summary.frames),
        StopReason::UserQuit => info!("stopped by user after {} frames", summary.frames),
    }
    if let Some(recorder) = &recorder {
        info!("annotated video saved to {}", recorder.path().display());
    }

    Ok(())
}

/// Drive the loop until end-of-stream or the quit key.
///
/// Failed reads and mid-stream capture errors both stop the loop through
/// the same graceful path; only detector/annotator/sink failures propagate
/// as errors. The quit key is polled once per iteration after the frame is
/// displayed, so cancellation lags the key press by at most one frame.
fn run_loop<S, D, P>(
    source: &mut S,
    detector: &mut D,
    display: &mut P,
    mut recorder: Option<&mut dyn FrameSink>,
) -> Result<LoopSummary>
where
    S: FrameSource + ?Sized,
    D: DetectionSource + ?Sized,
    P: FrameDisplay + ?Sized,
{
    let mut frames = 0u64;
    let reason = loop {
        let frame = match source.read() {
            Ok(Some(frame)) => frame,
            Ok(None) => break StopReason::EndOfStream,
            Err(err) => {
                warn!("frame read failed, stopping: {err}");
                break StopReason::EndOfStream;
            }
        };

        let detections = detector.detect(&frame.data, frame.width, frame.height)?;
        let rendered = annotate(&frame, &detections)?;

        if let Some(sink) = recorder.as_deref_mut() {
            sink.write(&rendered)?;
        }
        display.show(&rendered)?;
        frames += 1;

        if display.poll_key(KEY_POLL_MS)? == Some(QUIT_KEY) {
            break StopReason::UserQuit;
        }
    };

    Ok(LoopSummary { frames, reason })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;
    use detect_core::{Detection, DetectionBatch};
    use video_io::{CaptureError, Frame, FrameFormat};

    use super::*;

    fn test_frame() -> Frame {
        Frame {
            data: vec![0; 4 * 4 * 3],
            width: 4,
            height: 4,
            timestamp_ms: 0,
            format: FrameFormat::Bgr8,
        }
    }

    /// Yields `good_reads` frames, then either a clean end-of-stream or a
    /// read error. Counts read attempts and drops.
    struct ScriptedSource {
        good_reads: usize,
        fail_with_error: bool,
        reads: usize,
        released: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(good_reads: usize, released: Arc<AtomicUsize>) -> Self {
            Self {
                good_reads,
                fail_with_error: false,
                reads: 0,
                released,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Option<Frame>, CaptureError> {
            self.reads += 1;
            if self.reads <= self.good_reads {
                return Ok(Some(test_frame()));
            }
            if self.fail_with_error {
                return Err(CaptureError::Other(anyhow!("device went away")));
            }
            Ok(None)
        }

        fn frame_size(&self) -> (i32, i32) {
            (4, 4)
        }

        fn frame_rate(&self) -> f64 {
            0.0
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedDetector {
        calls: usize,
        per_frame: Vec<Detection>,
    }

    impl ScriptedDetector {
        fn empty() -> Self {
            Self {
                calls: 0,
                per_frame: vec![],
            }
        }

        fn with_one_box() -> Self {
            Self {
                calls: 0,
                per_frame: vec![Detection {
                    bbox: [0.0, 0.0, 2.0, 2.0],
                    score: 0.9,
                    class_id: 0,
                }],
            }
        }
    }

    impl DetectionSource for ScriptedDetector {
        fn detect(&mut self, _bgr: &[u8], _width: i32, _height: i32) -> Result<DetectionBatch> {
            self.calls += 1;
            Ok(DetectionBatch {
                detections: self.per_frame.clone(),
            })
        }
    }

    /// Records shown frames and emits the quit key after frame `quit_after`.
    struct ScriptedDisplay {
        shown: usize,
        quit_after: Option<usize>,
        released: Arc<AtomicUsize>,
    }

    impl ScriptedDisplay {
        fn new(quit_after: Option<usize>, released: Arc<AtomicUsize>) -> Self {
            Self {
                shown: 0,
                quit_after,
                released,
            }
        }
    }

    impl FrameDisplay for ScriptedDisplay {
        fn show(&mut self, _frame: &Frame) -> Result<()> {
            self.shown += 1;
            Ok(())
        }

        fn poll_key(&mut self, _timeout_ms: i32) -> Result<Option<char>> {
            match self.quit_after {
                Some(after) if self.shown >= after => Ok(Some('q')),
                _ => Ok(None),
            }
        }
    }

    impl Drop for ScriptedDisplay {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct CountingSink {
        writes: usize,
        released: Arc<AtomicUsize>,
    }

    impl CountingSink {
        fn new(released: Arc<AtomicUsize>) -> Self {
            Self {
                writes: 0,
                released,
            }
        }
    }

    impl FrameSink for CountingSink {
        fn write(&mut self, _frame: &Frame) -> Result<()> {
            self.writes += 1;
            Ok(())
        }
    }

    impl Drop for CountingSink {
        fn drop(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn processes_every_frame_until_the_stream_ends() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(5, counter.clone());
        let mut detector = ScriptedDetector::with_one_box();
        let mut display = ScriptedDisplay::new(None, counter.clone());
        let mut sink = CountingSink::new(counter.clone());

        let summary =
            run_loop(&mut source, &mut detector, &mut display, Some(&mut sink)).unwrap();

        assert_eq!(summary.frames, 5);
        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(detector.calls, 5);
        assert_eq!(display.shown, 5);
        assert_eq!(sink.writes, 5);
    }

    #[test]
    fn read_errors_stop_the_loop_gracefully() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(2, counter.clone());
        source.fail_with_error = true;
        let mut detector = ScriptedDetector::empty();
        let mut display = ScriptedDisplay::new(None, counter.clone());

        let summary = run_loop(&mut source, &mut detector, &mut display, None).unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.reason, StopReason::EndOfStream);
    }

    #[test]
    fn quit_key_stops_after_the_displayed_frame() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(100, counter.clone());
        let mut detector = ScriptedDetector::empty();
        let mut display = ScriptedDisplay::new(Some(3), counter.clone());

        let summary = run_loop(&mut source, &mut detector, &mut display, None).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(summary.reason, StopReason::UserQuit);
        // No frame 4 is pulled once the quit key has been seen.
        assert_eq!(source.reads, 3);
    }

    #[test]
    fn other_keys_do_not_stop_the_loop() {
        struct ChattyDisplay;
        impl FrameDisplay for ChattyDisplay {
            fn show(&mut self, _frame: &Frame) -> Result<()> {
                Ok(())
            }
            fn poll_key(&mut self, _timeout_ms: i32) -> Result<Option<char>> {
                Ok(Some('p'))
            }
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(4, counter);
        let mut detector = ScriptedDetector::empty();
        let mut display = ChattyDisplay;

        let summary = run_loop(&mut source, &mut detector, &mut display, None).unwrap();

        assert_eq!(summary.frames, 4);
        assert_eq!(summary.reason, StopReason::EndOfStream);
    }

    #[test]
    fn empty_detection_batches_are_not_errors() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut source = ScriptedSource::new(3, counter.clone());
        let mut detector = ScriptedDetector::empty();
        let mut display = ScriptedDisplay::new(None, counter.clone());
        let mut sink = CountingSink::new(counter);

        let summary =
            run_loop(&mut source, &mut detector, &mut display, Some(&mut sink)).unwrap();

        assert_eq!(summary.frames, 3);
        assert_eq!(sink.writes, 3);
    }

    #[test]
    fn handles_are_released_exactly_once_on_every_exit_path() {
        // End of stream.
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut source = ScriptedSource::new(1, counter.clone());
            let mut detector = ScriptedDetector::empty();
            let mut display = ScriptedDisplay::new(None, counter.clone());
            let mut sink = CountingSink::new(counter.clone());
            run_loop(&mut source, &mut detector, &mut display, Some(&mut sink)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        // User quit.
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut source = ScriptedSource::new(10, counter.clone());
            let mut detector = ScriptedDetector::empty();
            let mut display = ScriptedDisplay::new(Some(2), counter.clone());
            let mut sink = CountingSink::new(counter.clone());
            run_loop(&mut source, &mut detector, &mut display, Some(&mut sink)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        // Mid-loop read error.
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let mut source = ScriptedSource::new(2, counter.clone());
            source.fail_with_error = true;
            let mut detector = ScriptedDetector::empty();
            let mut display = ScriptedDisplay::new(None, counter.clone());
            let mut sink = CountingSink::new(counter.clone());
            run_loop(&mut source, &mut detector, &mut display, Some(&mut sink)).unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
