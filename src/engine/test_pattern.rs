//! Software test pattern engine
//!
//! Renders a scrolling colour pattern at the capture resolution, applies the
//! configured rotation and output scaling, and JPEG-encodes it on a worker
//! thread. Used for `source.fake = true` and for builds without GStreamer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ImageResult, Rgb, RgbImage};
use parking_lot::Mutex;

use super::sink::{EngineEvent, FrameSink};
use super::{CaptureEngine, EngineError};
use crate::config::Config;

/// Rendering parameters resolved from the configuration
#[derive(Debug, Clone)]
struct PatternSettings {
    capture_width: u32,
    capture_height: u32,
    output_width: u32,
    output_height: u32,
    rotate: u32,
    quality: u8,
    interval: Duration,
}

impl PatternSettings {
    fn from_config(config: &Config) -> Self {
        Self {
            capture_width: config.source.width,
            capture_height: config.source.height,
            output_width: config.pipeline.width,
            output_height: config.pipeline.height,
            rotate: config.pipeline.rotate,
            quality: config.encoder.quality,
            interval: config.source.frame_interval(),
        }
    }

    /// Render and encode frame number `index`
    fn render(&self, index: u64) -> ImageResult<Vec<u8>> {
        let offset = (index.wrapping_mul(8) % u64::from(u32::MAX)) as u32;
        let image = RgbImage::from_fn(self.capture_width, self.capture_height, |x, y| {
            let column = x.wrapping_add(offset);
            let band = if (column / 32) % 2 == 0 { 64 } else { 192 };
            Rgb([(column % 256) as u8, (y % 256) as u8, band])
        });

        let image = match self.rotate {
            90 => imageops::rotate90(&image),
            180 => imageops::rotate180(&image),
            270 => imageops::rotate270(&image),
            _ => image,
        };

        let image = if image.dimensions() != (self.output_width, self.output_height) {
            imageops::resize(
                &image,
                self.output_width,
                self.output_height,
                FilterType::Triangle,
            )
        } else {
            image
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(&image)?;
        Ok(jpeg)
    }
}

/// Running capture thread
struct Worker {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct EngineState {
    worker: Option<Worker>,
    shut_down: bool,
}

/// Capture engine producing a synthetic pattern
pub struct TestPatternEngine {
    settings: PatternSettings,
    sink: FrameSink,
    state: Mutex<EngineState>,
}

impl TestPatternEngine {
    pub fn new(config: &Config, sink: FrameSink) -> Self {
        tracing::info!(
            width = config.pipeline.width,
            height = config.pipeline.height,
            rotate = config.pipeline.rotate,
            frame_rate = config.source.frame_rate,
            "Using test pattern source"
        );

        Self {
            settings: PatternSettings::from_config(config),
            sink,
            state: Mutex::new(EngineState::default()),
        }
    }

    fn spawn_worker(&self) -> std::io::Result<Worker> {
        let running = Arc::new(AtomicBool::new(true));
        let settings = self.settings.clone();
        let sink = self.sink.clone();
        let flag = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("rockcam-capture".into())
            .spawn(move || capture_loop(settings, sink, flag))?;

        Ok(Worker { running, handle })
    }

    fn join_worker(&self, worker: Worker) -> Result<(), String> {
        worker.running.store(false, Ordering::SeqCst);
        worker
            .handle
            .join()
            .map_err(|_| "capture thread panicked".to_string())
    }
}

fn capture_loop(settings: PatternSettings, sink: FrameSink, running: Arc<AtomicBool>) {
    let mut index = 0u64;
    let mut next_deadline = Instant::now();

    while running.load(Ordering::SeqCst) {
        match settings.render(index) {
            Ok(jpeg) => {
                sink.publish(jpeg, Instant::now());
            }
            Err(e) => {
                sink.report(EngineEvent::Fatal(format!("jpeg encoding failed: {}", e)));
                return;
            }
        }
        index += 1;

        next_deadline += settings.interval;
        let now = Instant::now();
        if next_deadline > now {
            std::thread::sleep(next_deadline - now);
        } else {
            // Fell behind; don't try to catch up with a burst
            next_deadline = now;
        }
    }
}

impl CaptureEngine for TestPatternEngine {
    fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if state.shut_down {
            return Err(EngineError::Start("engine has been shut down".into()));
        }
        if state.worker.is_some() {
            return Ok(());
        }

        tracing::info!("Starting camera");
        let worker = self
            .spawn_worker()
            .map_err(|e| EngineError::Start(e.to_string()))?;
        state.worker = Some(worker);

        self.sink.report(EngineEvent::StateChanged {
            from: "ready".into(),
            to: "playing".into(),
        });
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        let worker = self.state.lock().worker.take();
        let Some(worker) = worker else {
            return Ok(());
        };

        tracing::info!("Stopping camera");
        self.join_worker(worker).map_err(EngineError::Stop)?;

        self.sink.report(EngineEvent::StateChanged {
            from: "playing".into(),
            to: "ready".into(),
        });
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        let worker = {
            let mut state = self.state.lock();
            if state.shut_down {
                return Ok(());
            }
            state.shut_down = true;
            state.worker.take()
        };

        if let Some(worker) = worker {
            self.join_worker(worker).map_err(EngineError::Shutdown)?;
        }

        self.sink.report(EngineEvent::StateChanged {
            from: "ready".into(),
            to: "null".into(),
        });
        Ok(())
    }
}

impl Drop for TestPatternEngine {
    fn drop(&mut self) {
        if let Some(worker) = self.state.get_mut().worker.take() {
            worker.running.store(false, Ordering::SeqCst);
        }
    }
}
