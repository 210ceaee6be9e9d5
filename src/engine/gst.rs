//! GStreamer camera engine
//!
//! ```text
//! v4l2src ! video/x-raw,format=NV12,... ! <jpeg encoder> ! queue ! appsink
//! ```
//!
//! The pipeline is built once and parked in `Ready`. `start` moves it to
//! `Playing`, `stop` back to `Ready`, `shutdown` to `Null`. Samples arrive on
//! a GStreamer streaming thread and go straight into the [`FrameSink`]; bus
//! messages are drained by a dedicated thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use bytes::Bytes;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use parking_lot::Mutex;

use super::sink::{EngineEvent, FrameSink};
use super::{CaptureEngine, EngineError};
use crate::config::Config;

/// Hardware JPEG encoder on Rockchip SoCs
const HARDWARE_ENCODER: &str = "mppjpegenc";
const SOFTWARE_ENCODER: &str = "jpegenc";

/// `videoflip` method for a clockwise rotation in degrees
fn flip_method(rotate: u32) -> &'static str {
    match rotate {
        90 => "clockwise",
        180 => "rotate-180",
        270 => "counterclockwise",
        _ => "none",
    }
}

/// Build the `gst-launch` style pipeline description
///
/// The hardware encoder only applies `pipeline.rotate`; frames keep the
/// capture resolution and the encoder's own quality. `encoder.quality` and
/// `pipeline.width`/`height` take effect on the software path only.
fn pipeline_description(config: &Config, use_hardware: bool) -> String {
    let source = if config.source.fake {
        "videotestsrc is-live=true ! timeoverlay time-mode=buffer-time".to_string()
    } else {
        format!("v4l2src name=src device={}", config.source.device_path())
    };

    let caps = format!(
        "video/x-raw,format=NV12,width={},height={},framerate={}/1",
        config.source.width, config.source.height, config.source.frame_rate
    );

    let encoder = if use_hardware {
        format!("{} rotation={}", HARDWARE_ENCODER, config.pipeline.rotate)
    } else {
        format!(
            "videoflip method={} ! videoscale ! video/x-raw,width={},height={} ! {} quality={}",
            flip_method(config.pipeline.rotate),
            config.pipeline.width,
            config.pipeline.height,
            SOFTWARE_ENCODER,
            config.encoder.quality
        )
    };

    format!(
        "{} ! {} ! {} ! queue max-size-buffers=2 ! appsink name=sink emit-signals=false sync=true",
        source, caps, encoder
    )
}

/// Camera engine backed by a GStreamer pipeline
pub struct GstEngine {
    pipeline: gst::Pipeline,
    bus_running: Arc<AtomicBool>,
    bus_thread: Mutex<Option<JoinHandle<()>>>,
}

impl GstEngine {
    pub fn new(config: &Config, sink: FrameSink) -> Result<Self, EngineError> {
        gst::init().map_err(|e| EngineError::Init(e.to_string()))?;

        let use_hardware =
            config.encoder.hardware && gst::ElementFactory::find(HARDWARE_ENCODER).is_some();
        if use_hardware {
            tracing::info!(encoder = HARDWARE_ENCODER, "Using hardware jpeg encoder");
        } else if gst::ElementFactory::find(SOFTWARE_ENCODER).is_some() {
            tracing::info!(encoder = SOFTWARE_ENCODER, "Using software jpeg encoder");
        } else {
            return Err(EngineError::Init("no suitable jpeg encoder found".into()));
        }

        let description = pipeline_description(config, use_hardware);
        tracing::debug!(pipeline = %description, "Building capture pipeline");

        let pipeline = gst::parse::launch(&description)
            .map_err(|e| EngineError::Init(e.to_string()))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| EngineError::Init("launch description is not a pipeline".into()))?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<gst_app::AppSink>().ok())
            .ok_or_else(|| EngineError::Init("appsink element missing from pipeline".into()))?;

        let sample_sink = sink.clone();
        appsink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                    sample_sink.publish(Bytes::copy_from_slice(map.as_slice()), Instant::now());
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        let bus = pipeline
            .bus()
            .ok_or_else(|| EngineError::Init("pipeline has no bus".into()))?;
        let bus_running = Arc::new(AtomicBool::new(true));
        let bus_thread = {
            let running = Arc::clone(&bus_running);
            let pipeline = pipeline.clone();
            std::thread::Builder::new()
                .name("rockcam-bus".into())
                .spawn(move || watch_bus(bus, pipeline, sink, running))
                .map_err(|e| EngineError::Init(e.to_string()))?
        };

        pipeline
            .set_state(gst::State::Ready)
            .map_err(|e| EngineError::Init(format!("failed to ready pipeline: {}", e)))?;

        Ok(Self {
            pipeline,
            bus_running,
            bus_thread: Mutex::new(Some(bus_thread)),
        })
    }

    fn stop_bus_thread(&self) {
        self.bus_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.bus_thread.lock().take() {
            if handle.join().is_err() {
                tracing::warn!("Bus thread panicked");
            }
        }
    }
}

/// Forward pipeline bus messages as engine events
fn watch_bus(bus: gst::Bus, pipeline: gst::Pipeline, sink: FrameSink, running: Arc<AtomicBool>) {
    use gst::MessageView;

    while running.load(Ordering::SeqCst) {
        let Some(message) = bus.timed_pop(gst::ClockTime::from_mseconds(100)) else {
            continue;
        };

        match message.view() {
            MessageView::StateChanged(change) => {
                let from_pipeline = message
                    .src()
                    .is_some_and(|src| src == pipeline.upcast_ref::<gst::Object>());
                if from_pipeline {
                    sink.report(EngineEvent::StateChanged {
                        from: format!("{:?}", change.old()).to_lowercase(),
                        to: format!("{:?}", change.current()).to_lowercase(),
                    });
                }
            }
            MessageView::Error(err) => {
                let debug = err.debug().map(|d| d.to_string()).unwrap_or_default();
                sink.report(EngineEvent::Fatal(format!("{} ({})", err.error(), debug)));
            }
            MessageView::Warning(warning) => {
                sink.report(EngineEvent::Warning(warning.error().to_string()));
            }
            MessageView::Eos(..) => sink.report(EngineEvent::EndOfStream),
            MessageView::AsyncDone(..) | MessageView::StreamStart(..) | MessageView::NewClock(..) => {}
            other => tracing::debug!(message = ?other, "Bus message"),
        }
    }
}

impl CaptureEngine for GstEngine {
    fn start(&self) -> Result<(), EngineError> {
        tracing::info!("Starting camera");
        self.pipeline
            .set_state(gst::State::Playing)
            .map(|_| ())
            .map_err(|e| EngineError::Start(e.to_string()))
    }

    fn stop(&self) -> Result<(), EngineError> {
        tracing::info!("Stopping camera");
        self.pipeline
            .set_state(gst::State::Ready)
            .map(|_| ())
            .map_err(|e| EngineError::Stop(e.to_string()))
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        tracing::info!("Shutting down camera");
        let result = self
            .pipeline
            .set_state(gst::State::Null)
            .map(|_| ())
            .map_err(|e| EngineError::Shutdown(e.to_string()));
        self.stop_bus_thread();
        result
    }
}

impl Drop for GstEngine {
    fn drop(&mut self) {
        self.bus_running.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncoderConfig, PipelineConfig, SourceConfig};

    #[test]
    fn test_hardware_pipeline_description() {
        let config = Config::default();
        let description = pipeline_description(&config, true);

        assert!(description.starts_with("v4l2src name=src device=/dev/video0 ! "));
        assert!(description.contains("width=1280,height=720,framerate=10/1"));
        assert!(description.contains("mppjpegenc rotation=180 ! queue"));
        assert!(!description.contains("quality="));
        assert!(!description.contains("videoscale"));
        assert!(description.ends_with("appsink name=sink emit-signals=false sync=true"));
    }

    #[test]
    fn test_software_pipeline_description() {
        let config = Config {
            pipeline: PipelineConfig::default().geometry(640, 480).rotate(90),
            source: SourceConfig::default().fake(),
            encoder: EncoderConfig::default().quality(60).software_only(),
        };
        let description = pipeline_description(&config, false);

        assert!(description.starts_with("videotestsrc is-live=true"));
        assert!(description.contains("videoflip method=clockwise"));
        assert!(description.contains("width=640,height=480 ! jpegenc quality=60"));
    }
}
