//! Capture engine adapter
//!
//! The capture engine owns the camera and the JPEG encoder. It runs on its
//! own thread and is only driven through [`CaptureEngine`]; frames and
//! diagnostics come back through the [`FrameSink`] it was built with.
//!
//! Two engines are available:
//! - [`TestPatternEngine`]: software-rendered pattern, always compiled
//! - `GstEngine`: GStreamer camera pipeline, behind the `gstreamer` feature

mod sink;
mod test_pattern;

#[cfg(feature = "gstreamer")]
mod gst;

use std::sync::Arc;

pub use sink::{EngineEvent, FrameSink};
pub use test_pattern::TestPatternEngine;

#[cfg(feature = "gstreamer")]
pub use gst::GstEngine;

use crate::config::Config;

/// Capture engine failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Engine could not be constructed
    #[error("failed to initialize capture engine: {0}")]
    Init(String),
    /// Transition to producing frames failed
    #[error("failed to start capture engine: {0}")]
    Start(String),
    /// Transition to idle failed
    #[error("failed to stop capture engine: {0}")]
    Stop(String),
    /// Final teardown failed
    #[error("failed to shut down capture engine: {0}")]
    Shutdown(String),
}

/// Control interface of a capture engine
///
/// Calls may block while the device changes state. They are serialized by
/// the caller; implementations do not need to handle concurrent transitions.
pub trait CaptureEngine: Send + Sync {
    /// Begin producing frames into the sink
    fn start(&self) -> Result<(), EngineError>;

    /// Stop producing frames and release as much of the device as possible
    fn stop(&self) -> Result<(), EngineError>;

    /// Release the device entirely; the engine is not restarted afterwards
    fn shutdown(&self) -> Result<(), EngineError>;
}

/// Build the engine selected by the configuration
///
/// Without the `gstreamer` feature only the test pattern is available and is
/// used regardless of `source.fake`.
pub fn build(config: &Config, sink: FrameSink) -> Result<Arc<dyn CaptureEngine>, EngineError> {
    #[cfg(feature = "gstreamer")]
    {
        let engine = GstEngine::new(config, sink)?;
        Ok(Arc::new(engine))
    }

    #[cfg(not(feature = "gstreamer"))]
    {
        if !config.source.fake {
            tracing::warn!("Built without GStreamer support, using test pattern source");
        }
        Ok(Arc::new(TestPatternEngine::new(config, sink)))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engine for lifecycle tests

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::{CaptureEngine, EngineError};

    #[derive(Default)]
    pub struct RecordingEngine {
        pub starts: AtomicUsize,
        pub stops: AtomicUsize,
        pub shutdowns: AtomicUsize,
        pub fail_start: AtomicBool,
        pub fail_stop: AtomicBool,
    }

    impl RecordingEngine {
        pub fn starts(&self) -> usize {
            self.starts.load(Ordering::SeqCst)
        }

        pub fn stops(&self) -> usize {
            self.stops.load(Ordering::SeqCst)
        }

        pub fn shutdowns(&self) -> usize {
            self.shutdowns.load(Ordering::SeqCst)
        }
    }

    impl CaptureEngine for RecordingEngine {
        fn start(&self) -> Result<(), EngineError> {
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(EngineError::Start("scripted failure".into()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop.load(Ordering::SeqCst) {
                return Err(EngineError::Stop("scripted failure".into()));
            }
            Ok(())
        }

        fn shutdown(&self) -> Result<(), EngineError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
