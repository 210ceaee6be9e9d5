//! Typed configuration sections

use std::time::Duration;

use serde::Deserialize;

/// A named section of the configuration file
///
/// `FIELDS` lists every accepted key; anything else is rejected before
/// deserialization so the error can name the exact `section.key`.
pub(super) trait Section: for<'de> Deserialize<'de> + Default {
    const NAME: &'static str;
    const FIELDS: &'static [&'static str];
}

/// Output geometry and capture lifecycle (`[pipeline]`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Output frame width in pixels
    pub width: u32,
    /// Output frame height in pixels
    pub height: u32,
    /// Clockwise rotation in degrees (0, 90, 180 or 270)
    pub rotate: u32,
    /// Seconds to keep capturing after the last consumer leaves
    pub idle_timeout: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            rotate: 180,
            idle_timeout: 30.0,
        }
    }
}

impl Section for PipelineConfig {
    const NAME: &'static str = "pipeline";
    const FIELDS: &'static [&'static str] = &["width", "height", "rotate", "idle_timeout"];
}

impl PipelineConfig {
    /// Set the output geometry
    pub fn geometry(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set rotation in degrees
    pub fn rotate(mut self, degrees: u32) -> Self {
        self.rotate = degrees;
        self
    }

    /// Set idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout.as_secs_f64();
        self
    }

    /// Idle timeout as a `Duration`
    ///
    /// Out-of-range values collapse to zero; [`Config::validate`](super::Config::validate)
    /// rejects them at load time.
    pub fn idle_timeout_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.idle_timeout).unwrap_or(Duration::ZERO)
    }
}

/// Capture device selection (`[source]`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Use a synthetic test pattern instead of the camera
    pub fake: bool,
    /// Video device index (`/dev/video<N>`)
    pub device: u32,
    /// Capture width requested from the device
    pub width: u32,
    /// Capture height requested from the device
    pub height: u32,
    /// Capture frame rate
    pub frame_rate: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            fake: false,
            device: 0,
            width: 1280,
            height: 720,
            frame_rate: 10,
        }
    }
}

impl Section for SourceConfig {
    const NAME: &'static str = "source";
    const FIELDS: &'static [&'static str] = &["fake", "device", "width", "height", "frame_rate"];
}

impl SourceConfig {
    /// Switch to the synthetic test pattern
    pub fn fake(mut self) -> Self {
        self.fake = true;
        self
    }

    /// Set the capture resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the capture frame rate
    pub fn frame_rate(mut self, fps: u32) -> Self {
        self.frame_rate = fps;
        self
    }

    /// Device node path
    pub fn device_path(&self) -> String {
        format!("/dev/video{}", self.device)
    }

    /// Time between two captured frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}

/// JPEG encoder settings (`[encoder]`)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EncoderConfig {
    /// JPEG quality, 1-100
    pub quality: u8,
    /// Prefer a hardware encoder when one is available
    pub hardware: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            hardware: true,
        }
    }
}

impl Section for EncoderConfig {
    const NAME: &'static str = "encoder";
    const FIELDS: &'static [&'static str] = &["quality", "hardware"];
}

impl EncoderConfig {
    /// Set JPEG quality
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Never use a hardware encoder
    pub fn software_only(mut self) -> Self {
        self.hardware = false;
        self
    }
}
