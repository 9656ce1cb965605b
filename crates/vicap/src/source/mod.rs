//! Upstream sensor sources
//!
//! The capture core does not drive sensor hardware. A host wraps its platform
//! motion and camera APIs in these traits; the session checks availability,
//! starts them at the configured rates and consumes their event channels.

#[cfg(feature = "synthetic-source")]
pub mod synthetic;

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::record::{AccelReading, GyroReading, ImageBuffer};

/// Sensor capabilities a session requires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorKind {
    Gyroscope,
    Accelerometer,
    Camera,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Gyroscope => write!(f, "gyroscope"),
            SensorKind::Accelerometer => write!(f, "accelerometer"),
            SensorKind::Camera => write!(f, "camera"),
        }
    }
}

/// One delivery from the motion source
#[derive(Debug, Clone)]
pub enum MotionEvent {
    Gyro(GyroReading),
    Accel(AccelReading),
    /// A failed delivery reported by the platform; capture continues
    Fault { sensor: SensorKind, message: String },
}

/// One delivered camera frame
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub image: ImageBuffer,
    /// Presentation time on the capture device's own clock
    pub presentation_time: Option<Duration>,
}

/// Camera capture configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Target frames per second
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 20,
        }
    }
}

impl CameraConfig {
    /// Minimum time between two frames at the target rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.fps.max(1) as u64)
    }
}

/// Platform gyroscope + accelerometer
pub trait MotionSource: Send {
    /// Whether the device provides `kind`
    fn is_available(&self, kind: SensorKind) -> bool;

    /// Start both sensors at `rate_hz`.
    ///
    /// Deliveries arrive on the returned channel until the source is stopped
    /// or dropped.
    fn start(&mut self, rate_hz: u32) -> Result<mpsc::Receiver<MotionEvent>>;

    /// Stop deliveries
    fn stop(&mut self);
}

/// Platform video capture
pub trait CameraSource: Send {
    fn is_available(&self) -> bool;

    /// Start capture; one [`CameraFrame`] per captured frame
    fn start(&mut self, config: &CameraConfig) -> Result<mpsc::Receiver<CameraFrame>>;

    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_config_is_vga_at_20fps() {
        let config = CameraConfig::default();
        assert_eq!((config.width, config.height, config.fps), (640, 480, 20));
        assert_eq!(config.frame_interval(), Duration::from_millis(50));
    }

    #[test]
    fn zero_fps_does_not_divide_by_zero() {
        let config = CameraConfig {
            fps: 0,
            ..Default::default()
        };
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
    }

    #[test]
    fn sensor_kind_display() {
        assert_eq!(SensorKind::Accelerometer.to_string(), "accelerometer");
    }
}
