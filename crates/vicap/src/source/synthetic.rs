//! Synthetic sources for development without hardware
//!
//! The motion source reports a device lying flat and slowly rocking; the
//! camera source renders a moving bar over a gradient.

use bytes::Bytes;
use std::f64::consts::PI;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{CameraConfig, CameraFrame, CameraSource, MotionEvent, MotionSource, SensorKind};
use crate::error::Result;
use crate::record::{AccelReading, GyroReading, ImageBuffer, PixelFormat};

/// Synthetic gyroscope + accelerometer
pub struct SyntheticMotion {
    gyro_available: bool,
    accel_available: bool,
    /// Period of the rocking motion
    pub period: Duration,
    cancel: Option<CancellationToken>,
}

impl Default for SyntheticMotion {
    fn default() -> Self {
        Self {
            gyro_available: true,
            accel_available: true,
            period: Duration::from_secs(4),
            cancel: None,
        }
    }
}

impl SyntheticMotion {
    /// Source that reports only the given sensors as present
    pub fn with_sensors(gyro: bool, accel: bool) -> Self {
        Self {
            gyro_available: gyro,
            accel_available: accel,
            period: Duration::from_secs(4),
            cancel: None,
        }
    }
}

impl MotionSource for SyntheticMotion {
    fn is_available(&self, kind: SensorKind) -> bool {
        match kind {
            SensorKind::Gyroscope => self.gyro_available,
            SensorKind::Accelerometer => self.accel_available,
            SensorKind::Camera => false,
        }
    }

    fn start(&mut self, rate_hz: u32) -> Result<mpsc::Receiver<MotionEvent>> {
        self.stop();

        let rate_hz = rate_hz.max(1);
        let (tx, rx) = mpsc::channel(rate_hz as usize);
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let gyro = self.gyro_available;
        let accel = self.accel_available;
        let omega = 2.0 * PI / self.period.as_secs_f64().max(f64::EPSILON);

        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_micros(1_000_000 / rate_hz as u64));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let start = Instant::now();
            info!("Synthetic motion source started: {}Hz", rate_hz);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let t = start.elapsed().as_secs_f64();
                        let rate = 0.2 * omega * (omega * t).cos();
                        let tilt = 0.2 * (omega * t).sin();

                        if gyro {
                            let reading = GyroReading::new(rate, 0.0, 0.01);
                            if tx.send(MotionEvent::Gyro(reading)).await.is_err() {
                                break;
                            }
                        }
                        if accel {
                            let reading = AccelReading::new(0.0, tilt.sin(), -tilt.cos());
                            if tx.send(MotionEvent::Accel(reading)).await.is_err() {
                                break;
                            }
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
            debug!("Synthetic motion source stopped");
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for SyntheticMotion {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Synthetic BGRA camera
pub struct SyntheticCamera {
    available: bool,
    cancel: Option<CancellationToken>,
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        Self {
            available: true,
            cancel: None,
        }
    }
}

impl SyntheticCamera {
    /// Camera that reports itself as missing
    pub fn unavailable() -> Self {
        Self {
            available: false,
            cancel: None,
        }
    }
}

impl CameraSource for SyntheticCamera {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self, config: &CameraConfig) -> Result<mpsc::Receiver<CameraFrame>> {
        self.stop();

        let (tx, rx) = mpsc::channel(config.fps.max(1) as usize);
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        let config = config.clone();

        tokio::spawn(async move {
            let mut ticker = interval(config.frame_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let start = Instant::now();
            let mut frame_num = 0u32;
            info!(
                "Synthetic camera started: {}x{} @ {}fps",
                config.width, config.height, config.fps
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let frame = CameraFrame {
                            image: render_frame(config.width, config.height, frame_num),
                            presentation_time: Some(start.elapsed()),
                        };
                        if tx.send(frame).await.is_err() {
                            break;
                        }
                        frame_num = frame_num.wrapping_add(1);
                    }
                    _ = cancel.cancelled() => break,
                }
            }
            debug!("Synthetic camera stopped after {} frames", frame_num);
        });

        Ok(rx)
    }

    fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Horizontal gradient with a vertical bar that moves one column per frame
pub fn render_frame(width: u32, height: u32, frame_num: u32) -> ImageBuffer {
    let bar = if width > 0 { frame_num % width } else { 0 };
    let mut data = Vec::with_capacity(width as usize * height as usize * 4);
    for y in 0..height {
        for x in 0..width {
            let shade = if x == bar {
                255
            } else {
                (x * 255 / width.max(1)) as u8
            };
            // B, G, R, A
            data.extend_from_slice(&[shade, (y % 256) as u8, 255 - shade, 255]);
        }
    }
    ImageBuffer::new(width, height, PixelFormat::Bgra8, Bytes::from(data))
}
