//! Capture session
//!
//! One session owns one dataset tree. Starting it checks that every required
//! sensor exists, lays out the directories, then runs three tasks until
//! stopped:
//!
//! - motion pump: feeds gyro/accel deliveries into the aggregator
//! - IMU ticker: fixed-interval aggregator tick
//! - frame pump: encodes frames one at a time, in arrival order
//!
//! The inertial and frame paths share nothing but the clock and the writer,
//! and the writer keeps a separate lock per log file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::capture::{FrameCaptureSink, InertialAggregator, InertialConfig, PeriodicTask};
use crate::clock::{Clock, SystemClock};
use crate::error::{CaptureError, Result};
use crate::layout::{initialize_session, SessionLayout};
use crate::source::{CameraConfig, CameraFrame, CameraSource, MotionEvent, MotionSource, SensorKind};
use crate::storage::{DatasetWriter, WriterConfig, WriterStats};

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Dataset root; `imu0/` and `cam0/` are created inside it
    pub base_path: PathBuf,
    pub inertial: InertialConfig,
    pub camera: CameraConfig,
    pub writer: WriterConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("mav0"),
            inertial: InertialConfig::default(),
            camera: CameraConfig::default(),
            writer: WriterConfig::default(),
        }
    }
}

/// Counters collected over a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub writer: WriterStats,
    /// Aggregator ticks that produced a sample
    pub samples_emitted: u64,
    /// Aggregator ticks before both sensors had reported
    pub ticks_skipped: u64,
    pub frames_encoded: u64,
    /// Frames lost to encode failures
    pub frames_dropped: u64,
    /// Delivery errors reported by the motion source
    pub motion_faults: u64,
}

/// A running capture session
pub struct CaptureSession {
    layout: SessionLayout,
    writer: Arc<DatasetWriter>,
    aggregator: Arc<InertialAggregator>,
    frames: Arc<FrameCaptureSink>,
    motion: Box<dyn MotionSource>,
    camera: Box<dyn CameraSource>,
    motion_faults: Arc<AtomicU64>,
    ticker: Option<PeriodicTask>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl CaptureSession {
    /// Start a session stamped by the system wall clock.
    ///
    /// Must be called from within a Tokio runtime. On a multi-threaded
    /// runtime the IMU tick's disk write runs under `block_in_place`.
    pub fn start<M, C>(config: SessionConfig, motion: M, camera: C) -> Result<Self>
    where
        M: MotionSource + 'static,
        C: CameraSource + 'static,
    {
        Self::start_with_clock(config, motion, camera, Arc::new(SystemClock))
    }

    /// Start a session stamped by `clock`
    pub fn start_with_clock<M, C>(
        config: SessionConfig,
        mut motion: M,
        mut camera: C,
        clock: Arc<dyn Clock>,
    ) -> Result<Self>
    where
        M: MotionSource + 'static,
        C: CameraSource + 'static,
    {
        // Nothing is written until every sensor is known to be present
        for kind in [SensorKind::Gyroscope, SensorKind::Accelerometer] {
            if !motion.is_available(kind) {
                return Err(CaptureError::SensorUnavailable(kind));
            }
        }
        if !camera.is_available() {
            return Err(CaptureError::SensorUnavailable(SensorKind::Camera));
        }

        let layout = initialize_session(&config.base_path)?;
        let writer = Arc::new(DatasetWriter::new(layout.clone(), config.writer.clone()));
        let aggregator = Arc::new(InertialAggregator::new(clock.clone(), writer.clone()));
        let frames = Arc::new(FrameCaptureSink::new(clock, writer.clone()));

        let motion_rx = motion.start(config.inertial.sensor_rate_hz)?;
        let camera_rx = match camera.start(&config.camera) {
            Ok(rx) => rx,
            Err(e) => {
                motion.stop();
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let motion_faults = Arc::new(AtomicU64::new(0));

        tracker.spawn(pump_motion(
            motion_rx,
            aggregator.clone(),
            motion_faults.clone(),
            cancel.clone(),
        ));
        tracker.spawn(pump_frames(camera_rx, frames.clone(), cancel.clone()));

        // The tick appends to disk synchronously. `block_in_place` panics on a
        // current-thread runtime, which ticks inline instead.
        let multi_thread = matches!(
            Handle::current().runtime_flavor(),
            RuntimeFlavor::MultiThread
        );
        let tick_aggregator = aggregator.clone();
        let ticker = PeriodicTask::spawn(
            "imu-tick",
            config.inertial.tick_interval,
            &cancel,
            move || {
                if multi_thread {
                    tokio::task::block_in_place(|| {
                        tick_aggregator.tick();
                    });
                } else {
                    tick_aggregator.tick();
                }
            },
        );

        info!(
            "Capture session started at {:?}: IMU tick {:?}, camera {}x{} @ {}fps",
            layout.root_dir,
            config.inertial.tick_interval,
            config.camera.width,
            config.camera.height,
            config.camera.fps
        );

        Ok(Self {
            layout,
            writer,
            aggregator,
            frames,
            motion: Box::new(motion),
            camera: Box::new(camera),
            motion_faults,
            ticker: Some(ticker),
            cancel,
            tracker,
        })
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    /// Aggregator, for hosts that deliver readings directly
    pub fn aggregator(&self) -> &Arc<InertialAggregator> {
        &self.aggregator
    }

    /// Frame sink, for hosts that deliver frames directly
    pub fn frame_sink(&self) -> &Arc<FrameCaptureSink> {
        &self.frames
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            writer: self.writer.stats(),
            samples_emitted: self.aggregator.samples_emitted(),
            ticks_skipped: self.aggregator.ticks_skipped(),
            frames_encoded: self.frames.frames_encoded(),
            frames_dropped: self.frames.frames_dropped(),
            motion_faults: self.motion_faults.load(Ordering::Relaxed),
        }
    }

    /// Stop the sources and all session tasks, then report the final counters
    pub async fn stop(mut self) -> SessionStats {
        info!("Stopping capture session");
        self.motion.stop();
        self.camera.stop();
        self.cancel.cancel();

        if let Some(ticker) = self.ticker.take() {
            let ticks = ticker.stop().await;
            debug!("IMU ticker ran {} ticks", ticks);
        }
        self.tracker.close();
        self.tracker.wait().await;

        let stats = self.stats();
        info!(
            "Capture session finished: {} IMU rows ({} dropped), {} frames ({} dropped)",
            stats.writer.inertial_rows,
            stats.writer.inertial_dropped,
            stats.writer.frame_rows,
            stats.writer.frame_dropped + stats.frames_dropped
        );
        stats
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn pump_motion(
    mut rx: mpsc::Receiver<MotionEvent>,
    aggregator: Arc<InertialAggregator>,
    faults: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(MotionEvent::Gyro(reading)) => aggregator.on_gyro(reading),
                Some(MotionEvent::Accel(reading)) => aggregator.on_accel(reading),
                Some(MotionEvent::Fault { sensor, message }) => {
                    faults.fetch_add(1, Ordering::Relaxed);
                    warn!(sensor = %sensor, "Motion update error: {}", message);
                }
                None => {
                    info!("Motion source closed");
                    break;
                }
            },
            _ = cancel.cancelled() => break,
        }
    }
}

async fn pump_frames(
    mut rx: mpsc::Receiver<CameraFrame>,
    frames: Arc<FrameCaptureSink>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    info!("Camera source closed");
                    break;
                };
                // Awaiting each frame keeps cam0 rows in delivery order
                let sink = frames.clone();
                let result = tokio::task::spawn_blocking(move || {
                    sink.on_frame(&frame.image, frame.presentation_time);
                })
                .await;
                if let Err(e) = result {
                    warn!("Frame encode task failed: {}", e);
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}
