//! Visual-inertial capture core
//!
//! Records synchronized gyroscope, accelerometer and camera data to disk in
//! the EuRoC MAV dataset layout:
//! - `imu0/data.csv`: one fused inertial sample per aggregator tick
//! - `cam0/data.csv` + `cam0/data/<timestamp>.png`: one rotated PNG per frame
//!
//! Both streams are stamped from one wall clock so the logs share a time base.

pub mod capture;
pub mod clock;
mod error;
pub mod layout;
pub mod record;
mod session;
pub mod source;
pub mod storage;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use capture::{encode_rotated_png, FrameCaptureSink, InertialAggregator, InertialConfig};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CaptureError, Result};
pub use layout::{initialize_session, SessionLayout};
pub use record::{
    AccelReading, FrameRecord, GyroReading, ImageBuffer, InertialSample, PixelFormat, Stream,
};
pub use session::{CaptureSession, SessionConfig, SessionStats};
pub use source::{CameraConfig, CameraFrame, CameraSource, MotionEvent, MotionSource, SensorKind};
pub use storage::{DatasetWriter, RecordSink, WriterConfig, WriterStats};

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
