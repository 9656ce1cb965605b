//! Capture module for the inertial and camera streams
//!
//! - Inertial aggregation: latest gyro + accel resampled at a fixed tick rate
//! - Frame capture: rotate, PNG-encode and stamp each delivered frame
//! - Periodic scheduling for the aggregator tick

pub mod frame;
pub mod inertial;
pub mod schedule;

pub use frame::{encode_rotated_png, FrameCaptureSink};
pub use inertial::{InertialAggregator, InertialConfig, LatestSensorState};
pub use schedule::PeriodicTask;
