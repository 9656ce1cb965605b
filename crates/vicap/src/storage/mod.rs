//! Storage module for persisting capture records
//!
//! Producers hand finished records to a [`RecordSink`]. The dataset writer is
//! the on-disk sink; it never blocks a producer on a failed write and drops
//! the record instead.

pub mod dataset;

use serde::{Deserialize, Serialize};

use crate::record::{FrameRecord, InertialSample};

/// Destination for finished records.
///
/// Implementations must accept calls from the inertial and frame paths
/// concurrently and preserve call order within each stream.
pub trait RecordSink: Send + Sync {
    /// Persist one inertial sample, logging and dropping it on failure
    fn store_inertial(&self, sample: &InertialSample);

    /// Persist one frame, logging and dropping it on failure
    fn store_frame(&self, record: &FrameRecord);
}

/// Per-stream write counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterStats {
    /// Rows appended to `imu0/data.csv`
    pub inertial_rows: u64,
    /// Inertial samples lost to write failures
    pub inertial_dropped: u64,
    /// Rows appended to `cam0/data.csv`
    pub frame_rows: u64,
    /// Frames lost to write failures
    pub frame_dropped: u64,
    /// Total PNG bytes written
    pub image_bytes: u64,
}

pub use dataset::{DatasetWriter, WriterConfig};

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps every record in memory
    #[derive(Default)]
    pub struct CollectingSink {
        pub inertial: Mutex<Vec<InertialSample>>,
        pub frames: Mutex<Vec<FrameRecord>>,
    }

    impl CollectingSink {
        pub fn inertial(&self) -> Vec<InertialSample> {
            self.inertial.lock().unwrap().clone()
        }

        pub fn frames(&self) -> Vec<FrameRecord> {
            self.frames.lock().unwrap().clone()
        }
    }

    impl RecordSink for CollectingSink {
        fn store_inertial(&self, sample: &InertialSample) {
            self.inertial.lock().unwrap().push(*sample);
        }

        fn store_frame(&self, record: &FrameRecord) {
            self.frames.lock().unwrap().push(record.clone());
        }
    }
}
