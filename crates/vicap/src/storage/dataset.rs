//! Dataset writer
//!
//! Appends records to the two CSV logs of a session and stores frame images
//! next to them. Every call opens the file in append mode, writes, and closes
//! it again, so no handle outlives a single record and a crash loses at most
//! the record being written.
//!
//! Each log has its own lock. Appends to one file are serialized in call
//! order; the inertial and frame streams never wait on each other.

use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::Mutex;
use tracing::{trace, warn};

use super::{RecordSink, WriterStats};
use crate::error::{CaptureError, Result};
use crate::layout::{SessionLayout, FRAME_HEADER, INERTIAL_HEADER, LINE_END};
use crate::lock_unpoisoned;
use crate::record::{FrameRecord, InertialSample, Stream};

/// Configuration for the dataset writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterConfig {
    /// Call `sync_data` after every append so a returned write is on storage
    pub sync_data: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self { sync_data: true }
    }
}

/// Counters for one log file, guarded by that file's lock
#[derive(Debug, Default)]
struct LogState {
    rows: u64,
    dropped: u64,
    image_bytes: u64,
}

/// Append-only writer for one session's logs and frame images
pub struct DatasetWriter {
    layout: SessionLayout,
    config: WriterConfig,
    inertial_log: Mutex<LogState>,
    frame_log: Mutex<LogState>,
}

impl DatasetWriter {
    /// Create a writer for an initialized layout
    pub fn new(layout: SessionLayout, config: WriterConfig) -> Self {
        Self {
            layout,
            config,
            inertial_log: Mutex::new(LogState::default()),
            frame_log: Mutex::new(LogState::default()),
        }
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    /// Append one row to `imu0/data.csv`
    pub fn append_inertial(&self, sample: &InertialSample) -> Result<()> {
        let mut log = lock_unpoisoned(&self.inertial_log);
        let path = &self.layout.inertial_log_path;

        match append_row(path, INERTIAL_HEADER, &sample.to_csv_row(), self.config.sync_data) {
            Ok(()) => {
                log.rows += 1;
                trace!(timestamp_ns = sample.timestamp_ns, "IMU row appended");
                Ok(())
            }
            Err(source) => {
                log.dropped += 1;
                Err(CaptureError::Write {
                    stream: Stream::Inertial,
                    timestamp_ns: sample.timestamp_ns,
                    path: path.clone(),
                    source,
                })
            }
        }
    }

    /// Write the frame image, then append its row to `cam0/data.csv`.
    ///
    /// If the row cannot be appended the image is removed again, so every
    /// image on disk has exactly one row.
    pub fn append_frame(&self, record: &FrameRecord) -> Result<()> {
        let mut log = lock_unpoisoned(&self.frame_log);
        let image_path = self.layout.frame_path(&record.filename);

        if let Err(source) = write_image(&image_path, &record.pixel_data, self.config.sync_data) {
            log.dropped += 1;
            return Err(CaptureError::Write {
                stream: Stream::Frame,
                timestamp_ns: record.timestamp_ns,
                path: image_path,
                source,
            });
        }

        let log_path = &self.layout.frame_log_path;
        match append_row(log_path, FRAME_HEADER, &record.to_csv_row(), self.config.sync_data) {
            Ok(()) => {
                log.rows += 1;
                log.image_bytes += record.pixel_data.len() as u64;
                trace!(
                    timestamp_ns = record.timestamp_ns,
                    bytes = record.pixel_data.len(),
                    "Frame written"
                );
                Ok(())
            }
            Err(source) => {
                log.dropped += 1;
                if let Err(e) = fs::remove_file(&image_path) {
                    warn!("Failed to remove orphaned image {:?}: {}", image_path, e);
                }
                Err(CaptureError::Write {
                    stream: Stream::Frame,
                    timestamp_ns: record.timestamp_ns,
                    path: log_path.clone(),
                    source,
                })
            }
        }
    }

    /// Snapshot of the write counters
    pub fn stats(&self) -> WriterStats {
        let inertial = lock_unpoisoned(&self.inertial_log);
        let inertial_rows = inertial.rows;
        let inertial_dropped = inertial.dropped;
        drop(inertial);

        let frame = lock_unpoisoned(&self.frame_log);
        WriterStats {
            inertial_rows,
            inertial_dropped,
            frame_rows: frame.rows,
            frame_dropped: frame.dropped,
            image_bytes: frame.image_bytes,
        }
    }
}

impl RecordSink for DatasetWriter {
    fn store_inertial(&self, sample: &InertialSample) {
        if let Err(e) = self.append_inertial(sample) {
            warn!(
                stream = %Stream::Inertial,
                timestamp_ns = sample.timestamp_ns,
                error = %e,
                "Dropping IMU sample"
            );
        }
    }

    fn store_frame(&self, record: &FrameRecord) {
        if let Err(e) = self.append_frame(record) {
            warn!(
                stream = %Stream::Frame,
                timestamp_ns = record.timestamp_ns,
                error = %e,
                "Dropping frame"
            );
        }
    }
}

/// Append `row` to the log at `path`, writing `header` first if the file is new
fn append_row(path: &Path, header: &str, row: &str, sync: bool) -> std::io::Result<()> {
    let (mut file, fresh) = match OpenOptions::new().append(true).create_new(true).open(path) {
        Ok(file) => (file, true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            (OpenOptions::new().append(true).open(path)?, false)
        }
        Err(e) => return Err(e),
    };

    // One write_all per call keeps the row contiguous in the file
    let mut buf = String::with_capacity(header.len() + row.len() + LINE_END.len());
    if fresh {
        buf.push_str(header);
        buf.push_str(LINE_END);
    }
    buf.push_str(row);

    file.write_all(buf.as_bytes())?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}

fn write_image(path: &Path, data: &[u8], sync: bool) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    if sync {
        file.sync_data()?;
    }
    Ok(())
}
