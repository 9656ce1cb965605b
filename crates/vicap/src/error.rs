//! Error taxonomy for capture sessions
//!
//! `Setup` and `SensorUnavailable` are fatal and surface from session start.
//! `Encode` and `Write` are recoverable: the affected record is logged and
//! dropped while both streams keep capturing.

use std::path::PathBuf;
use thiserror::Error;

use crate::record::Stream;
use crate::source::SensorKind;

/// Errors raised by the capture core
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Failed to set up dataset at {path:?}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Required sensor unavailable: {0}")]
    SensorUnavailable(SensorKind),

    #[error("Failed to encode frame {timestamp_ns}: {message}")]
    Encode { timestamp_ns: i64, message: String },

    #[error("Failed to append {stream} record {timestamp_ns} to {path:?}: {source}")]
    Write {
        stream: Stream,
        timestamp_ns: i64,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CaptureError {
    /// Whether this error must abort the session rather than drop one record
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::Setup { .. } | CaptureError::SensorUnavailable(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CaptureError>;
