//! Frame capture sink
//!
//! Turns each delivered camera buffer into a PNG record. Frames are stamped
//! with the shared wall clock at delivery, not with the buffer's presentation
//! time, so they line up with the inertial log at the cost of the
//! capture-to-delivery jitter.

use bytes::Bytes;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GrayImage, RgbaImage};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{duration_to_ns, Clock, TimestampGuard};
use crate::error::{CaptureError, Result};
use crate::lock_unpoisoned;
use crate::record::{FrameRecord, ImageBuffer, PixelFormat, Stream};
use crate::storage::RecordSink;

#[derive(Debug, Default, Clone, Copy)]
struct FrameCounters {
    encoded: u64,
    dropped: u64,
}

/// Encodes delivered frames and forwards them to the record sink
pub struct FrameCaptureSink {
    clock: Arc<dyn Clock>,
    stamps: TimestampGuard,
    sink: Arc<dyn RecordSink>,
    counters: Mutex<FrameCounters>,
}

impl FrameCaptureSink {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn RecordSink>) -> Self {
        Self {
            clock,
            stamps: TimestampGuard::new(),
            sink,
            counters: Mutex::new(FrameCounters::default()),
        }
    }

    /// Handle one delivered frame.
    ///
    /// Returns the forwarded record, or `None` if the frame could not be
    /// encoded and was dropped.
    pub fn on_frame(
        &self,
        image: &ImageBuffer,
        presentation_time: Option<Duration>,
    ) -> Option<FrameRecord> {
        let timestamp_ns = self.stamps.stamp(self.clock.now_ns());
        if let Some(pts) = presentation_time {
            debug!(
                timestamp_ns,
                presentation_ns = duration_to_ns(pts),
                "Frame delivered"
            );
        }

        let png = match encode_rotated_png(image, timestamp_ns) {
            Ok(png) => png,
            Err(e) => {
                lock_unpoisoned(&self.counters).dropped += 1;
                warn!(
                    stream = %Stream::Frame,
                    timestamp_ns,
                    error = %e,
                    "Dropping frame"
                );
                return None;
            }
        };

        let record = FrameRecord::new(timestamp_ns, png);
        self.sink.store_frame(&record);

        let mut counters = lock_unpoisoned(&self.counters);
        if counters.encoded == 0 {
            info!(
                "First frame at {} ({}x{} {:?})",
                timestamp_ns, image.width, image.height, image.format
            );
        }
        counters.encoded += 1;
        Some(record)
    }

    /// Frames encoded and forwarded
    pub fn frames_encoded(&self) -> u64 {
        lock_unpoisoned(&self.counters).encoded
    }

    /// Frames dropped because they could not be encoded
    pub fn frames_dropped(&self) -> u64 {
        lock_unpoisoned(&self.counters).dropped
    }
}

/// Rotate `image` 90° clockwise and encode it as PNG
pub fn encode_rotated_png(image: &ImageBuffer, timestamp_ns: i64) -> Result<Bytes> {
    let encode_err = |message: String| CaptureError::Encode {
        timestamp_ns,
        message,
    };

    let decoded = to_dynamic(image).map_err(encode_err)?;
    let rotated = decoded.rotate90();

    let mut png = Vec::new();
    rotated
        .write_with_encoder(PngEncoder::new(&mut png))
        .map_err(|e| encode_err(e.to_string()))?;
    Ok(Bytes::from(png))
}

/// Wrap the raw buffer in an `image` type, converting BGRA to RGBA
fn to_dynamic(image: &ImageBuffer) -> std::result::Result<DynamicImage, String> {
    if image.width == 0 || image.height == 0 {
        return Err(format!("empty {}x{} buffer", image.width, image.height));
    }
    let Some(expected) = image.expected_len() else {
        return Err(format!(
            "{}x{} {:?} buffer size overflows",
            image.width, image.height, image.format
        ));
    };
    if image.data.len() != expected {
        return Err(format!(
            "buffer holds {} bytes, {}x{} {:?} needs {}",
            image.data.len(),
            image.width,
            image.height,
            image.format,
            expected
        ));
    }

    let (w, h) = (image.width, image.height);
    let decoded = match image.format {
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(w, h, image.data.to_vec()).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Bgra8 => {
            let mut pixels = image.data.to_vec();
            for px in pixels.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            RgbaImage::from_raw(w, h, pixels).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(w, h, image.data.to_vec()).map(DynamicImage::ImageLuma8)
        }
    };
    decoded.ok_or_else(|| "buffer does not match its dimensions".to_string())
}
