//! Record types for the inertial and camera streams

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Standard gravity used to convert accelerometer g-units to m/s²
pub const GRAVITY: f64 = 9.81;

/// Significant digits kept for floating-point CSV fields
const CSV_SIGNIFICANT_DIGITS: usize = 15;

/// The two logged streams.
///
/// Displays as the dataset directory name of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stream {
    /// Fused gyroscope + accelerometer samples (`imu0`)
    Inertial,
    /// Camera frames (`cam0`)
    Frame,
}

impl std::fmt::Display for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stream::Inertial => write!(f, "imu0"),
            Stream::Frame => write!(f, "cam0"),
        }
    }
}

/// Raw rotation rate in rad/s, device axes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GyroReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl GyroReading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Raw linear acceleration in g-units, device axes and sign convention
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AccelReading {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelReading {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Convert to m/s² in the dataset frame: negate and scale by gravity.
    pub fn to_m_per_s2(&self) -> [f64; 3] {
        [self.x * -GRAVITY, self.y * -GRAVITY, self.z * -GRAVITY]
    }
}

/// One fused gyroscope + accelerometer sample.
///
/// Row format:
/// ```text
/// timestamp,gx,gy,gz,ax,ay,az\r\n
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InertialSample {
    /// Nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
    /// Angular rate in rad/s
    pub gyro: [f64; 3],
    /// Linear acceleration in m/s²
    pub accel: [f64; 3],
}

impl InertialSample {
    /// Fuse the latest raw readings into one sample stamped at `timestamp_ns`
    pub fn from_readings(timestamp_ns: i64, gyro: GyroReading, accel: AccelReading) -> Self {
        Self {
            timestamp_ns,
            gyro: [gyro.x, gyro.y, gyro.z],
            accel: accel.to_m_per_s2(),
        }
    }

    /// CSV row including the trailing CRLF
    pub fn to_csv_row(&self) -> String {
        let mut row = self.timestamp_ns.to_string();
        for v in self.gyro.iter().chain(self.accel.iter()) {
            row.push(',');
            row.push_str(&format_value(*v));
        }
        row.push_str("\r\n");
        row
    }
}

/// One encoded camera frame.
///
/// The filename is derived from the timestamp and joins the image file with
/// its row in `cam0/data.csv`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    /// Nanoseconds since the Unix epoch
    pub timestamp_ns: i64,
    /// `<timestamp_ns>.png`
    pub filename: String,
    /// PNG-encoded image
    pub pixel_data: Bytes,
}

impl FrameRecord {
    pub fn new(timestamp_ns: i64, pixel_data: Bytes) -> Self {
        Self {
            timestamp_ns,
            filename: frame_filename(timestamp_ns),
            pixel_data,
        }
    }

    /// CSV row including the trailing CRLF
    pub fn to_csv_row(&self) -> String {
        format!("{},{}\r\n", self.timestamp_ns, self.filename)
    }
}

/// Image file name for a frame captured at `timestamp_ns`
pub fn frame_filename(timestamp_ns: i64) -> String {
    format!("{}.png", timestamp_ns)
}

/// Memory layout of an uncompressed image buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit BGRA, the usual mobile camera output
    Bgra8,
    /// 8-bit RGBA
    Rgba8,
    /// 8-bit single channel
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

/// A decoded, uncompressed camera buffer as delivered by the capture device
#[derive(Debug, Clone)]
pub struct ImageBuffer {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Tightly packed rows, no padding
    pub data: Bytes,
}

impl ImageBuffer {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Bytes) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Byte length implied by the dimensions and pixel format; `None` if it
    /// does not fit in `usize`
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.format.bytes_per_pixel())
    }
}

/// Shortest decimal form after rounding to 15 significant digits, so
/// `-49.050000000000004` prints as `-49.05` while small magnitudes such as
/// `1e-12` keep their value. `-0` prints as `0`.
fn format_value(v: f64) -> String {
    if !v.is_finite() {
        return v.to_string();
    }
    let rounded: f64 = format!("{:.*e}", CSV_SIGNIFICANT_DIGITS - 1, v)
        .parse()
        .unwrap_or(v);
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}
