//! End-to-end capture sessions against a temporary directory
//!
//! Drives the full pipeline with the synthetic sources (no hardware):
//!
//! - motion source → aggregator tick → `imu0/data.csv`
//! - camera source → rotate + PNG encode → `cam0/data.csv` + `cam0/data/*.png`
//!
//! Run: `cargo test -p vicap --features synthetic-source --test e2e`

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use vicap::layout::{FRAME_HEADER, INERTIAL_HEADER};
use vicap::source::synthetic::{SyntheticCamera, SyntheticMotion};
use vicap::{
    CameraConfig, CaptureError, CaptureSession, InertialConfig, SensorKind, SessionConfig,
    WriterConfig,
};

// ── Shared helpers ───────────────────────────────────────────────────

fn session_config(base: &Path) -> SessionConfig {
    SessionConfig {
        base_path: base.to_path_buf(),
        inertial: InertialConfig {
            tick_interval: Duration::from_millis(5),
            sensor_rate_hz: 200,
        },
        camera: CameraConfig {
            width: 64,
            height: 48,
            fps: 20,
        },
        writer: WriterConfig { sync_data: false },
    }
}

async fn record_for(base: &Path, duration: Duration) -> vicap::SessionStats {
    let session = CaptureSession::start(
        session_config(base),
        SyntheticMotion::default(),
        SyntheticCamera::default(),
    )
    .unwrap();
    tokio::time::sleep(duration).await;
    session.stop().await
}

fn read_log(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// Data rows of a log, without the header and line terminators
fn rows(log: &str) -> Vec<&str> {
    log.split("\r\n")
        .skip(1)
        .filter(|line| !line.is_empty())
        .collect()
}

fn timestamp_of(row: &str) -> i64 {
    row.split(',').next().unwrap().parse().unwrap()
}

// ── Sessions ─────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn session_writes_euroc_tree() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("mav0");

    let stats = record_for(&base, Duration::from_millis(400)).await;
    assert!(stats.writer.inertial_rows > 0);
    assert!(stats.writer.frame_rows > 0);
    assert_eq!(stats.writer.inertial_dropped, 0);
    assert_eq!(stats.writer.frame_dropped, 0);

    // imu0: header once, seven numeric columns, CRLF rows, increasing stamps
    let imu = read_log(&base.join("imu0/data.csv"));
    assert!(imu.starts_with(&format!("{}\r\n", INERTIAL_HEADER)));
    assert_eq!(imu.matches(INERTIAL_HEADER).count(), 1);
    assert!(imu.ends_with("\r\n"));
    let imu_rows = rows(&imu);
    assert_eq!(imu_rows.len() as u64, stats.writer.inertial_rows);
    let mut last = i64::MIN;
    for row in &imu_rows {
        let fields: Vec<&str> = row.split(',').collect();
        assert_eq!(fields.len(), 7, "row {:?}", row);
        for value in &fields[1..] {
            value.parse::<f64>().unwrap();
        }
        let ts = timestamp_of(row);
        assert!(ts > last);
        last = ts;
    }

    // cam0: every row names an image that exists, and every image is logged
    let cam = read_log(&base.join("cam0/data.csv"));
    assert!(cam.starts_with(&format!("{}\r\n", FRAME_HEADER)));
    let cam_rows = rows(&cam);
    assert_eq!(cam_rows.len() as u64, stats.writer.frame_rows);

    let mut logged = HashSet::new();
    for row in &cam_rows {
        let (ts, filename) = row.split_once(',').unwrap();
        assert_eq!(filename, format!("{}.png", ts));
        let image = image::open(base.join("cam0/data").join(filename)).unwrap();
        // 64x48 rotated a quarter turn
        assert_eq!((image.width(), image.height()), (48, 64));
        logged.insert(filename.to_string());
    }

    let on_disk: HashSet<String> = std::fs::read_dir(base.join("cam0/data"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(on_disk, logged);
}

#[tokio::test(flavor = "multi_thread")]
async fn restarted_session_appends_without_second_header() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("mav0");

    let first = record_for(&base, Duration::from_millis(150)).await;
    let second = record_for(&base, Duration::from_millis(150)).await;

    let imu = read_log(&base.join("imu0/data.csv"));
    assert_eq!(imu.matches(INERTIAL_HEADER).count(), 1);
    assert_eq!(
        rows(&imu).len() as u64,
        first.writer.inertial_rows + second.writer.inertial_rows
    );

    let cam = read_log(&base.join("cam0/data.csv"));
    assert_eq!(cam.matches(FRAME_HEADER).count(), 1);
    assert_eq!(
        rows(&cam).len() as u64,
        first.writer.frame_rows + second.writer.frame_rows
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_accelerometer_is_fatal_and_leaves_no_files() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("mav0");

    let result = CaptureSession::start(
        session_config(&base),
        SyntheticMotion::with_sensors(true, false),
        SyntheticCamera::default(),
    );
    match result {
        Err(CaptureError::SensorUnavailable(SensorKind::Accelerometer)) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session started without an accelerometer"),
    }
    assert!(!base.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_camera_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("mav0");

    let result = CaptureSession::start(
        session_config(&base),
        SyntheticMotion::default(),
        SyntheticCamera::unavailable(),
    );
    assert!(matches!(
        result,
        Err(CaptureError::SensorUnavailable(SensorKind::Camera))
    ));
    assert!(!base.exists());
}
