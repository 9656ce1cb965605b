//! Visual-inertial dataset recorder
//!
//! Runs one capture session and writes an EuRoC-style tree under
//! `<VICAP_OUTPUT>/mav0`.
//!
//! ## Usage
//!
//! ```bash
//! # Record synthetic data for 10 seconds
//! VICAP_OUTPUT=/tmp/run1 VICAP_DURATION_SECS=10 vicap-recorder --synthetic
//!
//! # Record until Ctrl-C, without fsync after every row
//! VICAP_SYNC=0 vicap-recorder --synthetic
//! ```

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use vicap::source::synthetic::{SyntheticCamera, SyntheticMotion};
use vicap::{CameraConfig, CaptureSession, InertialConfig, SessionConfig, WriterConfig};

/// Recorder configuration from environment/args
struct Config {
    session: SessionConfig,
    /// Stop after this long; run until Ctrl-C if unset
    duration: Option<Duration>,
    /// How often to log progress
    stats_interval: Duration,
    /// Use synthetic sources instead of device sensors
    synthetic: bool,
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl Config {
    fn from_env() -> Result<Self> {
        let output = std::env::var("VICAP_OUTPUT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        let args: Vec<String> = std::env::args().collect();
        let synthetic = args.iter().any(|arg| arg == "--synthetic");

        let tick_ms: u64 = env_parse("VICAP_TICK_MS").unwrap_or(5);
        if tick_ms == 0 {
            bail!("VICAP_TICK_MS must be at least 1");
        }

        // fsync after every row unless VICAP_SYNC=0
        let sync_data = std::env::var("VICAP_SYNC")
            .map(|v| v != "0")
            .unwrap_or(true);

        let defaults = CameraConfig::default();

        Ok(Self {
            session: SessionConfig {
                base_path: output.join("mav0"),
                inertial: InertialConfig {
                    tick_interval: Duration::from_millis(tick_ms),
                    sensor_rate_hz: env_parse("VICAP_IMU_RATE").unwrap_or(200),
                },
                camera: CameraConfig {
                    width: env_parse("VICAP_WIDTH").unwrap_or(defaults.width),
                    height: env_parse("VICAP_HEIGHT").unwrap_or(defaults.height),
                    fps: env_parse("VICAP_FPS").unwrap_or(defaults.fps),
                },
                writer: WriterConfig { sync_data },
            },
            duration: env_parse::<u64>("VICAP_DURATION_SECS").map(Duration::from_secs),
            stats_interval: Duration::from_secs(env_parse("VICAP_STATS_SECS").unwrap_or(5).max(1)),
            synthetic,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vicap=info".parse().context("Invalid log directive")?),
        )
        .init();

    let config = Config::from_env()?;

    info!("vicap recorder starting");
    info!("  Output: {:?}", config.session.base_path);
    info!(
        "  IMU: {:?} tick, sensors at {}Hz",
        config.session.inertial.tick_interval, config.session.inertial.sensor_rate_hz
    );
    info!(
        "  Camera: {}x{} @ {}fps",
        config.session.camera.width, config.session.camera.height, config.session.camera.fps
    );
    info!("  Sync every row: {}", config.session.writer.sync_data);

    if !config.synthetic {
        bail!("No device sensor backend on this host; run with --synthetic");
    }

    let session = CaptureSession::start(
        config.session.clone(),
        SyntheticMotion::default(),
        SyntheticCamera::default(),
    )
    .context("Failed to start capture session")?;

    let deadline = async {
        match config.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut stats_timer = tokio::time::interval(config.stats_interval);
    stats_timer.tick().await;

    loop {
        tokio::select! {
            _ = stats_timer.tick() => {
                let stats = session.stats();
                info!(
                    "Recorded {} IMU rows, {} frames ({} MB of images)",
                    stats.writer.inertial_rows,
                    stats.writer.frame_rows,
                    stats.writer.image_bytes / 1_000_000
                );
            }
            _ = &mut deadline => {
                info!("Recording duration reached");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let stats = session.stop().await;
    info!(
        "Done: {} IMU samples, {} frames written to {:?}",
        stats.writer.inertial_rows, stats.writer.frame_rows, config.session.base_path
    );

    Ok(())
}
