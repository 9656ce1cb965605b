//! Session directory layout
//!
//! Every session writes into one EuRoC-style tree:
//!
//! ```text
//! <base>/imu0/data.csv
//! <base>/cam0/data.csv
//! <base>/cam0/data/<timestamp_ns>.png
//! ```
//!
//! The tree is created once, before any writer activity. Existing logs are
//! kept as they are so a session can resume after a process restart without
//! a second header row.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{CaptureError, Result};

/// Header row of `imu0/data.csv`, without line terminator
pub const INERTIAL_HEADER: &str = "#timestamp [ns],w_RS_S_x [rad s^-1],w_RS_S_y [rad s^-1],w_RS_S_z [rad s^-1],a_RS_S_x [m s^-2],a_RS_S_y [m s^-2],a_RS_S_z [m s^-2]";

/// Header row of `cam0/data.csv`, without line terminator
pub const FRAME_HEADER: &str = "#timestamp [ns],filename";

/// Line terminator of every log row
pub const LINE_END: &str = "\r\n";

/// Resolved paths of one capture session.
///
/// Immutable once built; shared read-only by both producers and the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    pub root_dir: PathBuf,
    pub inertial_log_path: PathBuf,
    pub frame_log_path: PathBuf,
    pub frame_data_dir: PathBuf,
}

impl SessionLayout {
    /// Compute the layout under `base` without touching the filesystem
    pub fn under(base: impl AsRef<Path>) -> Self {
        let root_dir = base.as_ref().to_path_buf();
        let imu_dir = root_dir.join("imu0");
        let cam_dir = root_dir.join("cam0");
        Self {
            inertial_log_path: imu_dir.join("data.csv"),
            frame_log_path: cam_dir.join("data.csv"),
            frame_data_dir: cam_dir.join("data"),
            root_dir,
        }
    }

    /// Directory holding the inertial log
    pub fn inertial_dir(&self) -> PathBuf {
        self.root_dir.join("imu0")
    }

    /// Directory holding the frame log and the frame image directory
    pub fn frame_dir(&self) -> PathBuf {
        self.root_dir.join("cam0")
    }

    /// Path of the image file with the given name
    pub fn frame_path(&self, filename: &str) -> PathBuf {
        self.frame_data_dir.join(filename)
    }
}

/// Create the session tree under `base_path` and seed both log headers.
///
/// Idempotent: directories are created with `mkdir -p` semantics and a header
/// is only written into a log file that does not exist yet.
pub fn initialize_session(base_path: impl AsRef<Path>) -> Result<SessionLayout> {
    let layout = SessionLayout::under(base_path);

    for dir in [
        layout.root_dir.clone(),
        layout.inertial_dir(),
        layout.frame_dir(),
        layout.frame_data_dir.clone(),
    ] {
        fs::create_dir_all(&dir).map_err(|source| CaptureError::Setup {
            path: dir.clone(),
            source,
        })?;
    }

    for (path, header) in [
        (&layout.inertial_log_path, INERTIAL_HEADER),
        (&layout.frame_log_path, FRAME_HEADER),
    ] {
        let created =
            create_log_with_header(path, header).map_err(|source| CaptureError::Setup {
                path: path.clone(),
                source,
            })?;
        if created {
            debug!("Created log {:?}", path);
        } else {
            debug!("Resuming existing log {:?}", path);
        }
    }

    info!("Session initialized at {:?}", layout.root_dir);
    Ok(layout)
}

/// Create `path` containing only `header` + CRLF.
///
/// Returns `Ok(false)` if the file already exists; its content is left alone.
pub(crate) fn create_log_with_header(path: &Path, header: &str) -> std::io::Result<bool> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(mut file) => {
            file.write_all(format!("{}{}", header, LINE_END).as_bytes())?;
            file.sync_data()?;
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_paths() {
        let layout = SessionLayout::under("/tmp/s1");
        assert_eq!(layout.root_dir, PathBuf::from("/tmp/s1"));
        assert_eq!(
            layout.inertial_log_path,
            PathBuf::from("/tmp/s1/imu0/data.csv")
        );
        assert_eq!(layout.frame_log_path, PathBuf::from("/tmp/s1/cam0/data.csv"));
        assert_eq!(layout.frame_data_dir, PathBuf::from("/tmp/s1/cam0/data"));
        assert_eq!(
            layout.frame_path("5000.png"),
            PathBuf::from("/tmp/s1/cam0/data/5000.png")
        );
    }

    #[test]
    fn initialize_creates_tree_and_headers() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("s1");
        let layout = initialize_session(&base).unwrap();

        assert!(layout.inertial_dir().is_dir());
        assert!(layout.frame_dir().is_dir());
        assert!(layout.frame_data_dir.is_dir());

        let imu = fs::read_to_string(&layout.inertial_log_path).unwrap();
        assert_eq!(imu, format!("{}\r\n", INERTIAL_HEADER));
        let cam = fs::read_to_string(&layout.frame_log_path).unwrap();
        assert_eq!(cam, "#timestamp [ns],filename\r\n");
    }

    #[test]
    fn initialize_twice_keeps_single_header_and_rows() {
        let dir = tempdir().unwrap();
        let layout = initialize_session(dir.path()).unwrap();

        let mut file = OpenOptions::new()
            .append(true)
            .open(&layout.frame_log_path)
            .unwrap();
        file.write_all(b"1,1.png\r\n").unwrap();
        drop(file);

        let again = initialize_session(dir.path()).unwrap();
        assert_eq!(again, layout);

        let cam = fs::read_to_string(&layout.frame_log_path).unwrap();
        assert_eq!(cam, "#timestamp [ns],filename\r\n1,1.png\r\n");
        assert_eq!(cam.matches("#timestamp").count(), 1);
    }

    #[test]
    fn initialize_fails_when_base_is_a_file() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("occupied");
        fs::write(&base, b"not a directory").unwrap();

        let err = initialize_session(&base).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, CaptureError::Setup { .. }));
    }
}
