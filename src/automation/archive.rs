//! Archive of frames that matched no state.
//!
//! Every unmatched frame is copied next to an append-only log so unknown
//! screens can be turned into new templates later. The log is reopened in
//! append mode for each entry, so entries survive a crash mid-run.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::capture::Frame;
use crate::paths;

/// Log file kept inside the archive directory.
pub const LOG_FILE: &str = "unknown_states.log";
/// File preserved when the archive is cleared.
pub const KEEP_MARKER: &str = ".gitkeep";

/// Timestamp used in archived file names and log lines (millisecond precision).
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

#[derive(Debug, Clone)]
pub struct UnknownStateArchiver {
    dir: PathBuf,
}

impl UnknownStateArchiver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE)
    }

    /// Removes everything from a previous run except the keep marker.
    /// Failures are logged, never fatal.
    pub fn clear(&self) -> usize {
        match paths::clear_directory(&self.dir, KEEP_MARKER) {
            Ok(removed) => {
                info!(
                    "Cleared {} file(s) from {}",
                    removed,
                    self.dir.display()
                );
                removed
            }
            Err(e) => {
                warn!("Failed to clear {}: {}", self.dir.display(), e);
                0
            }
        }
    }

    /// First free `unknown_<timestamp>[_N].png` name for this timestamp.
    fn free_name(&self, timestamp: &str) -> String {
        let base = format!("unknown_{timestamp}");
        let mut name = format!("{base}.png");
        let mut n = 1;
        while self.dir.join(&name).exists() {
            name = format!("{base}_{n}.png");
            n += 1;
        }
        name
    }

    /// Copies the frame into the archive and appends a log line.
    ///
    /// Returns the path of the archived copy.
    pub fn archive(&self, frame: &Frame) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let name = self.free_name(&timestamp);
        let dest = self.dir.join(&name);

        std::fs::copy(frame.path(), &dest).with_context(|| {
            format!(
                "Failed to copy {} to {}",
                frame.path().display(),
                dest.display()
            )
        })?;

        let mut log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .context("Failed to open unknown state log for append")?;
        writeln!(
            log,
            "[{}] Unknown state detected. Screenshot: {}",
            timestamp, name
        )
        .context("Failed to write unknown state log")?;

        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn frame_in(dir: &Path) -> Frame {
        let path = dir.join("screen.png");
        std::fs::write(&path, b"png bytes").unwrap();
        Frame::new(path, 1)
    }

    fn archived_images(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("unknown_") && n.ends_with(".png"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_archive_copies_and_logs() {
        let source = tempdir().unwrap();
        let archive_dir = tempdir().unwrap();
        let archiver = UnknownStateArchiver::new(archive_dir.path().join("unknown"));
        let frame = frame_in(source.path());

        let dest = archiver.archive(&frame).unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"png bytes");

        let log = std::fs::read_to_string(archiver.log_path()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with('['));
        let file_name = dest.file_name().unwrap().to_string_lossy();
        assert!(lines[0].ends_with(&format!("] Unknown state detected. Screenshot: {}", file_name)));
    }

    #[test]
    fn test_one_file_per_frame_even_within_a_millisecond() {
        let source = tempdir().unwrap();
        let archive_dir = tempdir().unwrap();
        let archiver = UnknownStateArchiver::new(archive_dir.path());
        let frame = frame_in(source.path());

        for _ in 0..3 {
            archiver.archive(&frame).unwrap();
        }

        assert_eq!(archived_images(archive_dir.path()).len(), 3);
        let log = std::fs::read_to_string(archiver.log_path()).unwrap();
        assert_eq!(log.lines().count(), 3);
    }

    #[test]
    fn test_free_name_adds_suffix() {
        let archive_dir = tempdir().unwrap();
        let archiver = UnknownStateArchiver::new(archive_dir.path());
        std::fs::write(archive_dir.path().join("unknown_T.png"), "").unwrap();
        std::fs::write(archive_dir.path().join("unknown_T_1.png"), "").unwrap();

        assert_eq!(archiver.free_name("T"), "unknown_T_2.png");
        assert_eq!(archiver.free_name("U"), "unknown_U.png");
    }

    #[test]
    fn test_clear_keeps_marker() {
        let archive_dir = tempdir().unwrap();
        let archiver = UnknownStateArchiver::new(archive_dir.path());
        std::fs::write(archive_dir.path().join(KEEP_MARKER), "").unwrap();
        std::fs::write(archive_dir.path().join("unknown_1.png"), "").unwrap();
        std::fs::write(archiver.log_path(), "old\n").unwrap();

        assert_eq!(archiver.clear(), 2);
        assert!(archive_dir.path().join(KEEP_MARKER).exists());
        assert!(!archiver.log_path().exists());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let archive_dir = tempdir().unwrap();
        let archiver = UnknownStateArchiver::new(archive_dir.path());
        let frame = Frame::new(archive_dir.path().join("gone.png"), 1);

        assert!(archiver.archive(&frame).is_err());
        assert!(!archiver.log_path().exists());
    }
}
