//! Screenshot capture through `adb exec-out screencap`.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use tracing::debug;

use super::{Capture, Frame};
use crate::adb::AdbDevice;

/// Captures the emulator screen as PNG files in a screenshots directory.
#[derive(Clone, Debug)]
pub struct AdbCapture {
    device: AdbDevice,
    dir: PathBuf,
    unique_names: bool,
}

impl AdbCapture {
    pub fn new(device: AdbDevice, dir: impl Into<PathBuf>) -> Self {
        Self {
            device,
            dir: dir.into(),
            unique_names: false,
        }
    }

    /// Keep one file per iteration instead of overwriting `screen.png`.
    pub fn with_unique_names(mut self, unique: bool) -> Self {
        self.unique_names = unique;
        self
    }

    fn file_for(&self, iteration: u64) -> PathBuf {
        if self.unique_names {
            self.dir.join(format!("screen_{iteration}.png"))
        } else {
            self.dir.join("screen.png")
        }
    }
}

impl Capture for AdbCapture {
    fn capture(&self, iteration: u64) -> Result<Frame> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let output = self.device.output(&["exec-out", "screencap", "-p"])?;
        if output.stdout.is_empty() {
            return Err(anyhow!("screencap returned no data"));
        }

        let path = self.file_for(iteration);
        std::fs::write(&path, &output.stdout)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Captured {} ({} bytes)", path.display(), output.stdout.len());

        Ok(Frame::new(path, iteration))
    }
}
