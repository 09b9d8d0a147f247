//! Thin wrapper around the `adb` command-line tool.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::process::{Command, Output};

/// Handle to one emulator/device reachable through adb.
#[derive(Clone, Debug)]
pub struct AdbDevice {
    adb_path: PathBuf,
    serial: Option<String>,
}

impl AdbDevice {
    pub fn new(adb_path: impl Into<PathBuf>, serial: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            serial,
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.adb_path);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }

    /// Runs `adb <args>` and returns its captured output, failing on a
    /// non-zero exit status.
    pub fn output(&self, args: &[&str]) -> Result<Output> {
        let output = self
            .command(args)
            .output()
            .with_context(|| format!("Failed to run {} {}", self.adb_path.display(), args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("adb {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    /// Runs `adb shell <args>`, discarding stdout.
    pub fn shell(&self, args: &[&str]) -> Result<()> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push("shell");
        full.extend_from_slice(args);
        self.output(&full)?;
        Ok(())
    }
}
