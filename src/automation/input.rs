//! Touch input injection for state actions.
//!
//! The engine itself never taps; actions hold an `InputDriver` and use it
//! to act on the screen they were triggered by.

use anyhow::Result;
use tracing::info;

use crate::adb::AdbDevice;

/// Input collaborator used by actions.
pub trait InputDriver {
    fn tap(&self, x: u32, y: u32) -> Result<()>;

    fn swipe(&self, from: (u32, u32), to: (u32, u32), duration_ms: u32) -> Result<()>;

    fn key_event(&self, code: u32) -> Result<()>;

    fn force_stop(&self, package: &str) -> Result<()>;
}

/// Sends input through `adb shell input`.
#[derive(Clone, Debug)]
pub struct AdbInput {
    device: AdbDevice,
}

impl AdbInput {
    pub fn new(device: AdbDevice) -> Self {
        Self { device }
    }
}

impl InputDriver for AdbInput {
    fn tap(&self, x: u32, y: u32) -> Result<()> {
        self.device
            .shell(&["input", "tap", &x.to_string(), &y.to_string()])?;
        info!("Tapped at ({}, {})", x, y);
        Ok(())
    }

    fn swipe(&self, from: (u32, u32), to: (u32, u32), duration_ms: u32) -> Result<()> {
        self.device.shell(&[
            "input",
            "swipe",
            &from.0.to_string(),
            &from.1.to_string(),
            &to.0.to_string(),
            &to.1.to_string(),
            &duration_ms.to_string(),
        ])?;
        info!(
            "Swiped ({}, {}) -> ({}, {}) over {}ms",
            from.0, from.1, to.0, to.1, duration_ms
        );
        Ok(())
    }

    fn key_event(&self, code: u32) -> Result<()> {
        self.device.shell(&["input", "keyevent", &code.to_string()])
    }

    fn force_stop(&self, package: &str) -> Result<()> {
        self.device.shell(&["am", "force-stop", package])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call as a short string.
    #[derive(Default)]
    pub(crate) struct RecordingInput {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingInput {
        pub(crate) fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl InputDriver for RecordingInput {
        fn tap(&self, x: u32, y: u32) -> Result<()> {
            self.record(format!("tap {} {}", x, y));
            Ok(())
        }

        fn swipe(&self, from: (u32, u32), to: (u32, u32), duration_ms: u32) -> Result<()> {
            self.record(format!(
                "swipe {} {} {} {} {}",
                from.0, from.1, to.0, to.1, duration_ms
            ));
            Ok(())
        }

        fn key_event(&self, code: u32) -> Result<()> {
            self.record(format!("key {}", code));
            Ok(())
        }

        fn force_stop(&self, package: &str) -> Result<()> {
            self.record(format!("force_stop {}", package));
            Ok(())
        }
    }
}
