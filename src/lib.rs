//! LDPlayer Bot
//!
//! Screen-state automation for a game running in an Android emulator.
//! Each iteration captures the screen over adb, decides which registered
//! state it shows (template matching, OCR text, solid colors), runs the
//! state's actions when the state is entered, and archives screens that
//! match nothing.

pub mod adb;
pub mod automation;
pub mod capture;
pub mod error;
pub mod logging;
pub mod matching;
pub mod ocr;
pub mod paths;
pub mod states;

pub use automation::{Engine, RunSummary, StopReason};
pub use error::{ConfigError, MatchError};
