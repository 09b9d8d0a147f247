//! State machine automation for the emulator.
//!
//! This module provides:
//! - The state registry and the criteria that identify each screen
//! - Detection of the current state from a captured frame
//! - The run loop that triggers actions on state entry
//! - Archiving of frames no state matched
//! - Device input through adb

pub mod action;
pub mod archive;
pub mod config;
pub mod detection;
pub mod input;
pub mod registry;
pub mod runner;
pub mod state;

pub use action::{Action, CloseApp, Context, FnAction, TapTemplate, Wait};
pub use archive::UnknownStateArchiver;
pub use config::{BotConfig, ConfigSource};
pub use detection::{detect, validate};
pub use input::{AdbInput, InputDriver};
pub use registry::{
    Binarization, Criterion, MatcherKind, MatcherOptions, Region, SolidColor, SolidColorOptions,
    StateDefinition, StateRegistry, TemplateOptions, TextOptions,
};
pub use runner::{Engine, RunSummary, StopReason};
pub use state::{EngineState, RunPhase, StopHandle, Transition};
