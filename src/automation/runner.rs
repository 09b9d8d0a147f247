//! The run loop: capture → detect → transition → act → archive → wait.
//!
//! Actions are edge-triggered: they run once when a state is entered, not on
//! every frame the state stays on screen. Frames that match no state are
//! archived for later inspection.

use std::any::Any;
use std::fmt::Write as _;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::automation::action::{Action, Context};
use crate::automation::archive::UnknownStateArchiver;
use crate::automation::detection::{detect, validate};
use crate::automation::registry::{Criterion, MatcherKind, StateRegistry};
use crate::automation::state::{EngineState, RunPhase, StopHandle, Transition};
use crate::capture::{Capture, Frame};
use crate::error::ConfigError;
use crate::matching::{CriterionMatcher, MatcherTable};

/// Default delay between iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `stop()` was called
    Requested,
    /// The iteration budget was used up
    BudgetExhausted,
}

/// What a finished run looked like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub iterations: u64,
    pub final_state: Option<String>,
    pub previous_state: Option<String>,
    pub unmatched: u64,
    pub reason: StopReason,
}

/// State detection and action dispatch engine.
pub struct Engine {
    capture: Box<dyn Capture>,
    registry: StateRegistry,
    matchers: MatcherTable,
    archiver: UnknownStateArchiver,
    poll_interval: Duration,
    state: EngineState,
    phase: RunPhase,
    stop: StopHandle,
    threshold: Option<f32>,
    target_activity: Option<String>,
}

impl Engine {
    /// Creates an idle engine with no states and no matchers bound.
    pub fn new(capture: Box<dyn Capture>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            capture,
            registry: StateRegistry::new(),
            matchers: MatcherTable::new(),
            archiver: UnknownStateArchiver::new(archive_dir),
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: EngineState::new(),
            phase: RunPhase::Idle,
            stop: StopHandle::new(),
            threshold: None,
            target_activity: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_matchers(mut self, matchers: MatcherTable) -> Self {
        self.matchers = matchers;
        self
    }

    /// Run parameters handed to actions through the context.
    pub fn with_context(mut self, threshold: Option<f32>, target_activity: Option<String>) -> Self {
        self.threshold = threshold;
        self.target_activity = target_activity;
        self
    }

    /// Registers a state with its criteria and entry actions.
    pub fn register_state(
        &mut self,
        id: &str,
        criteria: Vec<Criterion>,
        actions: Vec<Box<dyn Action>>,
    ) {
        self.registry.define(id, criteria, actions);
    }

    pub fn register_action(&mut self, id: &str, action: Box<dyn Action>) {
        self.registry.register_action(id, action);
    }

    pub fn registry_mut(&mut self) -> &mut StateRegistry {
        &mut self.registry
    }

    /// Binds the adapter evaluating criteria of `kind`.
    pub fn set_matcher(&mut self, kind: MatcherKind, adapter: Box<dyn CriterionMatcher>) {
        if self.matchers.set(kind, adapter).is_some() {
            debug!("Replaced {} matcher", kind);
        }
    }

    /// Handle that can stop the loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Requests a stop; honored at the top of the next iteration.
    ///
    /// A stop requested before [`run`](Self::run) ends that run before its
    /// first capture. The request is cleared when a run returns.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn current_state(&self) -> Option<&str> {
        self.state.current.as_deref()
    }

    pub fn previous_state(&self) -> Option<&str> {
        self.state.previous.as_deref()
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Runs until stopped or until `max_iterations` iterations have run.
    ///
    /// Fails before the first iteration when the configuration cannot work
    /// (no states, missing adapters).
    pub fn run(&mut self, max_iterations: Option<u64>) -> Result<RunSummary, ConfigError> {
        validate(&self.registry, &self.matchers)?;

        self.archiver.clear();
        self.state = EngineState::new();
        self.phase = RunPhase::Running;

        match max_iterations {
            Some(max) => info!(
                "Starting state machine loop: {} iterations (poll interval: {:.1}s)",
                max,
                self.poll_interval.as_secs_f32()
            ),
            None => info!(
                "Starting state machine loop (poll interval: {:.1}s)",
                self.poll_interval.as_secs_f32()
            ),
        }

        let mut ctx = Context::new(self.threshold, self.target_activity.clone());
        let outcome = self.run_loop(max_iterations, &mut ctx);
        self.stop.reset();
        self.phase = RunPhase::Stopped;
        let (iterations, reason) = outcome?;

        let summary = RunSummary {
            iterations,
            final_state: self.state.current.clone(),
            previous_state: self.state.previous.clone(),
            unmatched: self.state.unmatched,
            reason,
        };
        info!(
            "State machine stopped after {} iteration(s): {:?}, final state {}",
            summary.iterations,
            summary.reason,
            summary.final_state.as_deref().unwrap_or("none")
        );
        Ok(summary)
    }

    fn run_loop(
        &mut self,
        max_iterations: Option<u64>,
        ctx: &mut Context,
    ) -> Result<(u64, StopReason), ConfigError> {
        let mut iteration = 0u64;
        loop {
            if self.stop.is_requested() {
                info!("Stop requested");
                return Ok((iteration, StopReason::Requested));
            }
            if max_iterations.is_some_and(|max| iteration >= max) {
                return Ok((iteration, StopReason::BudgetExhausted));
            }

            iteration += 1;
            ctx.iteration = iteration;
            self.step(iteration, ctx)?;

            let last = max_iterations == Some(iteration);
            if !last && !self.stop.is_requested() && !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
        }
    }

    /// One capture/detect/act cycle.
    fn step(&mut self, iteration: u64, ctx: &mut Context) -> Result<(), ConfigError> {
        let frame = match self.capture.capture(iteration) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[ITER {}] Capture failed: {:#}", iteration, e);
                return Ok(());
            }
        };
        ctx.last_frame = Some(frame.clone());

        let detected = detect(&self.registry, &self.matchers, &frame)?.map(str::to_string);

        match self.state.observe(detected.as_deref()) {
            Transition::Entered { state, from } => {
                info!(
                    "[ITER {}] State: {} -> {}",
                    iteration,
                    from.as_deref().unwrap_or("none"),
                    state
                );
                self.run_actions(&state, ctx);
            }
            Transition::Held { state, frames } => {
                debug!("[ITER {}] Holding {} ({} frames)", iteration, state, frames);
            }
            Transition::Lost { from } => {
                info!("[ITER {}] Lost state {}: no state matched", iteration, from);
                self.archive(&frame);
            }
            Transition::StillUnknown => {
                info!("[ITER {}] No state matched", iteration);
                self.archive(&frame);
            }
        }
        Ok(())
    }

    /// Runs the entry actions of `state` in order. A failing or panicking
    /// action is logged and the next one still runs.
    fn run_actions(&mut self, state: &str, ctx: &mut Context) {
        let Some(definition) = self.registry.get_mut(state) else {
            return;
        };

        for action in definition.actions_mut() {
            let name = action.name().to_string();
            debug!(state, action = %name, "executing action");

            match panic::catch_unwind(AssertUnwindSafe(|| action.execute(ctx))) {
                Ok(true) => info!(state, action = %name, "action completed"),
                Ok(false) => warn!(state, action = %name, "action failed"),
                Err(payload) => error!(
                    state,
                    action = %name,
                    "action panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }
    }

    fn archive(&self, frame: &Frame) {
        match self.archiver.archive(frame) {
            Ok(path) => info!(
                "Unknown state #{} saved to: {}",
                self.state.unmatched,
                path.display()
            ),
            Err(e) => error!("Failed to save unknown state screenshot: {:#}", e),
        }
    }

    /// Human-readable overview of the registry and the run state.
    pub fn state_info(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== State Machine ===");
        let _ = writeln!(out, "Phase: {}", self.phase);
        let _ = writeln!(out, "Current state: {}", self.current_state().unwrap_or("none"));
        let _ = writeln!(out, "Previous state: {}", self.previous_state().unwrap_or("none"));
        let _ = writeln!(out, "Unmatched frames: {}", self.state.unmatched);
        let _ = writeln!(out, "Registered states ({}):", self.registry.len());

        for (i, state) in self.registry.states().enumerate() {
            let kinds: Vec<&str> = state.criteria().iter().map(|c| c.kind.as_str()).collect();
            let actions: Vec<&str> = state.actions().iter().map(|a| a.name()).collect();
            let _ = writeln!(
                out,
                "  {}. {}: {} criteria [{}], actions [{}]",
                i + 1,
                state.id(),
                kinds.len(),
                kinds.join(", "),
                actions.join(", ")
            );
        }
        let _ = write!(
            out,
            "Matchers bound: {}",
            self.matchers
                .bound_kinds()
                .iter()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        out
    }

    pub fn print_state_info(&self) {
        println!("{}", self.state_info());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
