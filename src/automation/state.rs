//! Run-loop bookkeeping: phase, current/previous state, and the stop flag.
//!
//! `EngineState::observe` is the only place state transitions happen, so the
//! invariant "previous is assigned before current changes" lives here.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lifecycle of the run loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Not started yet
    Idle,
    /// Inside the capture/detect/act loop
    Running,
    /// Loop ended (stop requested or iteration budget used up)
    Stopped,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "Idle"),
            RunPhase::Running => write!(f, "Running"),
            RunPhase::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Outcome of feeding one detection result into the engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A different state became current; its actions should run
    Entered {
        state: String,
        from: Option<String>,
    },
    /// The current state was detected again
    Held { state: String, frames: u64 },
    /// No state matched while one was current
    Lost { from: String },
    /// No state matched and none was current
    StillUnknown,
}

/// Which state the screen is in, as far as the engine knows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub current: Option<String>,
    pub previous: Option<String>,
    /// Consecutive frames the current state has been detected in
    pub hold_frames: u64,
    /// Frames that matched no state during this run
    pub unmatched: u64,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one detection result.
    pub fn observe(&mut self, detected: Option<&str>) -> Transition {
        match detected {
            Some(state) if self.current.as_deref() == Some(state) => {
                self.hold_frames += 1;
                Transition::Held {
                    state: state.to_string(),
                    frames: self.hold_frames,
                }
            }
            Some(state) => {
                self.previous = self.current.take();
                self.current = Some(state.to_string());
                self.hold_frames = 1;
                Transition::Entered {
                    state: state.to_string(),
                    from: self.previous.clone(),
                }
            }
            None => {
                self.unmatched += 1;
                self.hold_frames = 0;
                match self.current.take() {
                    Some(from) => {
                        self.previous = Some(from.clone());
                        Transition::Lost { from }
                    }
                    None => Transition::StillUnknown,
                }
            }
        }
    }
}

/// Cloneable handle to request a stop from another thread.
///
/// The run loop only looks at the flag at the top of each iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_hold_and_switch() {
        let mut state = EngineState::new();

        assert_eq!(
            state.observe(Some("menu")),
            Transition::Entered {
                state: "menu".to_string(),
                from: None
            }
        );
        assert_eq!(
            state.observe(Some("menu")),
            Transition::Held {
                state: "menu".to_string(),
                frames: 2
            }
        );
        assert_eq!(
            state.observe(Some("story")),
            Transition::Entered {
                state: "story".to_string(),
                from: Some("menu".to_string())
            }
        );
        assert_eq!(state.previous.as_deref(), Some("menu"));
        assert_eq!(state.hold_frames, 1);
    }

    #[test]
    fn test_lost_then_unknown() {
        let mut state = EngineState::new();
        state.observe(Some("menu"));

        assert_eq!(
            state.observe(None),
            Transition::Lost {
                from: "menu".to_string()
            }
        );
        assert_eq!(state.current, None);
        assert_eq!(state.previous.as_deref(), Some("menu"));

        assert_eq!(state.observe(None), Transition::StillUnknown);
        assert_eq!(state.previous.as_deref(), Some("menu"));
        assert_eq!(state.unmatched, 2);
    }

    #[test]
    fn test_reentry_after_unknown_is_a_new_entry() {
        let mut state = EngineState::new();
        state.observe(Some("menu"));
        state.observe(None);
        assert!(matches!(
            state.observe(Some("menu")),
            Transition::Entered { from: None, .. }
        ));
    }

    #[test]
    fn test_stop_handle_shared() {
        let handle = StopHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_requested());

        clone.stop();
        assert!(handle.is_requested());

        handle.reset();
        assert!(!clone.is_requested());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(RunPhase::Running.to_string(), "Running");
    }
}
