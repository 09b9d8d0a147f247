//! State detection: which registered state does a frame show?
//!
//! States are tried in registration order and criteria in registration
//! order; the first satisfied criterion decides. A criterion that cannot be
//! evaluated counts as unsatisfied but is logged, so a broken template path
//! is visible instead of silently never matching.

use tracing::{debug, warn};

use crate::automation::registry::{MatcherKind, StateRegistry};
use crate::capture::Frame;
use crate::error::ConfigError;
use crate::matching::MatcherTable;

/// Checks that a registry can be run with the bound matchers.
///
/// Fails when no state is registered, when the template adapter is missing,
/// or when any criterion uses a kind with no adapter. States without
/// criteria only produce a warning.
pub fn validate(registry: &StateRegistry, matchers: &MatcherTable) -> Result<(), ConfigError> {
    if registry.is_empty() {
        return Err(ConfigError::NoStates);
    }
    if !matchers.is_bound(MatcherKind::Template) {
        return Err(ConfigError::MatcherNotBound(MatcherKind::Template));
    }
    if let Some(kind) = registry
        .kinds_in_use()
        .into_iter()
        .find(|k| !matchers.is_bound(*k))
    {
        return Err(ConfigError::MatcherNotBound(kind));
    }

    for state in registry.undetectable_states() {
        warn!(state, "state has no criteria and can never be detected");
    }
    Ok(())
}

/// Returns the id of the first state with a satisfied criterion.
pub fn detect<'r>(
    registry: &'r StateRegistry,
    matchers: &MatcherTable,
    frame: &Frame,
) -> Result<Option<&'r str>, ConfigError> {
    for state in registry.states() {
        for criterion in state.criteria() {
            let matcher = matchers
                .get(criterion.kind)
                .ok_or(ConfigError::MatcherNotBound(criterion.kind))?;

            match matcher.evaluate(frame, criterion) {
                Ok(true) => {
                    debug!(
                        state = state.id(),
                        kind = %criterion.kind,
                        pattern = %criterion.pattern,
                        "criterion satisfied"
                    );
                    return Ok(Some(state.id()));
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        state = state.id(),
                        kind = %criterion.kind,
                        pattern = %criterion.pattern,
                        "could not evaluate criterion: {e}"
                    );
                }
            }
        }
    }
    Ok(None)
}
