//! Fixpoint driver
//!
//! Repeatedly applies every rule registered on a state until a full pass
//! changes nothing, then commits the rebuilt derived layer and bumps the
//! version if anything actually changed. Termination rests on the type
//! sets growing monotonically within a run over a finite universe of type
//! values; a pass cap guards against pathological rule sets.

use crate::cancel::CancellationToken;
use crate::error::{AnalysisError, Result};
use crate::results::RuleResults;
use crate::service::LanguageService;
use crate::state::AnalysisState;
use std::sync::Arc;
use tracing::{debug, trace};

/// What one driver run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixpointOutcome {
    /// Full passes over the rule set, including the final no-change pass
    pub passes: usize,
    /// Whether the committed derived layer differs from the previous one
    pub changed: bool,
    /// True when the state had nothing to analyze (torn down mid-query)
    pub skipped: bool,
}

impl FixpointOutcome {
    fn skipped() -> Self {
        Self {
            passes: 0,
            changed: false,
            skipped: true,
        }
    }
}

/// Drive one analysis state to a local fixpoint
pub async fn update_rules(
    service: &LanguageService,
    state: &Arc<AnalysisState>,
    cancel: &CancellationToken,
) -> Result<FixpointOutcome> {
    cancel.bail_if_cancelled()?;
    let snapshot = match state.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) if e.is_transient() => return Ok(FixpointOutcome::skipped()),
        Err(e) => return Err(e),
    };
    state.clear_pending_import();

    let results = RuleResults::new(snapshot.variables.clone(), snapshot.rules.clone());
    let max_passes = service.config().max_passes;
    let mut passes = 0usize;

    loop {
        cancel.bail_if_cancelled()?;
        if passes >= max_passes {
            return Err(AnalysisError::non_convergence(
                state.moniker().as_str(),
                passes,
            ));
        }
        passes += 1;

        let mut any_change = false;
        for rule in &snapshot.rules {
            cancel.bail_if_cancelled()?;
            if rule.apply(service, state, &results, cancel).await? {
                if service.config().trace_rules {
                    trace!(rule = %rule, moniker = %state.moniker(), "rule produced new bindings");
                }
                any_change = true;
            }
        }
        if !any_change {
            break;
        }
    }

    let changed = match state.commit_derived(results.derived()).await {
        Ok(changed) => changed,
        Err(e) if e.is_transient() => return Ok(FixpointOutcome::skipped()),
        Err(e) => return Err(e),
    };
    state.mark_converged().await;
    if changed {
        state.bump_version();
    }
    debug!(moniker = %state.moniker(), passes, changed, "fixpoint run complete");

    Ok(FixpointOutcome {
        passes,
        changed,
        skipped: false,
    })
}
