//! Language service coordinator
//!
//! Owns every analysis state, keyed by context then moniker, and drives
//! them through the work queue. Modules are registered, updated, and
//! removed here; queries go through `get_types`. The coordinator is the
//! only place the dependency graph is walked: when a run changes a state
//! it re-queues that state's dependents, and when a new module arrives it
//! re-queues every state still waiting on an unresolved import.

use crate::cancel::CancellationToken;
use crate::config::AnalyzerConfig;
use crate::driver;
use crate::error::{AnalysisError, Result};
use crate::module::{ContextId, ModuleId, ModuleInput};
use crate::queue::{QueueReason, WorkQueue};
use crate::seed;
use crate::state::{AnalysisState, ModuleStatus};
use dashmap::DashMap;
use serde::Serialize;
use skiff_values::TypeSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Per-context table of module states
#[derive(Debug, Default)]
struct ContextState {
    states: DashMap<ModuleId, Arc<AnalysisState>>,
}

/// A problem the engine chose to report instead of fail on
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisDiagnostic {
    pub context: String,
    pub moniker: String,
    pub message: String,
    pub passes: usize,
}

/// The analysis engine's front door
pub struct LanguageService {
    config: AnalyzerConfig,
    contexts: DashMap<ContextId, Arc<ContextState>>,
    queue: WorkQueue,
    diagnostics: Mutex<Vec<AnalysisDiagnostic>>,
}

impl LanguageService {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            config,
            contexts: DashMap::new(),
            queue: WorkQueue::new(),
            diagnostics: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    fn context_state(&self, context: &ContextId) -> Arc<ContextState> {
        self.contexts
            .entry(context.clone())
            .or_insert_with(|| Arc::new(ContextState::default()))
            .value()
            .clone()
    }

    /// Look up a module's state. With a context, only that context is
    /// searched unless `search_all_contexts` is set; with no context the
    /// first match across all contexts wins.
    pub fn get_analysis_state(
        &self,
        context: Option<&ContextId>,
        moniker: &str,
        search_all_contexts: bool,
    ) -> Option<Arc<AnalysisState>> {
        let moniker = ModuleId::from(moniker);
        if let Some(context) = context {
            if let Some(ctx) = self.contexts.get(context) {
                if let Some(state) = ctx.states.get(&moniker) {
                    return Some(state.value().clone());
                }
            }
            if !search_all_contexts {
                return None;
            }
        }
        for ctx in self.contexts.iter() {
            if let Some(state) = ctx.states.get(&moniker) {
                return Some(state.value().clone());
            }
        }
        None
    }

    /// Register a module and seed it from structured input. Re-registering
    /// an existing moniker replaces its content, as `update_module` does.
    pub async fn add_module(
        &self,
        context: &ContextId,
        moniker: &str,
        input: &ModuleInput,
    ) -> Arc<AnalysisState> {
        let ctx = self.context_state(context);
        let moniker = ModuleId::from(moniker);
        let existing = ctx.states.get(&moniker).map(|s| s.value().clone());
        let state = match existing {
            Some(state) => state,
            None => {
                let state = AnalysisState::new(context.clone(), moniker.clone());
                ctx.states.insert(moniker.clone(), state.clone());
                state
            }
        };

        let (variables, rules) = seed::build(moniker.as_str(), input);
        state.seed(variables, rules).await;
        info!(context = %context, moniker = %moniker, version = state.version(), "module seeded");
        self.queue.push(state.clone(), QueueReason::Seeded);

        // A new moniker may satisfy imports that failed to resolve before.
        self.requeue_pending_imports(moniker.as_str());
        state
    }

    /// Replace an existing module's content. Returns `None` when the
    /// moniker was never registered in this context.
    pub async fn update_module(
        &self,
        context: &ContextId,
        moniker: &str,
        input: &ModuleInput,
    ) -> Option<Arc<AnalysisState>> {
        let ctx = self.contexts.get(context)?.value().clone();
        let state = ctx.states.get(&ModuleId::from(moniker))?.value().clone();

        let (variables, rules) = seed::build(moniker, input);
        state.seed(variables, rules).await;
        debug!(context = %context, moniker, version = state.version(), "module re-seeded");
        self.queue.push(state.clone(), QueueReason::Seeded);
        self.requeue_dependents(&state).await;
        Some(state)
    }

    /// Forget a module. Its state is torn down so in-flight readers see
    /// `StateUnavailable`, and producers it watched drop the back-reference.
    pub async fn remove_module(&self, context: &ContextId, moniker: &str) -> bool {
        let Some(ctx) = self.contexts.get(context).map(|c| c.value().clone()) else {
            return false;
        };
        let Some((_, state)) = ctx.states.remove(&ModuleId::from(moniker)) else {
            return false;
        };

        // Dependents lose this module's exports; their next run recomputes
        // the import as unresolved.
        self.requeue_dependents(&state).await;
        let watched = state.tear_down().await;
        for producer in watched {
            producer.remove_dependent(&state).await;
        }
        info!(context = %context, moniker, "module removed");
        true
    }

    /// Subscribe `consumer` to `producer`'s version bumps. Idempotent.
    pub async fn add_notification(
        &self,
        producer: &Arc<AnalysisState>,
        consumer: &Arc<AnalysisState>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        cancel.bail_if_cancelled()?;
        if Arc::ptr_eq(producer, consumer) {
            return Ok(());
        }
        if producer.add_dependent(consumer).await {
            consumer.add_watch(producer).await;
        }
        Ok(())
    }

    /// Types currently known for a name in a module. Unresolvable module
    /// or unavailable state yields an empty set, never an error.
    pub async fn get_types(
        &self,
        context: &ContextId,
        moniker: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<TypeSet> {
        cancel.bail_if_cancelled()?;
        let Some(state) = self.get_analysis_state(Some(context), moniker, false) else {
            return Ok(TypeSet::default());
        };
        match state.get_types(name).await {
            Ok(types) => Ok(types),
            Err(e) if e.is_transient() => Ok(TypeSet::default()),
            Err(e) => Err(e),
        }
    }

    /// Explicitly queue a module for a convergence run
    pub fn schedule_module(&self, state: Arc<AnalysisState>) -> bool {
        self.queue.push(state, QueueReason::Requested)
    }

    /// Drain the work queue, running each state to fixpoint and cascading
    /// through dependents until nothing is left to do
    pub async fn run_until_idle(&self, cancel: &CancellationToken) -> Result<()> {
        while let Some(item) = self.queue.pop() {
            if cancel.is_cancelled() {
                // Leave the item where the next run will find it.
                self.queue.push(item.state, item.reason);
                return Err(AnalysisError::Cancelled);
            }
            let state = item.state;
            if state.is_torn_down() || state.status().await == ModuleStatus::Suspended {
                continue;
            }

            match driver::update_rules(self, &state, cancel).await {
                Ok(outcome) => {
                    if outcome.changed {
                        self.requeue_dependents(&state).await;
                    }
                }
                Err(AnalysisError::NonConvergence { moniker, passes }) => {
                    warn!(moniker = %moniker, passes, "analysis did not converge; suspending module");
                    state.mark_suspended().await;
                    self.diagnostics.lock().unwrap().push(AnalysisDiagnostic {
                        context: state.context().to_string(),
                        moniker,
                        message: "analysis did not converge".into(),
                        passes,
                    });
                }
                Err(AnalysisError::Cancelled) => {
                    self.queue.push(state, item.reason);
                    return Err(AnalysisError::Cancelled);
                }
                Err(e) => {
                    debug!(moniker = %state.moniker(), error = %e, "skipping unavailable state");
                }
            }
        }
        Ok(())
    }

    async fn requeue_dependents(&self, state: &Arc<AnalysisState>) {
        for dependent in state.dependents().await {
            if dependent.is_torn_down() {
                continue;
            }
            dependent.mark_stale().await;
            self.queue
                .push(dependent, QueueReason::DependencyChanged);
        }
    }

    /// Re-queue every state whose import resolution came up empty, now
    /// that `moniker` exists
    fn requeue_pending_imports(&self, moniker: &str) {
        for ctx in self.contexts.iter() {
            for entry in ctx.states.iter() {
                let state = entry.value();
                if state.moniker().as_str() == moniker {
                    continue;
                }
                if state.has_pending_import() {
                    self.queue
                        .push(state.clone(), QueueReason::DependencyChanged);
                }
            }
        }
    }

    /// Diagnostics accumulated since the service was created
    pub fn diagnostics(&self) -> Vec<AnalysisDiagnostic> {
        self.diagnostics.lock().unwrap().clone()
    }

    /// Every registered `(context, state)` pair, for reporting
    pub fn modules(&self) -> Vec<(ContextId, Arc<AnalysisState>)> {
        let mut out = Vec::new();
        for ctx in self.contexts.iter() {
            for entry in ctx.states.iter() {
                out.push((ctx.key().clone(), entry.value().clone()));
            }
        }
        out.sort_by(|a, b| (&a.0, a.1.moniker()).cmp(&(&b.0, b.1.moniker())));
        out
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    pub fn scheduled_count(&self) -> u64 {
        self.queue.scheduled_count()
    }

    pub fn requeue_count(&self) -> u64 {
        self.queue.requeue_count()
    }
}

impl Default for LanguageService {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}
