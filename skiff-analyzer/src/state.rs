//! Versioned per-module analysis state
//!
//! An `AnalysisState` owns everything the engine knows about one module in
//! one context: its seeded variable bindings, the derived bindings its
//! rules have produced, the rules themselves, and the set of dependent
//! states to notify when this one changes. Mutation is serialized through
//! a per-state async mutex so a fixpoint pass always observes a consistent
//! snapshot; the version counter is the sole change signal dependents use.

use crate::error::{AnalysisError, Result};
use crate::module::{ContextId, ModuleId};
use crate::rule::AnalysisRule;
use im::OrdMap;
use skiff_values::{TypeSet, Variable};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/// Analysis lifecycle of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    /// Known by identity, no content seeded yet
    Registered,
    /// Seeded from a parse, rules not yet converged
    Parsed,
    /// The last fixpoint pass produced no change. Never terminal: any
    /// edit or dependency change moves the state back to `Parsed`.
    Converged,
    /// An edit or a dependency bump invalidated the last convergence
    Stale,
    /// A non-convergence diagnostic suspended analysis until the next
    /// re-seed
    Suspended,
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleStatus::Registered => "registered",
            ModuleStatus::Parsed => "parsed",
            ModuleStatus::Converged => "converged",
            ModuleStatus::Stale => "stale",
            ModuleStatus::Suspended => "suspended",
        };
        write!(f, "{}", s)
    }
}

/// Consistent `(variables, rules)` view handed to the fixpoint driver
#[derive(Clone)]
pub struct StateSnapshot {
    pub variables: OrdMap<Arc<str>, Variable>,
    pub rules: Vec<Arc<dyn AnalysisRule>>,
}

struct StateInner {
    /// Bindings seeded from the module's own source
    variables: OrdMap<Arc<str>, Variable>,
    /// Bindings derived by rules, committed after each convergence run
    derived: OrdMap<Arc<str>, TypeSet>,
    /// Evaluation order within a pass; convergence does not depend on it
    rules: Vec<Arc<dyn AnalysisRule>>,
    /// States to re-queue when this one changes (non-owning)
    dependents: Vec<Weak<AnalysisState>>,
    /// Producers this state registered with, for teardown cleanup
    watching: Vec<Weak<AnalysisState>>,
    status: ModuleStatus,
}

/// One unit of analysis scope: a module in a context
pub struct AnalysisState {
    context: ContextId,
    moniker: ModuleId,
    version: AtomicU64,
    torn_down: AtomicBool,
    /// Set by an import rule whose target module is not registered yet;
    /// the coordinator re-queues flagged states when new modules arrive
    pending_import: AtomicBool,
    inner: Mutex<StateInner>,
}

impl AnalysisState {
    pub fn new(context: ContextId, moniker: ModuleId) -> Arc<Self> {
        Arc::new(Self {
            context,
            moniker,
            version: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
            pending_import: AtomicBool::new(false),
            inner: Mutex::new(StateInner {
                variables: OrdMap::new(),
                derived: OrdMap::new(),
                rules: Vec::new(),
                dependents: Vec::new(),
                watching: Vec::new(),
                status: ModuleStatus::Registered,
            }),
        })
    }

    pub fn context(&self) -> &ContextId {
        &self.context
    }

    pub fn moniker(&self) -> &ModuleId {
        &self.moniker
    }

    /// Current version; strictly increasing, cheap "has anything changed"
    /// probe. Zero means the state has never been seeded.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Advance the version. Called exactly once per convergence-producing
    /// mutation; afterwards every dependent is eligible for re-queueing.
    pub fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::Acquire)
    }

    fn bail_if_torn_down(&self) -> Result<()> {
        if self.is_torn_down() {
            Err(AnalysisError::state_unavailable(self.moniker.as_str()))
        } else {
            Ok(())
        }
    }

    pub fn set_pending_import(&self) {
        self.pending_import.store(true, Ordering::Release);
    }

    pub fn clear_pending_import(&self) {
        self.pending_import.store(false, Ordering::Release);
    }

    pub fn has_pending_import(&self) -> bool {
        self.pending_import.load(Ordering::Acquire)
    }

    /// Consistent `(variables, rules)` snapshot for a fixpoint pass
    pub async fn snapshot(&self) -> Result<StateSnapshot> {
        self.bail_if_torn_down()?;
        let inner = self.inner.lock().await;
        Ok(StateSnapshot {
            variables: inner.variables.clone(),
            rules: inner.rules.clone(),
        })
    }

    /// Reset this state from a fresh parse
    ///
    /// The only place a binding's type set may shrink. Dependents and
    /// watch registrations survive; derived bindings are rebuilt by the
    /// next convergence run.
    pub async fn seed(
        &self,
        variables: OrdMap<Arc<str>, Variable>,
        rules: Vec<Arc<dyn AnalysisRule>>,
    ) {
        let mut inner = self.inner.lock().await;
        inner.variables = variables;
        inner.derived = OrdMap::new();
        inner.rules = rules;
        inner.status = ModuleStatus::Parsed;
        drop(inner);
        self.bump_version();
    }

    /// Replace the derived-bindings layer after a convergence run.
    /// Returns true if the layer actually changed.
    pub async fn commit_derived(&self, derived: OrdMap<Arc<str>, TypeSet>) -> Result<bool> {
        self.bail_if_torn_down()?;
        let mut inner = self.inner.lock().await;
        if inner.derived == derived {
            return Ok(false);
        }
        inner.derived = derived;
        Ok(true)
    }

    /// Current types for one name: seeded bindings unioned with the
    /// derived layer. Missing names yield an empty set.
    pub async fn get_types(&self, name: &str) -> Result<TypeSet> {
        self.bail_if_torn_down()?;
        let inner = self.inner.lock().await;
        let mut types = inner
            .variables
            .get(name)
            .map(|v| v.types().clone())
            .unwrap_or_default();
        if let Some(extra) = inner.derived.get(name) {
            types.union_with(extra);
        }
        Ok(types)
    }

    /// Every known `(name, types)` pair, seeded and derived merged
    pub async fn export_types(&self) -> Result<OrdMap<Arc<str>, TypeSet>> {
        self.bail_if_torn_down()?;
        let inner = self.inner.lock().await;
        let mut out: OrdMap<Arc<str>, TypeSet> = OrdMap::new();
        for (name, var) in inner.variables.iter() {
            out.insert(name.clone(), var.types().clone());
        }
        for (name, types) in inner.derived.iter() {
            if let Some(existing) = out.get_mut(name) {
                existing.union_with(types);
            } else {
                out.insert(name.clone(), types.clone());
            }
        }
        Ok(out)
    }

    pub async fn variable_names(&self) -> Result<Vec<Arc<str>>> {
        Ok(self.export_types().await?.keys().cloned().collect())
    }

    /// Register a dependent; idempotent per state pair. Returns true if
    /// the relation was newly added.
    pub async fn add_dependent(&self, dependent: &Arc<AnalysisState>) -> bool {
        let mut inner = self.inner.lock().await;
        let already = inner
            .dependents
            .iter()
            .any(|w| w.as_ptr() == Arc::as_ptr(dependent));
        if already {
            return false;
        }
        inner.dependents.push(Arc::downgrade(dependent));
        true
    }

    pub async fn remove_dependent(&self, dependent: &AnalysisState) {
        let target = dependent as *const AnalysisState;
        let mut inner = self.inner.lock().await;
        inner.dependents.retain(|w| w.as_ptr() != target);
    }

    /// Live dependents, pruning any that have been dropped
    pub async fn dependents(&self) -> Vec<Arc<AnalysisState>> {
        let mut inner = self.inner.lock().await;
        let mut live = Vec::new();
        inner.dependents.retain(|w| match w.upgrade() {
            Some(state) => {
                live.push(state);
                true
            }
            None => false,
        });
        live
    }

    /// Record a producer this state subscribed to, so teardown can remove
    /// the back-reference
    pub async fn add_watch(&self, producer: &Arc<AnalysisState>) {
        let mut inner = self.inner.lock().await;
        let already = inner
            .watching
            .iter()
            .any(|w| w.as_ptr() == Arc::as_ptr(producer));
        if !already {
            inner.watching.push(Arc::downgrade(producer));
        }
    }

    /// Mark this state unavailable and hand back the producers it was
    /// watching so the coordinator can clean up their dependents sets
    pub async fn tear_down(&self) -> Vec<Arc<AnalysisState>> {
        self.torn_down.store(true, Ordering::Release);
        let mut inner = self.inner.lock().await;
        inner.variables = OrdMap::new();
        inner.derived = OrdMap::new();
        inner.rules = Vec::new();
        inner.dependents.clear();
        let watching = std::mem::take(&mut inner.watching);
        watching.iter().filter_map(Weak::upgrade).collect()
    }

    pub async fn status(&self) -> ModuleStatus {
        self.inner.lock().await.status
    }

    pub async fn mark_converged(&self) {
        let mut inner = self.inner.lock().await;
        if inner.status != ModuleStatus::Suspended {
            inner.status = ModuleStatus::Converged;
        }
    }

    pub async fn mark_stale(&self) {
        let mut inner = self.inner.lock().await;
        if inner.status == ModuleStatus::Converged {
            inner.status = ModuleStatus::Stale;
        }
    }

    pub async fn mark_suspended(&self) {
        self.inner.lock().await.status = ModuleStatus::Suspended;
    }
}

impl fmt::Debug for AnalysisState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisState")
            .field("context", &self.context)
            .field("moniker", &self.moniker)
            .field("version", &self.version())
            .finish()
    }
}
