//! Import resolution rule
//!
//! Binds names from another module into the owning module's namespace.
//! Resolution is attempted same-context first, then across all contexts,
//! and failure is not an error: the rule contributes nothing and retries
//! on every later pass, which makes it robust to registration order and
//! circular imports. Before reading the imported state the rule registers
//! the owner as a dependent, so future edits to the imported module
//! re-trigger this rule.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::module::MODULE_SELF_NAME;
use crate::results::RuleResults;
use crate::rule::AnalysisRule;
use crate::service::LanguageService;
use crate::state::AnalysisState;
use async_trait::async_trait;
use im::OrdMap;
use skiff_values::TypeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Import name meaning "every exported name"
pub const WILDCARD_NAME: &str = "*";

/// Which state the rule last read, and at what version
///
/// The weak reference pins the gate to one concrete state: a module that
/// is removed and re-registered comes back as a fresh state whose version
/// counter restarts, so a bare version number would wrongly short-circuit
/// against it.
#[derive(Debug, Default)]
struct ObservedSource {
    state: Weak<AnalysisState>,
    version: u64,
}

/// `from <module> import <name> as <targets>`, or the wildcard form
#[derive(Debug)]
pub struct ImportFromModule {
    module: String,
    /// Name in the imported module; empty means the module's own
    /// as-a-value binding point, `*` means every exported name
    import_name: String,
    targets: Vec<Arc<str>>,
    /// Last observed source state and version; the short-circuit that
    /// keeps fixpoint passes cheap on large graphs
    observed: Mutex<ObservedSource>,
    recomputes: AtomicU64,
    memo: Mutex<OrdMap<Arc<str>, TypeSet>>,
}

impl ImportFromModule {
    pub fn new(
        module: impl Into<String>,
        import_name: impl Into<String>,
        targets: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        Self {
            module: module.into(),
            import_name: import_name.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            observed: Mutex::new(ObservedSource::default()),
            recomputes: AtomicU64::new(0),
            memo: Mutex::new(OrdMap::new()),
        }
    }

    /// Version at which this rule last read `imported`; zero when the
    /// last read was a different state (or there was none)
    fn observed_version(&self, imported: &Arc<AnalysisState>) -> u64 {
        let observed = self.observed.lock().unwrap();
        if observed.state.as_ptr() == Arc::as_ptr(imported) {
            observed.version
        } else {
            0
        }
    }

    fn record_observed(&self, imported: &Arc<AnalysisState>, version: u64) {
        *self.observed.lock().unwrap() = ObservedSource {
            state: Arc::downgrade(imported),
            version,
        };
    }

    fn forget_observed(&self) {
        *self.observed.lock().unwrap() = ObservedSource::default();
    }

    /// `from <module> import *`
    pub fn wildcard(module: impl Into<String>) -> Self {
        Self::new(module, WILDCARD_NAME, Vec::<Arc<str>>::new())
    }

    fn store(&self, contribution: OrdMap<Arc<str>, TypeSet>) -> bool {
        let mut memo = self.memo.lock().unwrap();
        if *memo == contribution {
            false
        } else {
            *memo = contribution;
            true
        }
    }
}

#[async_trait]
impl AnalysisRule for ImportFromModule {
    async fn apply(
        &self,
        service: &LanguageService,
        owner: &Arc<AnalysisState>,
        _results: &RuleResults,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        cancel.bail_if_cancelled()?;
        if self.module.is_empty() {
            return Ok(false);
        }

        // Same-context lookup first, then cross-context so one analysis
        // of the imported module can be shared between contexts.
        let imported = service
            .get_analysis_state(Some(owner.context()), &self.module, false)
            .or_else(|| service.get_analysis_state(None, &self.module, true));
        let imported = match imported {
            Some(state) => state,
            None => {
                self.forget_observed();
                owner.set_pending_import();
                return Ok(false);
            }
        };

        service.add_notification(&imported, owner, cancel).await?;

        let version = imported.version();
        if version == 0 {
            // Registered but never seeded; retry once it has content.
            owner.set_pending_import();
            return Ok(false);
        }
        if version <= self.observed_version(&imported) {
            return Ok(false);
        }

        cancel.bail_if_cancelled()?;
        let exports = match imported.export_types().await {
            Ok(exports) => exports,
            Err(e) if e.is_transient() => {
                self.forget_observed();
                owner.set_pending_import();
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        self.recomputes.fetch_add(1, Ordering::Relaxed);

        let mut contribution: OrdMap<Arc<str>, TypeSet> = OrdMap::new();
        if self.import_name == WILDCARD_NAME {
            for (name, types) in exports.iter() {
                // Internal bindings such as $module stay home.
                if name.starts_with('$') {
                    continue;
                }
                contribution.insert(name.clone(), types.clone());
            }
        } else {
            let source: &str = if self.import_name.is_empty() {
                MODULE_SELF_NAME
            } else {
                &self.import_name
            };
            let types = exports.get(source).cloned().unwrap_or_default();
            for target in &self.targets {
                contribution.insert(target.clone(), types.clone());
            }
        }

        // Recorded even when no type actually changed: once synchronized
        // with this version there is nothing new to re-read until the
        // imported state bumps again.
        self.record_observed(&imported, version);
        Ok(self.store(contribution))
    }

    fn contribution(&self) -> OrdMap<Arc<str>, TypeSet> {
        self.memo.lock().unwrap().clone()
    }

    fn contribution_for(&self, name: &str) -> Option<TypeSet> {
        self.memo.lock().unwrap().get(name).cloned()
    }

    fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::Relaxed)
    }
}

impl fmt::Display for ImportFromModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if self.import_name.is_empty() {
            MODULE_SELF_NAME
        } else {
            &self.import_name
        };
        let targets: Vec<&str> = self.targets.iter().map(|t| t.as_ref()).collect();
        write!(
            f,
            "from {} import {} as {{{}}}",
            self.module,
            name,
            targets.join(", ")
        )
    }
}
