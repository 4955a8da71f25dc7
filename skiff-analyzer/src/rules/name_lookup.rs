//! Local name lookup rule
//!
//! Copies whatever types one local name currently has into one or more
//! target names (`alias y = x`). Reads go through the in-progress results
//! view, so an alias of an imported name settles in the same convergence
//! run as the import itself.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::results::RuleResults;
use crate::rule::AnalysisRule;
use crate::service::LanguageService;
use crate::state::AnalysisState;
use async_trait::async_trait;
use im::OrdMap;
use skiff_values::TypeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// `<source> -> {targets}` within the owning module
#[derive(Debug)]
pub struct NameLookup {
    source: Arc<str>,
    targets: Vec<Arc<str>>,
    recomputes: AtomicU64,
    memo: Mutex<OrdMap<Arc<str>, TypeSet>>,
}

impl NameLookup {
    pub fn new(
        source: impl Into<Arc<str>>,
        targets: impl IntoIterator<Item = impl Into<Arc<str>>>,
    ) -> Self {
        Self {
            source: source.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            recomputes: AtomicU64::new(0),
            memo: Mutex::new(OrdMap::new()),
        }
    }
}

#[async_trait]
impl AnalysisRule for NameLookup {
    async fn apply(
        &self,
        _service: &LanguageService,
        _owner: &Arc<AnalysisState>,
        results: &RuleResults,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        cancel.bail_if_cancelled()?;
        let types = results.get_types(&self.source);
        self.recomputes.fetch_add(1, Ordering::Relaxed);

        let mut contribution: OrdMap<Arc<str>, TypeSet> = OrdMap::new();
        for target in &self.targets {
            contribution.insert(target.clone(), types.clone());
        }

        let mut memo = self.memo.lock().unwrap();
        if *memo == contribution {
            Ok(false)
        } else {
            *memo = contribution;
            Ok(true)
        }
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

impl fmt::Display for NameLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<&str> = self.targets.iter().map(|t| t.as_ref()).collect();
        write!(f, "{} -> {{{}}}", self.source, targets.join(", "))
    }
}
