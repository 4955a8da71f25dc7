//! Read view over in-progress rule results
//!
//! During a convergence run, rules read names through this view: the
//! seeded snapshot unioned with every rule's current contribution. Rules
//! never mutate the view directly — each owns its memoized contribution —
//! so a later rule in the same pass immediately observes an earlier rule's
//! output without any merge choreography.

use crate::rule::AnalysisRule;
use im::OrdMap;
use skiff_values::{TypeSet, Variable};
use std::sync::Arc;

/// Combined view of seeded bindings and current rule contributions
pub struct RuleResults {
    base: OrdMap<Arc<str>, Variable>,
    rules: Vec<Arc<dyn AnalysisRule>>,
}

impl RuleResults {
    pub fn new(base: OrdMap<Arc<str>, Variable>, rules: Vec<Arc<dyn AnalysisRule>>) -> Self {
        Self { base, rules }
    }

    /// Current types for a name: seeded binding plus every rule's
    /// contribution. Missing names yield an empty set.
    pub fn get_types(&self, name: &str) -> TypeSet {
        let mut types = self
            .base
            .get(name)
            .map(|v| v.types().clone())
            .unwrap_or_default();
        for rule in &self.rules {
            if let Some(extra) = rule.contribution_for(name) {
                types.union_with(&extra);
            }
        }
        types
    }

    /// The derived layer to commit: the union of all rule contributions,
    /// rebuilt from the memos so a recomputed rule replaces its previous
    /// output instead of accreting it
    pub fn derived(&self) -> OrdMap<Arc<str>, TypeSet> {
        let mut derived: OrdMap<Arc<str>, TypeSet> = OrdMap::new();
        for rule in &self.rules {
            for (name, types) in rule.contribution() {
                if let Some(existing) = derived.get_mut(&name) {
                    existing.union_with(&types);
                } else {
                    derived.insert(name, types);
                }
            }
        }
        derived
    }
}
