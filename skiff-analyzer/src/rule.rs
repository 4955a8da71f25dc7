//! The analysis rule contract
//!
//! A rule is one unit of derivation logic: it reads the owning state (and
//! possibly other states through the language service) and produces a
//! contribution — a map from names to type sets — that the driver merges
//! into the owning state's derived bindings. Every rule memoizes its last
//! contribution and reports change against it; rules that read other
//! states additionally record the version they read, so an unchanged
//! input costs nothing beyond a version compare.

use crate::cancel::CancellationToken;
use crate::error::Result;
use crate::results::RuleResults;
use crate::service::LanguageService;
use crate::state::AnalysisState;
use async_trait::async_trait;
use im::OrdMap;
use skiff_values::TypeSet;
use std::fmt;
use std::sync::Arc;

/// One derivation step over an analysis state
///
/// `apply` must: return `Ok(false)` without side effects when its
/// prerequisites are missing; short-circuit on an unchanged referenced
/// version where it reads another state; otherwise recompute its
/// contribution in full and report whether the contribution changed. A rule
/// only ever replaces its own contribution — names written by other rules
/// or by the seeded bindings are never touched.
#[async_trait]
pub trait AnalysisRule: Send + Sync + fmt::Debug + fmt::Display {
    async fn apply(
        &self,
        service: &LanguageService,
        owner: &Arc<AnalysisState>,
        results: &RuleResults,
        cancel: &CancellationToken,
    ) -> Result<bool>;

    /// The rule's current memoized contribution
    fn contribution(&self) -> OrdMap<Arc<str>, TypeSet>;

    /// The memoized types this rule contributes to one name
    fn contribution_for(&self, name: &str) -> Option<TypeSet>;

    /// How many times the rule has rebuilt its contribution. For rules
    /// that read other states this counts actual re-reads, making the
    /// version short-circuit observable; for purely local rules it
    /// counts applies.
    fn recompute_count(&self) -> u64;
}
