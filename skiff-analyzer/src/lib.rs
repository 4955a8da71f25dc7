//! Incremental multi-module analysis engine
//!
//! Infers the possible types of module-level names across a module graph
//! and keeps the results current as modules are added, edited, and
//! removed. Each module's knowledge lives in a versioned [`AnalysisState`];
//! declarative [`AnalysisRule`]s pull types across module boundaries; a
//! fixpoint driver runs each state's rules until a pass changes nothing;
//! and the [`LanguageService`] coordinates the whole graph through a work
//! queue, re-running only what a change can actually affect.
//!
//! Failure to resolve a module or name is not an error here. Rules that
//! come up empty contribute nothing and retry on later runs, which is what
//! makes registration order and circular imports unremarkable.

pub mod cancel;
pub mod config;
pub mod driver;
pub mod error;
pub mod module;
pub mod queue;
pub mod results;
pub mod rule;
pub mod rules;
pub mod seed;
pub mod service;
pub mod state;

pub use cancel::CancellationToken;
pub use config::AnalyzerConfig;
pub use driver::{update_rules, FixpointOutcome};
pub use error::{AnalysisError, Result};
pub use module::{
    AliasDirective, BindingKind, ContextId, ImportDirective, ImportNames, ImportedName,
    LiteralKind, ModuleId, ModuleInput, NameBinding, MODULE_SELF_NAME,
};
pub use queue::{QueueItem, QueueReason, WorkQueue};
pub use results::RuleResults;
pub use rule::AnalysisRule;
pub use rules::{ImportFromModule, NameLookup};
pub use service::{AnalysisDiagnostic, LanguageService};
pub use state::{AnalysisState, ModuleStatus, StateSnapshot};
