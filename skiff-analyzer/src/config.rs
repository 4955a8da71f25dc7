//! Analyzer configuration

use serde::{Deserialize, Serialize};

/// Configuration for the analysis engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Safety cap on fixpoint passes per convergence run. Exceeding it
    /// surfaces a non-convergence diagnostic instead of hanging.
    pub max_passes: usize,
    /// Emit per-rule trace events while driving a state to fixpoint
    pub trace_rules: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_passes: 128,
            trace_rules: false,
        }
    }
}
