//! `OrchestratorConfig` — tuning knobs generalized from the teacher's
//! `ExecutorConfig` (`max_retries`/`retry_base_delay`) to the fuller set
//! spec §4.3 requires, loadable from TOML the way the teacher's sibling
//! `data-designer` repo loads its config (`toml = "0.8"`) instead of the
//! teacher's own hardcoded `ExecutorConfig::default()`.

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub retry_base_delay_ms: u64,
    pub retry_factor: f64,
    pub retry_cap_ms: u64,
    pub retry_jitter_pct: f64,
    pub rollback_deadline_ms: u64,
    pub default_loop_bound: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_base_delay_ms: 250,
            retry_factor: 2.0,
            retry_cap_ms: 5_000,
            retry_jitter_pct: 0.2,
            rollback_deadline_ms: 30_000,
            default_loop_bound: 100,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, OrchestratorError> {
        toml::from_str(s).map_err(|e| OrchestratorError::Validation(format!("invalid orchestrator config: {e}")))
    }

    pub fn load_from_file(path: &std::path::Path) -> Result<Self, OrchestratorError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::Validation(format!("cannot read config file {}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }
}
