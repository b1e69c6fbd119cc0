//! Engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{defaults, timeouts};

fn default_error_clear_delay_ms() -> u64 {
    timeouts::ERROR_CLEAR_MS
}

fn default_analyze_instruction() -> String {
    defaults::ANALYZE_INSTRUCTION.to_string()
}

/// Tunables of a `FusionEngine`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Milliseconds before a failure message is removed from its node
    #[serde(default = "default_error_clear_delay_ms")]
    pub error_clear_delay_ms: u64,
    /// Instruction sent by analyze nodes with a blank instruction
    #[serde(default = "default_analyze_instruction")]
    pub default_analyze_instruction: String,
}

impl EngineConfig {
    pub fn error_clear_delay(&self) -> Duration {
        Duration::from_millis(self.error_clear_delay_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            error_clear_delay_ms: default_error_clear_delay_ms(),
            default_analyze_instruction: default_analyze_instruction(),
        }
    }
}
