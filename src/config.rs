//! Supervisor configuration.
//!
//! Settings live in `<project>/.claude/supervision.json` with camelCase keys.
//! Every field is optional; a missing file means all defaults.
//!
//! ```json
//! {
//!   "mode": "strict",
//!   "minResponseIntervalMs": 5000,
//!   "claudeArgs": ["--verbose"]
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::DEFAULT_REQUIREMENTS_FILES;
use crate::decision::SupervisionMode;
use crate::error::{OverseerError, Result};

/// Supervisor settings for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SupervisorConfig {
    /// Supervision mode
    pub mode: SupervisionMode,
    /// Minimum spacing between two delivered responses
    pub min_response_interval_ms: u64,
    /// Window in which a repeated question is not answered again
    pub dedup_window_ms: u64,
    /// Period of the monitored-process liveness check
    pub liveness_interval_ms: u64,
    /// Lines kept per output channel
    pub buffer_capacity: usize,
    /// Decisions kept in the history
    pub history_capacity: usize,
    /// Trailing window for recurrence escalation
    pub recurrence_window_secs: u64,
    /// Consecutive implementation markers that start the implementation phase
    pub implementation_streak: u32,
    /// Preferred requirements document, tried before the usual names
    pub requirements_file: String,
    /// Project-instruction file
    pub instructions_file: String,
    /// Monitored CLI executable
    pub claude_binary: String,
    /// Extra arguments for the monitored CLI
    pub claude_args: Vec<String>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            mode: SupervisionMode::Balanced,
            min_response_interval_ms: 3000,
            dedup_window_ms: 5000,
            liveness_interval_ms: 2000,
            buffer_capacity: 1000,
            history_capacity: 100,
            recurrence_window_secs: 300,
            implementation_streak: 3,
            requirements_file: "PRD.md".to_string(),
            instructions_file: "CLAUDE.md".to_string(),
            claude_binary: "claude".to_string(),
            claude_args: Vec::new(),
        }
    }
}

impl SupervisorConfig {
    /// Load and validate the project's configuration.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::config_path(project_dir);
        if !path.exists() {
            debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .map_err(|e| OverseerError::config_with_path(e.to_string(), path.clone()))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| OverseerError::config_with_path(e.to_string(), path.clone()))?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Location of the configuration file for a project.
    #[must_use]
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(".claude/supervision.json")
    }

    /// Reject values the supervisor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(OverseerError::invalid_config(
                "bufferCapacity",
                "must be greater than zero",
            ));
        }
        if self.history_capacity == 0 {
            return Err(OverseerError::invalid_config(
                "historyCapacity",
                "must be greater than zero",
            ));
        }
        if self.liveness_interval_ms == 0 {
            return Err(OverseerError::invalid_config(
                "livenessIntervalMs",
                "must be greater than zero",
            ));
        }
        if self.claude_binary.trim().is_empty() {
            return Err(OverseerError::invalid_config(
                "claudeBinary",
                "must not be empty",
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn with_mode(mut self, mode: SupervisionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_min_response_interval_ms(mut self, ms: u64) -> Self {
        self.min_response_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn min_response_interval(&self) -> Duration {
        Duration::from_millis(self.min_response_interval_ms)
    }

    #[must_use]
    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    #[must_use]
    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    #[must_use]
    pub fn recurrence_window(&self) -> Duration {
        Duration::from_secs(self.recurrence_window_secs)
    }

    /// Requirements document names to try, preferred name first.
    #[must_use]
    pub fn requirement_candidates(&self) -> Vec<String> {
        let mut names = vec![self.requirements_file.clone()];
        for name in DEFAULT_REQUIREMENTS_FILES {
            if !names.iter().any(|n| n.as_str() == *name) {
                names.push((*name).to_string());
            }
        }
        names
    }
}
