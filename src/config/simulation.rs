use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::rule::RuleParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Simulation time advanced per step.
    #[serde(default = "default_dt")]
    pub dt: f32,
    /// Root seed of the per-cell random streams. 0 picks a random seed.
    #[serde(default)]
    pub seed: u64,
    /// Steps executed by `run` when `--steps` is not given.
    #[serde(default = "default_steps")]
    pub steps: u32,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,
    #[serde(default = "default_max_checkpoints")]
    pub max_checkpoints: u32,
    #[serde(default = "default_checkpoint_directory")]
    pub checkpoint_directory: String,
    #[serde(default = "default_report_interval")]
    pub report_interval: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Day/night temperature swing in degrees. 0 disables the weather model.
    #[serde(default)]
    pub diurnal_amplitude: f32,
    #[serde(default = "default_diurnal_period")]
    pub diurnal_period: f32,
    #[serde(default)]
    pub rule: RuleParams,
}

fn default_dt() -> f32 {
    1.0
}
fn default_steps() -> u32 {
    100
}
fn default_parallel() -> bool {
    true
}
fn default_checkpoint_interval() -> u32 {
    50
}
fn default_max_checkpoints() -> u32 {
    10
}
fn default_checkpoint_directory() -> String {
    "./checkpoints".to_string()
}
fn default_report_interval() -> u32 {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}
fn default_diurnal_period() -> f32 {
    24.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            dt: default_dt(),
            seed: 0,
            steps: default_steps(),
            parallel: default_parallel(),
            checkpoint_interval: default_checkpoint_interval(),
            max_checkpoints: default_max_checkpoints(),
            checkpoint_directory: default_checkpoint_directory(),
            report_interval: default_report_interval(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            diurnal_amplitude: 0.0,
            diurnal_period: default_diurnal_period(),
            rule: RuleParams::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn from_file_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: SimulationConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !(self.dt.is_finite() && self.dt > 0.0) {
            errors.push(format!(
                "dt must be > 0.0, got {}. Example: dt = 1.0",
                self.dt
            ));
        }

        if self.steps == 0 {
            errors.push(format!(
                "steps must be > 0, got {}. Example: steps = 100",
                self.steps
            ));
        }

        if self.checkpoint_interval == 0 {
            errors.push(format!(
                "checkpoint_interval must be > 0, got {}. Example: checkpoint_interval = 50",
                self.checkpoint_interval
            ));
        }

        if self.max_checkpoints == 0 {
            errors.push(format!(
                "max_checkpoints must be > 0, got {}. Example: max_checkpoints = 10",
                self.max_checkpoints
            ));
        }

        if self.report_interval == 0 {
            errors.push(format!(
                "report_interval must be > 0, got {}. Example: report_interval = 10",
                self.report_interval
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            errors.push(format!(
                "log_format must be one of {:?}, got '{}'. Example: log_format = \"pretty\"",
                valid_formats, self.log_format
            ));
        }

        if !(self.diurnal_amplitude.is_finite() && self.diurnal_amplitude >= 0.0) {
            errors.push(format!(
                "diurnal_amplitude must be >= 0.0, got {}. Example: diurnal_amplitude = 6.0",
                self.diurnal_amplitude
            ));
        }

        if !(self.diurnal_period.is_finite() && self.diurnal_period > 0.0) {
            errors.push(format!(
                "diurnal_period must be > 0.0, got {}. Example: diurnal_period = 24.0",
                self.diurnal_period
            ));
        }

        errors.extend(self.rule.validation_errors());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
