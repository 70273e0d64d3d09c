//! Configuration and settings management for InspectKit
//!
//! Supports JSON and TOML file formats. Every section carries defaults, so a
//! configuration file only needs the keys that differ from them.
//!
//! Configuration is organized into logical sections:
//! - Machine geometry and pulse timing
//! - Focus search parameters
//! - Sampling delays
//! - Camera defaults
//! - Image buffer location
//! - Status reporting cadence

use inspectkit_core::{CameraSettings, CoreXyConvention};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SettingsError};

/// Machine geometry, pulse timing and homing limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Carriage travel per X/Y step in mm
    pub xy_step_distance_mm: f64,
    /// Carriage travel per Z step in mm
    pub z_step_distance_mm: f64,
    /// CoreXY belt sign convention
    pub corexy: CoreXyConvention,
    /// How long the step line is held high
    pub pulse_width_us: u64,
    /// Pause after each step pulse
    pub step_interval_us: u64,
    /// Steps a homing move may take before it is declared failed
    pub homing_max_steps: u64,
    /// Polls of a limit switch expecting it released before homing that axis
    pub switch_poll_attempts: u32,
    /// Pause between limit switch polls
    pub switch_poll_interval_ms: u64,
    /// Stage centre X in mm
    pub stage_center_x_mm: f64,
    /// Stage centre Y in mm
    pub stage_center_y_mm: f64,
    /// Z at which the bare stage surface is in focus
    pub stage_focus_height_mm: f64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            xy_step_distance_mm: 0.0125,
            z_step_distance_mm: 0.0025,
            corexy: CoreXyConvention::Standard,
            pulse_width_us: 5,
            step_interval_us: 500,
            homing_max_steps: 40_000,
            switch_poll_attempts: 10,
            switch_poll_interval_ms: 10,
            stage_center_x_mm: 100.0,
            stage_center_y_mm: 100.0,
            stage_focus_height_mm: 20.0,
        }
    }
}

impl MachineSettings {
    /// Step-high duration
    pub fn pulse_width(&self) -> Duration {
        Duration::from_micros(self.pulse_width_us)
    }

    /// Inter-step pause
    pub fn step_interval(&self) -> Duration {
        Duration::from_micros(self.step_interval_us)
    }

    /// Pause between switch polls
    pub fn switch_poll_interval(&self) -> Duration {
        Duration::from_millis(self.switch_poll_interval_ms)
    }
}

/// Autofocus search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusSettings {
    /// Default sweep extends this far either side of the expected surface
    pub half_range_mm: f64,
    /// Default sweep step
    pub step_mm: f64,
    /// Smoothing radius used by the sharpness score
    pub blur_radius: u32,
    /// Score below which the sample is considered undetected
    pub detection_threshold: f64,
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            half_range_mm: 1.0,
            step_mm: 0.05,
            blur_radius: 3,
            detection_threshold: 1.0,
        }
    }
}

/// Sampling routine timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingSettings {
    /// Pause between arriving at a point and capturing it
    pub settle_delay_ms: u64,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 500,
        }
    }
}

impl SamplingSettings {
    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Where captured images are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Buffer directory for images and metadata
    pub buffer_dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            buffer_dir: dirs::data_local_dir()
                .map(|dir| dir.join("inspectkit").join("buffer"))
                .unwrap_or_else(|| PathBuf::from("buffer")),
        }
    }
}

/// Status reporting cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSettings {
    /// Interval between status snapshots
    pub poll_interval_ms: u64,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

impl StatusSettings {
    /// Poll interval as a duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Complete instrument configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Machine geometry and timing
    pub machine: MachineSettings,
    /// Autofocus parameters
    pub focus: FocusSettings,
    /// Sampling timing
    pub sampling: SamplingSettings,
    /// Camera defaults applied at startup
    pub camera: CameraSettings,
    /// Image buffer location
    pub storage: StorageSettings,
    /// Status reporting
    pub status: StatusSettings,
}

enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> Result<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(SettingsError::UnsupportedFormat(
            other.unwrap_or_default().to_string(),
        )),
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with every pulse, poll and settle delay set to zero
    ///
    /// Used with the simulated stage, where waiting buys nothing.
    pub fn instant() -> Self {
        let mut config = Self::default();
        config.machine.pulse_width_us = 0;
        config.machine.step_interval_us = 0;
        config.machine.switch_poll_interval_ms = 0;
        config.sampling.settle_delay_ms = 0;
        config
    }

    /// Default location: `<config dir>/inspectkit/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("inspectkit").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load config from `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            tracing::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        // Machine geometry
        for (key, value) in [
            ("machine.xy_step_distance_mm", self.machine.xy_step_distance_mm),
            ("machine.z_step_distance_mm", self.machine.z_step_distance_mm),
        ] {
            if !is_positive(value) {
                return Err(SettingsError::invalid(key, "must be a finite value > 0"));
            }
        }
        for (key, value) in [
            ("machine.stage_center_x_mm", self.machine.stage_center_x_mm),
            ("machine.stage_center_y_mm", self.machine.stage_center_y_mm),
            ("machine.stage_focus_height_mm", self.machine.stage_focus_height_mm),
            ("focus.detection_threshold", self.focus.detection_threshold),
        ] {
            if !value.is_finite() {
                return Err(SettingsError::invalid(key, "must be finite"));
            }
        }
        if self.machine.switch_poll_attempts == 0 {
            return Err(SettingsError::invalid(
                "machine.switch_poll_attempts",
                "must be > 0",
            ));
        }
        if self.machine.homing_max_steps == 0 {
            return Err(SettingsError::invalid(
                "machine.homing_max_steps",
                "must be > 0",
            ));
        }

        // Focus
        if !is_positive(self.focus.step_mm) {
            return Err(SettingsError::invalid(
                "focus.step_mm",
                "must be a finite value > 0",
            ));
        }
        if !is_positive(self.focus.half_range_mm) {
            return Err(SettingsError::invalid(
                "focus.half_range_mm",
                "must be a finite value > 0",
            ));
        }

        // Storage
        if self.storage.buffer_dir.as_os_str().is_empty() {
            return Err(SettingsError::invalid(
                "storage.buffer_dir",
                "must not be empty",
            ));
        }

        // Status
        if self.status.poll_interval_ms == 0 {
            return Err(SettingsError::invalid(
                "status.poll_interval_ms",
                "must be > 0",
            ));
        }

        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.machine.switch_poll_attempts, 10);
        assert_eq!(config.focus.half_range_mm, 1.0);
        assert_eq!(config.focus.step_mm, 0.05);
        assert_eq!(config.focus.detection_threshold, 1.0);
        assert_eq!(config.sampling.settle_delay(), Duration::from_millis(500));
        assert_eq!(config.status.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_instant_has_no_delays() {
        let config = Config::instant();
        assert!(config.machine.pulse_width().is_zero());
        assert!(config.machine.step_interval().is_zero());
        assert!(config.machine.switch_poll_interval().is_zero());
        assert!(config.sampling.settle_delay().is_zero());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.machine.xy_step_distance_mm = 0.0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::InvalidSetting { .. })
        ));

        let mut config = Config::default();
        config.machine.switch_poll_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.focus.step_mm = -0.05;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.buffer_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_and_nan() {
        let mut config = Config::default();
        config.focus.half_range_mm = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.focus.step_mm = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.machine.z_step_distance_mm = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.machine.xy_step_distance_mm = f64::INFINITY;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.focus.detection_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [machine]
            corexy = "mirrored"

            [focus]
            step_mm = 0.01
            "#,
        )
        .unwrap();
        assert_eq!(config.machine.corexy, CoreXyConvention::Mirrored);
        assert_eq!(config.machine.switch_poll_attempts, 10);
        assert_eq!(config.focus.step_mm, 0.01);
        assert_eq!(config.focus.half_range_mm, 1.0);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = Config::default()
            .save_to_file(Path::new("config.yaml"))
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedFormat(ext) if ext == "yaml"));
    }
}
