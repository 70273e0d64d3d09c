//! InspectKit Settings Crate
//!
//! Handles instrument configuration: machine geometry and timing, focus
//! search parameters, sampling delays, camera defaults, image buffer
//! location and status cadence.

pub mod config;
pub mod error;

pub use config::{
    Config, FocusSettings, MachineSettings, SamplingSettings, StatusSettings, StorageSettings,
};
pub use error::{Result, SettingsError};
