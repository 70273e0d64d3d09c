//! # InspectKit Focus
//!
//! Image sharpness scoring, colour temperature to white balance conversion,
//! and the autofocus sweep over the Z axis.

pub mod autofocus;
pub mod sharpness;
pub mod white_balance;

pub use autofocus::{FocusEngine, FocusSample};
pub use sharpness::{gaussian_sigma, sharpness_score};
pub use white_balance::{apply_camera_settings, color_temperature_to_rgb, white_balance_gains};
