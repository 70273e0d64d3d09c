//! Per-capture metadata and camera settings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Camera acquisition settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraSettings {
    /// Exposure time in microseconds
    pub exposure_us: u32,
    /// Analogue gain
    pub gain: f64,
    /// Contrast multiplier
    pub contrast: f64,
    /// White point in Kelvin
    pub color_temperature_k: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            exposure_us: 10_000,
            gain: 1.0,
            contrast: 1.0,
            color_temperature_k: 5500,
        }
    }
}

/// Red/blue channel gains relative to green
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhiteBalanceGains {
    /// Red gain
    pub red: f64,
    /// Blue gain
    pub blue: f64,
}

impl Default for WhiteBalanceGains {
    fn default() -> Self {
        Self {
            red: 1.0,
            blue: 1.0,
        }
    }
}

/// Per-capture record persisted next to the image
///
/// Serialized as a flat key/value record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// File stem of the image
    pub image_name: String,
    /// Sample the image belongs to
    pub sample_id: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Layer the sample was on when captured
    pub layer: u32,
    /// Index of the image within its run
    pub image_index: usize,
    /// Carriage X position in mm
    pub x_mm: f64,
    /// Carriage Y position in mm
    pub y_mm: f64,
    /// Carriage Z position in mm
    pub z_mm: f64,
    /// Exposure time in microseconds
    pub exposure_us: u32,
    /// Analogue gain
    pub gain: f64,
    /// Contrast multiplier
    pub contrast: f64,
    /// White point in Kelvin
    pub color_temperature_k: u32,
}

impl ImageMetadata {
    /// Conventional image name: `<sample>_L<layer>_<index>`
    ///
    /// Characters of the sample id other than ASCII alphanumerics, `-`, `_`
    /// and `.` become `_`, so the name is always a single path component.
    pub fn image_name_for(sample_id: &str, layer: u32, image_index: usize) -> String {
        let id: String = sample_id
            .chars()
            .map(|c| if is_name_char(c) { c } else { '_' })
            .collect();
        format!("{}_L{:03}_{:04}", id, layer, image_index)
    }
}

/// Characters kept verbatim in file names derived from a sample id
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}
