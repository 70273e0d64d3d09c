//! Camera interface

use image::DynamicImage;
use inspectkit_core::{CameraSettings, HardwareError, WhiteBalanceGains};

/// Frame source used for autofocus and image capture
pub trait Camera: Send + Sync {
    /// Capture one frame, blocking until the sensor delivers it
    fn capture_frame(&self) -> Result<DynamicImage, HardwareError>;

    /// Apply acquisition settings and white balance gains
    ///
    /// Drivers are free to ignore the gains; whether they reach the capture
    /// pipeline depends on the sensor backend.
    fn apply_settings(
        &self,
        settings: &CameraSettings,
        gains: WhiteBalanceGains,
    ) -> Result<(), HardwareError>;
}
