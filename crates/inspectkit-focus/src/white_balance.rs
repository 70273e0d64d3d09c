//! Colour temperature to white balance conversion
//!
//! Approximates the RGB colour of a black body at a given temperature and
//! derives red/blue gains relative to green. The curve crosses 255/255/255
//! at 6600 K.

use inspectkit_core::{CameraSettings, HardwareError, WhiteBalanceGains};
use inspectkit_hardware::Camera;

fn clamp_channel(value: f64) -> f64 {
    value.clamp(0.0, 255.0)
}

/// RGB components (0..=255) of a black body at `kelvin`
pub fn color_temperature_to_rgb(kelvin: f64) -> [f64; 3] {
    let t = kelvin / 100.0;

    let red = if t <= 66.0 {
        255.0
    } else {
        clamp_channel(329.698727446 * (t - 60.0).powf(-0.1332047592))
    };

    let green = if t <= 66.0 {
        clamp_channel(99.4708025861 * t.ln() - 161.1195681661)
    } else {
        clamp_channel(288.1221695283 * (t - 60.0).powf(-0.0755148492))
    };

    let blue = if t >= 66.0 {
        255.0
    } else if t <= 19.0 {
        0.0
    } else {
        clamp_channel(138.5177312231 * (t - 10.0).ln() - 305.0447927307)
    };

    [red, green, blue]
}

/// Red and blue gains relative to green for a colour temperature
pub fn white_balance_gains(kelvin: f64) -> WhiteBalanceGains {
    let [red, green, blue] = color_temperature_to_rgb(kelvin);
    let green = if green == 0.0 { 1.0 } else { green };
    WhiteBalanceGains {
        red: red / green,
        blue: blue / green,
    }
}

/// Derive white balance from `settings` and hand everything to the camera
pub fn apply_camera_settings(
    camera: &dyn Camera,
    settings: &CameraSettings,
) -> Result<WhiteBalanceGains, HardwareError> {
    let gains = white_balance_gains(settings.color_temperature_k as f64);
    tracing::info!(
        "Camera settings: exposure={}us gain={} contrast={} {}K (wb r={:.3} b={:.3})",
        settings.exposure_us,
        settings.gain,
        settings.contrast,
        settings.color_temperature_k,
        gains.red,
        gains.blue
    );
    camera.apply_settings(settings, gains)?;
    Ok(gains)
}
