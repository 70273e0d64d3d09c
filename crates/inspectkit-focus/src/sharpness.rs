//! Image sharpness metric
//!
//! The frame is converted to float luminance, smoothed with a Gaussian to
//! suppress sensor noise, filtered with the 3×3 Laplacian
//!
//! ```text
//!  0  1  0
//!  1 -4  1
//!  0  1  0
//! ```
//!
//! and the variance of the response is returned. Focused frames have strong
//! second derivatives at edges and therefore a high variance; defocus and
//! blank frames score near zero.

use image::DynamicImage;

const LAPLACIAN: [f32; 9] = [0.0, 1.0, 0.0, 1.0, -4.0, 1.0, 0.0, 1.0, 0.0];

// float luma is normalised to 0..=1; scores stay on the 8-bit scale
const INTENSITY_SCALE: f64 = 255.0;

/// Gaussian sigma for a smoothing kernel of size `2 * radius + 1`
///
/// Returns `None` for radius 0, which disables smoothing.
pub fn gaussian_sigma(blur_radius: u32) -> Option<f32> {
    if blur_radius == 0 {
        return None;
    }
    Some(0.3 * (blur_radius as f32 - 1.0) + 0.8)
}

/// Variance of the Laplacian of the smoothed luminance
///
/// Pure function of the pixel data. Returns 0 for images smaller than 3×3.
pub fn sharpness_score(image: &DynamicImage, blur_radius: u32) -> f64 {
    let luma = image.to_luma32f();
    let (width, height) = luma.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let smoothed = match gaussian_sigma(blur_radius) {
        Some(sigma) => imageproc::filter::gaussian_blur_f32(&luma, sigma),
        None => luma,
    };
    // out-of-frame neighbours repeat the nearest edge pixel
    let response = imageproc::filter::filter3x3::<_, f32, f32>(&smoothed, &LAPLACIAN);

    variance(response.as_raw()) * INTENSITY_SCALE * INTENSITY_SCALE
}

fn variance(values: &[f32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values
        .iter()
        .map(|&v| (v as f64 - mean) * (v as f64 - mean))
        .sum::<f64>()
        / n
}
