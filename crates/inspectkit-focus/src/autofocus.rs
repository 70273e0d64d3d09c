//! Autofocus search
//!
//! A linear sweep over Z: at every point the carriage moves, a frame is
//! captured and scored, and the best point wins with strict greater-than,
//! so on ties the lowest Z is kept. The sweep walks in whole microns so the
//! inclusive upper bound is hit exactly regardless of the step size.

use inspectkit_core::units::{microns_to_mm, mm_to_microns};
use inspectkit_core::{
    AppEvent, FocusError, FocusEvent, ModuleState, Outcome, PartialPosition, Result,
};
use inspectkit_hardware::Camera;
use inspectkit_motion::MotionController;
use inspectkit_settings::FocusSettings;
use std::sync::Arc;

use crate::sharpness::sharpness_score;

/// One scored point of a focus sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusSample {
    /// Z position in mm
    pub z_mm: f64,
    /// Sharpness score at that position
    pub score: f64,
}

/// Sharpness-driven focus search over the Z axis
pub struct FocusEngine {
    motion: Arc<MotionController>,
    camera: Arc<dyn Camera>,
    settings: FocusSettings,
}

impl FocusEngine {
    /// Create a focus engine
    pub fn new(
        motion: Arc<MotionController>,
        camera: Arc<dyn Camera>,
        settings: FocusSettings,
    ) -> Self {
        Self {
            motion,
            camera,
            settings,
        }
    }

    /// Focus settings in effect
    pub fn settings(&self) -> &FocusSettings {
        &self.settings
    }

    fn state(&self) -> &Arc<ModuleState> {
        self.motion.state()
    }

    /// Capture a frame at the current position and score it
    pub fn score_current(&self) -> Result<f64> {
        let frame = self.camera.capture_frame()?;
        Ok(sharpness_score(&frame, self.settings.blur_radius))
    }

    /// Expected Z of the sample surface
    ///
    /// The stage focus height minus the sample's current height; the bare
    /// stage height when no sample is loaded.
    pub fn expected_focus_mm(&self) -> f64 {
        let stage = self.motion.machine().stage_focus_height_mm;
        match self.state().sample() {
            Some(sample) => stage - sample.current_height_mm(),
            None => stage,
        }
    }

    /// Sweep `z_min..=z_max` and park the carriage at the sharpest point
    ///
    /// Omitted arguments default to `half_range_mm` either side of
    /// [`Self::expected_focus_mm`] and the configured step.
    pub fn auto_focus(
        &self,
        z_min: Option<f64>,
        z_max: Option<f64>,
        step: Option<f64>,
    ) -> Result<Outcome<FocusSample>> {
        let center = self.expected_focus_mm();
        let z_min = z_min.unwrap_or(center - self.settings.half_range_mm);
        let z_max = z_max.unwrap_or(center + self.settings.half_range_mm);
        let step = step.unwrap_or(self.settings.step_mm);

        let min_um = mm_to_microns(z_min);
        let max_um = mm_to_microns(z_max);
        let step_um = mm_to_microns(step);
        if step_um <= 0 || min_um > max_um {
            return Err(FocusError::InvalidRange {
                z_min_mm: z_min,
                z_max_mm: z_max,
                step_mm: step,
            }
            .into());
        }

        tracing::info!(
            "Autofocus sweep {:.3}..={:.3} mm, step {:.3} mm",
            z_min,
            z_max,
            step
        );

        let mut best: Option<FocusSample> = None;
        let mut z_um = min_um;
        while z_um <= max_um {
            if self.state().stop_requested() {
                return Ok(self.motion.abort_on_stop());
            }

            let z_mm = microns_to_mm(z_um);
            if self.motion.go_to(PartialPosition::z_only(z_mm))?.is_stopped() {
                return Ok(Outcome::Stopped);
            }

            let score = self.score_current()?;
            tracing::debug!("focus z={:.3} score={:.3}", z_mm, score);
            self.state()
                .events()
                .publish(AppEvent::Focus(FocusEvent::PointScored { z_mm, score }))
                .ok();

            if best.is_none_or(|b| score > b.score) {
                best = Some(FocusSample { z_mm, score });
            }
            z_um += step_um;
        }

        let best = best.ok_or(FocusError::NoSamples)?;
        if self
            .motion
            .go_to(PartialPosition::z_only(best.z_mm))?
            .is_stopped()
        {
            return Ok(Outcome::Stopped);
        }

        tracing::info!("Focused at z={:.3} mm (score {:.3})", best.z_mm, best.score);
        self.state()
            .events()
            .publish(AppEvent::Focus(FocusEvent::Focused {
                z_mm: best.z_mm,
                score: best.score,
            }))
            .ok();
        Ok(Outcome::Completed(best))
    }
}

impl std::fmt::Debug for FocusEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusEngine")
            .field("settings", &self.settings)
            .finish()
    }
}
