//! Sampling orchestrator
//!
//! Both routines share a prologue: the loaded sample must have a bounding
//! box, the machine is homed if it is not (or a stop is pending), the
//! carriage moves to the stage centre, autofocus runs with its defaults and
//! the focused frame must score at least the detection threshold. A blank
//! or clean sample scores low too and is reported as undetected.
//!
//! Each point is then visited in order: stop check, move, settle, capture,
//! persist. A failed capture or write is logged and the point skipped; the
//! run carries on. Image counters are zeroed on every exit path. A pass
//! that also parks the carriage at X/Y zero without interruption bumps the
//! sample layer; it does not re-home.

use chrono::Utc;
use inspectkit_core::{
    AppEvent, BoundingBox, CameraSettings, Error, ImageMetadata, ModuleState, Outcome,
    PartialPosition, Result, Sample, SamplingError, SamplingEvent, ThreadSafe,
};
use inspectkit_focus::FocusEngine;
use inspectkit_hardware::Camera;
use inspectkit_motion::{HomingSequence, MotionController};
use inspectkit_settings::Config;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::storage::CaptureStore;

/// Alarm raised when no bounding box is available
pub const NO_BOUNDING_BOX: &str = "No Bounding Box Set";

/// Alarm raised when the focused frame scores below the detection threshold
pub const SAMPLE_NOT_DETECTED: &str = "Sample not detected or not in focus";

/// One persisted capture
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Path of the written image
    pub path: PathBuf,
    /// Metadata recorded for the capture
    pub metadata: ImageMetadata,
}

/// Result of a sampling or scanning run
#[derive(Debug, Clone, Default)]
pub struct SamplingReport {
    /// Images captured, in visiting order
    pub images: Vec<CapturedImage>,
    /// Whether the run was cut short by the stop signal
    pub stopped: bool,
}

impl SamplingReport {
    fn stopped(images: Vec<CapturedImage>) -> Self {
        Self {
            images,
            stopped: true,
        }
    }
}

/// Grid coordinates along one axis: `floor(min)` up to `floor(max + step)`, exclusive
///
/// With whole-millimetre bounds the last coordinate lands on or past `max`.
/// A fractional `max` is floored with the extra step, so the last column
/// may stop short of the edge by less than a millimetre.
pub fn scan_axis_positions(min: f64, max: f64, step: u32) -> Vec<f64> {
    if step == 0 {
        return Vec::new();
    }
    let start = min.floor() as i64;
    let end = (max + step as f64).floor() as i64;
    (start..end)
        .step_by(step as usize)
        .map(|v| v as f64)
        .collect()
}

/// Random sampling and grid scanning over the loaded sample
pub struct SamplingOrchestrator {
    homing: Arc<HomingSequence>,
    focus: Arc<FocusEngine>,
    camera: Arc<dyn Camera>,
    store: CaptureStore,
    camera_settings: ThreadSafe<CameraSettings>,
    settle_delay: Duration,
    detection_threshold: f64,
    stage_center: (f64, f64),
}

impl SamplingOrchestrator {
    /// Create an orchestrator from its collaborators and the instrument configuration
    pub fn new(
        homing: Arc<HomingSequence>,
        focus: Arc<FocusEngine>,
        camera: Arc<dyn Camera>,
        config: &Config,
    ) -> Self {
        Self {
            homing,
            focus,
            camera,
            store: CaptureStore::new(config.storage.buffer_dir.clone()),
            camera_settings: inspectkit_core::thread_safe(config.camera),
            settle_delay: config.sampling.settle_delay(),
            detection_threshold: config.focus.detection_threshold,
            stage_center: (
                config.machine.stage_center_x_mm,
                config.machine.stage_center_y_mm,
            ),
        }
    }

    fn motion(&self) -> &Arc<MotionController> {
        self.homing.motion()
    }

    fn state(&self) -> &Arc<ModuleState> {
        self.motion().state()
    }

    /// Persistence target
    pub fn store(&self) -> &CaptureStore {
        &self.store
    }

    /// Camera settings recorded in capture metadata
    pub fn camera_settings(&self) -> CameraSettings {
        *self.camera_settings.lock()
    }

    /// Replace the camera settings recorded in capture metadata
    pub fn set_camera_settings(&self, settings: CameraSettings) {
        *self.camera_settings.lock() = settings;
    }

    /// Capture `n` images at uniformly random points of the bounding box
    ///
    /// `save_images` set means *no* metadata record is written.
    pub fn random_sampling(&self, n: usize, save_images: bool) -> Result<SamplingReport> {
        self.random_sampling_with(n, save_images, &mut rand::thread_rng())
    }

    /// [`Self::random_sampling`] with a caller-supplied random source
    pub fn random_sampling_with<R: Rng>(
        &self,
        n: usize,
        save_images: bool,
        rng: &mut R,
    ) -> Result<SamplingReport> {
        tracing::info!("Random sampling: {} images", n);
        self.state().reset_counters();
        let (sample, bbox) = match self.prologue()? {
            Some(prepared) => prepared,
            None => return Ok(SamplingReport::stopped(Vec::new())),
        };

        let (min_x, max_x) = (bbox.min_x(), bbox.max_x());
        let (min_y, max_y) = (bbox.min_y(), bbox.max_y());
        let points: Vec<(f64, f64)> = (0..n)
            .map(|_| (rng.gen_range(min_x..=max_x), rng.gen_range(min_y..=max_y)))
            .collect();

        self.run_points(&sample, points, save_images)
    }

    /// Capture a regular grid over the bounding box, X outer and Y inner
    ///
    /// Steps are whole millimetres. `save_images` has the same inverted
    /// meaning as in [`Self::random_sampling`].
    pub fn scanning_images(
        &self,
        step_x: u32,
        step_y: u32,
        save_images: bool,
    ) -> Result<SamplingReport> {
        tracing::info!("Grid scan: step {}x{} mm", step_x, step_y);
        if step_x == 0 || step_y == 0 {
            let err = SamplingError::InvalidStep { step_x, step_y };
            self.state().raise_alarm(err.to_string());
            return Err(err.into());
        }

        self.state().reset_counters();
        let (sample, bbox) = match self.prologue()? {
            Some(prepared) => prepared,
            None => return Ok(SamplingReport::stopped(Vec::new())),
        };

        let xs = scan_axis_positions(bbox.min_x(), bbox.max_x(), step_x);
        let ys = scan_axis_positions(bbox.min_y(), bbox.max_y(), step_y);
        let points: Vec<(f64, f64)> = xs
            .iter()
            .flat_map(|&x| ys.iter().map(move |&y| (x, y)))
            .collect();

        self.run_points(&sample, points, save_images)
    }

    /// Validate the sample, home if needed, centre, focus and check detection
    ///
    /// Returns `None` when the stop signal interrupted the prologue.
    fn prologue(&self) -> Result<Option<(Sample, BoundingBox)>> {
        let state = self.state();
        let Some((sample, bbox)) = state
            .sample()
            .and_then(|s| s.bounding_box().copied().map(|b| (s, b)))
        else {
            state.raise_alarm(NO_BOUNDING_BOX);
            return Err(SamplingError::NoBoundingBox.into());
        };

        if (!state.is_homed() || state.stop_requested()) && self.homing.home_all()?.is_stopped() {
            return Ok(None);
        }

        let (cx, cy) = self.stage_center;
        if self.motion().go_to(PartialPosition::xy(cx, cy))?.is_stopped() {
            return Ok(None);
        }
        if self.focus.auto_focus(None, None, None)?.is_stopped() {
            return Ok(None);
        }

        let score = self.focus.score_current()?;
        if score < self.detection_threshold {
            tracing::warn!(
                "Focused frame scored {:.3}, below threshold {:.3}",
                score,
                self.detection_threshold
            );
            state.raise_alarm(SAMPLE_NOT_DETECTED);
            return Err(SamplingError::SampleNotDetected { score }.into());
        }

        Ok(Some((sample, bbox)))
    }

    fn run_points(
        &self,
        sample: &Sample,
        points: Vec<(f64, f64)>,
        save_images: bool,
    ) -> Result<SamplingReport> {
        let result = self.visit_points(sample, points, save_images);
        self.state().reset_counters();

        let report = result?;
        self.state()
            .events()
            .publish(AppEvent::Sampling(SamplingEvent::Finished {
                captured: report.images.len(),
                stopped: report.stopped,
            }))
            .ok();
        tracing::info!(
            "Run {} with {} images",
            if report.stopped { "stopped" } else { "finished" },
            report.images.len()
        );
        Ok(report)
    }

    fn visit_points(
        &self,
        sample: &Sample,
        points: Vec<(f64, f64)>,
        save_images: bool,
    ) -> Result<SamplingReport> {
        let state = self.state();
        state.begin_run(points.len());
        state
            .events()
            .publish(AppEvent::Sampling(SamplingEvent::Started {
                total_images: points.len(),
            }))
            .ok();

        let mut images = Vec::with_capacity(points.len());
        for (index, (x, y)) in points.into_iter().enumerate() {
            let outcome: Outcome = if state.stop_requested() {
                self.motion().abort_on_stop()
            } else {
                self.motion().go_to(PartialPosition::xy(x, y))?
            };
            if outcome.is_stopped() {
                return Ok(SamplingReport::stopped(images));
            }

            if !self.settle_delay.is_zero() {
                std::thread::sleep(self.settle_delay);
            }

            match self.capture(sample, index, save_images) {
                Ok(captured) => {
                    let count = state.increment_image_count();
                    tracing::debug!("Captured {} ({})", captured.path.display(), count);
                    state
                        .events()
                        .publish(AppEvent::Sampling(SamplingEvent::ImageCaptured {
                            index,
                            path: captured.path.clone(),
                        }))
                        .ok();
                    images.push(captured);
                }
                Err(e) => {
                    tracing::warn!("Skipping point {} at ({:.3}, {:.3}): {}", index, x, y, e);
                    state
                        .events()
                        .publish(AppEvent::Sampling(SamplingEvent::CaptureSkipped {
                            index,
                            reason: e.to_string(),
                        }))
                        .ok();
                }
            }
        }

        if self
            .motion()
            .go_to(PartialPosition::xy(0.0, 0.0))?
            .is_stopped()
        {
            return Ok(SamplingReport::stopped(images));
        }
        state.with_sample(|s| s.complete_layer());
        Ok(SamplingReport {
            images,
            stopped: false,
        })
    }

    fn capture(&self, sample: &Sample, index: usize, save_images: bool) -> Result<CapturedImage> {
        let frame = self.camera.capture_frame()?;
        let position = self.motion().position_mm();
        let settings = self.camera_settings();

        let base = ImageMetadata::image_name_for(&sample.sample_id, sample.current_layer, index);
        let metadata = ImageMetadata {
            image_name: self.store.available_name(&base),
            sample_id: sample.sample_id.clone(),
            timestamp: Utc::now(),
            layer: sample.current_layer,
            image_index: index,
            x_mm: position.x,
            y_mm: position.y,
            z_mm: position.z,
            exposure_us: settings.exposure_us,
            gain: settings.gain,
            contrast: settings.contrast,
            color_temperature_k: settings.color_temperature_k,
        };

        let path = self
            .store
            .persist(&frame, &metadata, !save_images)
            .map_err(Error::from)?;
        Ok(CapturedImage { path, metadata })
    }
}

impl std::fmt::Debug for SamplingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingOrchestrator")
            .field("buffer_dir", &self.store.buffer_dir())
            .field("settle_delay", &self.settle_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_positions_cover_far_edge() {
        assert_eq!(
            scan_axis_positions(95.0, 105.0, 2),
            vec![95.0, 97.0, 99.0, 101.0, 103.0, 105.0]
        );
        assert_eq!(scan_axis_positions(96.0, 104.0, 5), vec![96.0, 101.0, 106.0]);
    }

    #[test]
    fn test_scan_positions_floor_fractional_bounds() {
        assert_eq!(scan_axis_positions(0.6, 2.2, 1), vec![0.0, 1.0, 2.0]);
        assert_eq!(scan_axis_positions(0.6, 2.9, 2), vec![0.0, 2.0, 4.0]);
        assert!(scan_axis_positions(1.0, 2.0, 0).is_empty());
    }
}
