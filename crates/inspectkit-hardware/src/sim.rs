//! Simulated stage
//!
//! One [`SimStage`] models the whole instrument in memory: three step
//! counters behind a CoreXY belt, latched limit switches at configurable
//! coordinates, and a camera that renders a checkerboard which blurs as the
//! carriage leaves the focal plane. The handles returned by
//! [`SimStage::motors`], [`SimStage::switches`] and [`SimStage::camera`]
//! share the same state, so a motion written through the driver shows up in
//! the switch readings and in the rendered frames.

use image::{DynamicImage, GrayImage, Luma};
use inspectkit_core::{
    Axis, CameraSettings, CoreXyConvention, HardwareError, MotorId, StepPosition,
    WhiteBalanceGains,
};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::{Camera, LimitSwitches, MotorDriver};

/// Callback invoked after every step the simulated driver takes
pub type StepHook = Box<dyn Fn(MotorId) + Send + Sync>;

/// Simulated stage parameters
#[derive(Debug, Clone)]
pub struct SimStageConfig {
    /// Belt arrangement used to map motor counts to carriage coordinates
    pub convention: CoreXyConvention,
    /// Carriage position at power-up, in steps from the switch origin
    pub start: StepPosition,
    /// Switches read triggered at or below these coordinates
    pub switch_positions: StepPosition,
    /// Z coordinate (steps) at which frames are perfectly sharp
    pub focus_z_steps: i64,
    /// Gaussian sigma added per step of defocus
    pub blur_per_step: f32,
    /// Edge length of rendered frames in pixels
    pub frame_size: u32,
}

impl Default for SimStageConfig {
    fn default() -> Self {
        Self {
            convention: CoreXyConvention::Standard,
            start: StepPosition::new(400, 300, 200),
            switch_positions: StepPosition::default(),
            focus_z_steps: 160,
            blur_per_step: 0.05,
            frame_size: 64,
        }
    }
}

#[derive(Debug)]
struct Inner {
    config: SimStageConfig,
    counters: [i64; 3],
    directions: [bool; 3],
    step_lines: [bool; 3],
    step_edges: [u64; 3],
    enabled: bool,
    released_at: [Option<i64>; 3],
    stuck: [bool; 3],
    dead: [bool; 3],
    sample_present: bool,
    pending_capture_failures: u32,
    captures: u64,
    applied: Option<(CameraSettings, WhiteBalanceGains)>,
}

fn motor_index(motor: MotorId) -> usize {
    match motor {
        MotorId::A => 0,
        MotorId::B => 1,
        MotorId::Z => 2,
    }
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

impl Inner {
    fn carriage(&self) -> StepPosition {
        let (x, y) = self
            .config
            .convention
            .cartesian(self.counters[0], self.counters[1]);
        StepPosition::new(x, y, self.counters[2])
    }
}

/// In-memory instrument shared by the simulated driver, switches and camera
#[derive(Clone)]
pub struct SimStage {
    inner: Arc<Mutex<Inner>>,
    hook: Arc<RwLock<Option<StepHook>>>,
}

impl SimStage {
    /// Create a stage with the carriage at `config.start`
    pub fn new(config: SimStageConfig) -> Self {
        let (a, b) = config
            .convention
            .motor_deltas(config.start.x, config.start.y);
        let z = config.start.z;
        Self {
            inner: Arc::new(Mutex::new(Inner {
                config,
                counters: [a, b, z],
                directions: [true; 3],
                step_lines: [false; 3],
                step_edges: [0; 3],
                enabled: false,
                released_at: [None; 3],
                stuck: [false; 3],
                dead: [false; 3],
                sample_present: true,
                pending_capture_failures: 0,
                captures: 0,
                applied: None,
            })),
            hook: Arc::new(RwLock::new(None)),
        }
    }

    /// Motor driver handle
    pub fn motors(&self) -> SimMotors {
        SimMotors {
            stage: self.clone(),
        }
    }

    /// Limit switch handle
    pub fn switches(&self) -> SimSwitches {
        SimSwitches {
            stage: self.clone(),
        }
    }

    /// Camera handle
    pub fn camera(&self) -> SimCamera {
        SimCamera {
            stage: self.clone(),
        }
    }

    /// Physical carriage position in steps
    pub fn carriage(&self) -> StepPosition {
        self.inner.lock().carriage()
    }

    /// Signed step count of one motor
    pub fn motor_steps(&self, motor: MotorId) -> i64 {
        self.inner.lock().counters[motor_index(motor)]
    }

    /// Number of rising step edges seen by one motor
    pub fn step_edges(&self, motor: MotorId) -> u64 {
        self.inner.lock().step_edges[motor_index(motor)]
    }

    /// Whether the enable line is asserted
    pub fn enabled(&self) -> bool {
        self.inner.lock().enabled
    }

    /// Place or remove the specimen under the camera
    pub fn set_sample_present(&self, present: bool) {
        self.inner.lock().sample_present = present;
    }

    /// Make a switch read triggered no matter where the carriage is
    pub fn set_switch_stuck(&self, axis: Axis, stuck: bool) {
        self.inner.lock().stuck[axis_index(axis)] = stuck;
    }

    /// Make a switch never trigger
    pub fn set_switch_dead(&self, axis: Axis, dead: bool) {
        self.inner.lock().dead[axis_index(axis)] = dead;
    }

    /// Fail the next `count` frame captures
    pub fn fail_next_captures(&self, count: u32) {
        self.inner.lock().pending_capture_failures = count;
    }

    /// Number of successfully delivered frames
    pub fn capture_count(&self) -> u64 {
        self.inner.lock().captures
    }

    /// Settings most recently applied through the camera handle
    pub fn applied_settings(&self) -> Option<(CameraSettings, WhiteBalanceGains)> {
        self.inner.lock().applied
    }

    /// Install a callback run after every step
    pub fn set_step_hook(&self, hook: StepHook) {
        *self.hook.write() = Some(hook);
    }

    /// Remove the step callback
    pub fn clear_step_hook(&self) {
        *self.hook.write() = None;
    }

    fn run_hook(&self, motor: MotorId) {
        if let Some(hook) = self.hook.read().as_ref() {
            hook(motor);
        }
    }
}

impl std::fmt::Debug for SimStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimStage")
            .field("carriage", &self.carriage())
            .field("enabled", &self.enabled())
            .finish()
    }
}

/// Simulated motor driver
#[derive(Debug, Clone)]
pub struct SimMotors {
    stage: SimStage,
}

impl MotorDriver for SimMotors {
    fn set_direction(&self, motor: MotorId, forward: bool) -> Result<(), HardwareError> {
        self.stage.inner.lock().directions[motor_index(motor)] = forward;
        Ok(())
    }

    fn set_step(&self, motor: MotorId, high: bool) -> Result<(), HardwareError> {
        let stepped = {
            let mut inner = self.stage.inner.lock();
            let idx = motor_index(motor);
            let rising = high && !inner.step_lines[idx];
            inner.step_lines[idx] = high;
            if rising && inner.enabled {
                inner.counters[idx] += if inner.directions[idx] { 1 } else { -1 };
                inner.step_edges[idx] += 1;
                true
            } else {
                false
            }
        };
        if stepped {
            self.stage.run_hook(motor);
        }
        Ok(())
    }

    fn set_enabled(&self, enabled: bool) -> Result<(), HardwareError> {
        tracing::debug!("sim: motors {}", if enabled { "enabled" } else { "released" });
        self.stage.inner.lock().enabled = enabled;
        Ok(())
    }
}

/// Simulated limit switches
#[derive(Debug, Clone)]
pub struct SimSwitches {
    stage: SimStage,
}

impl LimitSwitches for SimSwitches {
    fn is_triggered(&self, axis: Axis) -> Result<bool, HardwareError> {
        let mut inner = self.stage.inner.lock();
        let idx = axis_index(axis);
        if inner.dead[idx] {
            return Ok(false);
        }
        if inner.stuck[idx] {
            return Ok(true);
        }
        let coord = inner.carriage().get(axis);
        if inner.released_at[idx].is_some_and(|at| at != coord) {
            inner.released_at[idx] = None;
        }
        let in_zone = coord <= inner.config.switch_positions.get(axis);
        Ok(in_zone && inner.released_at[idx].is_none())
    }

    fn force_release(&self, axis: Axis) -> Result<(), HardwareError> {
        let mut inner = self.stage.inner.lock();
        let coord = inner.carriage().get(axis);
        inner.released_at[axis_index(axis)] = Some(coord);
        Ok(())
    }
}

/// Simulated camera
#[derive(Debug, Clone)]
pub struct SimCamera {
    stage: SimStage,
}

const CHECKER_CELL: u32 = 8;
const DARK: u8 = 40;
const LIGHT: u8 = 215;
const BLANK: u8 = 128;

impl Camera for SimCamera {
    fn capture_frame(&self) -> Result<DynamicImage, HardwareError> {
        let (size, present, sigma) = {
            let mut inner = self.stage.inner.lock();
            if inner.pending_capture_failures > 0 {
                inner.pending_capture_failures -= 1;
                return Err(HardwareError::CaptureFailed {
                    reason: "simulated sensor timeout".to_string(),
                });
            }
            inner.captures += 1;
            let defocus = (inner.counters[2] - inner.config.focus_z_steps).abs();
            (
                inner.config.frame_size,
                inner.sample_present,
                defocus as f32 * inner.config.blur_per_step,
            )
        };

        let frame = if present {
            let board = GrayImage::from_fn(size, size, |x, y| {
                if ((x / CHECKER_CELL) + (y / CHECKER_CELL)) % 2 == 0 {
                    Luma([DARK])
                } else {
                    Luma([LIGHT])
                }
            });
            if sigma > 0.0 {
                imageproc::filter::gaussian_blur_f32(&board, sigma)
            } else {
                board
            }
        } else {
            GrayImage::from_pixel(size, size, Luma([BLANK]))
        };

        Ok(DynamicImage::ImageRgb8(
            DynamicImage::ImageLuma8(frame).to_rgb8(),
        ))
    }

    fn apply_settings(
        &self,
        settings: &CameraSettings,
        gains: WhiteBalanceGains,
    ) -> Result<(), HardwareError> {
        tracing::debug!(
            "sim: camera settings exposure={}us gain={} wb=({:.3}, {:.3})",
            settings.exposure_us,
            settings.gain,
            gains.red,
            gains.blue
        );
        self.stage.inner.lock().applied = Some((*settings, gains));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_steps_ignored_while_disabled() {
        let stage = SimStage::new(SimStageConfig::default());
        let motors = stage.motors();
        motors.pulse_step(MotorId::Z, Duration::ZERO).unwrap();
        assert_eq!(stage.step_edges(MotorId::Z), 0);

        motors.set_enabled(true).unwrap();
        motors.set_direction(MotorId::Z, false).unwrap();
        motors.pulse_step(MotorId::Z, Duration::ZERO).unwrap();
        assert_eq!(stage.carriage().z, 199);
    }

    #[test]
    fn test_switch_latches_until_released() {
        let stage = SimStage::new(SimStageConfig {
            start: StepPosition::new(0, 0, 0),
            ..Default::default()
        });
        let switches = stage.switches();
        assert!(switches.is_triggered(Axis::X).unwrap());
        switches.force_release(Axis::X).unwrap();
        assert!(!switches.is_triggered(Axis::X).unwrap());

        let motors = stage.motors();
        motors.set_enabled(true).unwrap();
        motors.set_direction(MotorId::A, false).unwrap();
        motors.set_direction(MotorId::B, false).unwrap();
        motors.pulse_step(MotorId::A, Duration::ZERO).unwrap();
        motors.pulse_step(MotorId::B, Duration::ZERO).unwrap();
        assert_eq!(stage.carriage().x, -1);
        assert!(switches.is_triggered(Axis::X).unwrap());
    }

    #[test]
    fn test_stuck_and_dead_switches() {
        let stage = SimStage::new(SimStageConfig::default());
        let switches = stage.switches();
        stage.set_switch_stuck(Axis::Y, true);
        switches.force_release(Axis::Y).unwrap();
        assert!(switches.is_triggered(Axis::Y).unwrap());

        stage.set_switch_stuck(Axis::Y, false);
        stage.set_switch_dead(Axis::Y, true);
        assert!(!switches.is_triggered(Axis::Y).unwrap());
    }

    #[test]
    fn test_capture_failure_injection() {
        let stage = SimStage::new(SimStageConfig::default());
        let camera = stage.camera();
        stage.fail_next_captures(1);
        assert!(camera.capture_frame().is_err());
        let frame = camera.capture_frame().unwrap();
        assert_eq!(frame.width(), 64);
        assert_eq!(stage.capture_count(), 1);
    }

    #[test]
    fn test_step_hook_runs_per_step() {
        let stage = SimStage::new(SimStageConfig::default());
        let count = Arc::new(Mutex::new(0u32));
        let c = count.clone();
        stage.set_step_hook(Box::new(move |_| *c.lock() += 1));

        let motors = stage.motors();
        motors.set_enabled(true).unwrap();
        for _ in 0..3 {
            motors.pulse_step(MotorId::A, Duration::ZERO).unwrap();
        }
        assert_eq!(*count.lock(), 3);
    }
}
