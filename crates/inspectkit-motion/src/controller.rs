//! Kinematic motion controller
//!
//! Every move records the new logical position in [`ModuleState`] *before*
//! issuing the pulses that realize it. The stop signal is checked before
//! each step; when it is set the remaining steps are dropped, `homed` is
//! cleared and the module resets to idle. The logical position then leads
//! the carriage until the next homing cycle.

use inspectkit_core::units::{checked_mm_to_steps, steps_to_mm, MAX_POSITION_STEPS};
use inspectkit_core::{
    AppEvent, Axis, HardwareError, MachineEvent, ModuleState, MotionError, MotorId, Outcome,
    PartialPosition, Position,
};
use inspectkit_hardware::MotorDriver;
use inspectkit_settings::MachineSettings;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::kinematics::{motor_move, MotorMove};

/// Drives the carriage and owns the logical position bookkeeping
pub struct MotionController {
    state: Arc<ModuleState>,
    motors: Arc<dyn MotorDriver>,
    machine: MachineSettings,
}

impl MotionController {
    /// Create a controller over shared state and a motor driver
    pub fn new(
        state: Arc<ModuleState>,
        motors: Arc<dyn MotorDriver>,
        machine: MachineSettings,
    ) -> Self {
        Self {
            state,
            motors,
            machine,
        }
    }

    /// Shared instrument state
    pub fn state(&self) -> &Arc<ModuleState> {
        &self.state
    }

    /// Machine settings in effect
    pub fn machine(&self) -> &MachineSettings {
        &self.machine
    }

    /// Carriage travel per step along `axis`
    pub fn step_distance_mm(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X | Axis::Y => self.machine.xy_step_distance_mm,
            Axis::Z => self.machine.z_step_distance_mm,
        }
    }

    /// Move X by `delta_steps`
    pub fn move_x(&self, delta_steps: i64) -> Result<Outcome, MotionError> {
        self.move_axis(Axis::X, delta_steps)
    }

    /// Move Y by `delta_steps`
    pub fn move_y(&self, delta_steps: i64) -> Result<Outcome, MotionError> {
        self.move_axis(Axis::Y, delta_steps)
    }

    /// Move Z by `delta_steps`
    pub fn move_z(&self, delta_steps: i64) -> Result<Outcome, MotionError> {
        self.move_axis(Axis::Z, delta_steps)
    }

    /// Move one axis by `delta_steps`
    pub fn move_axis(&self, axis: Axis, delta_steps: i64) -> Result<Outcome, MotionError> {
        if delta_steps == 0 {
            return Ok(Outcome::Completed(()));
        }
        if !self.state.motors_enabled() {
            return Err(MotionError::MotorsDisabled);
        }
        let current = self.state.position().get(axis);
        let reachable = current
            .checked_add(delta_steps)
            .is_some_and(|target| target.unsigned_abs() <= MAX_POSITION_STEPS as u64);
        if !reachable {
            return Err(MotionError::OutOfRange {
                axis: axis.to_string(),
                target: format!("{} + {} steps", current, delta_steps),
            });
        }

        self.state.offset_position(axis, delta_steps);
        let mv = motor_move(self.machine.corexy, axis, delta_steps);
        tracing::trace!("move {} by {} steps: {:?}", axis, delta_steps, mv);

        let outcome = self.drive(mv)?;
        if outcome.is_completed() {
            self.state
                .events()
                .publish(AppEvent::Machine(MachineEvent::PositionChanged {
                    position: self.position_mm(),
                }))
                .ok();
        }
        Ok(outcome)
    }

    /// Move to an absolute position in mm; omitted axes stay where they are
    ///
    /// Axes are moved one after another in X, Y, Z order.
    pub fn go_to(&self, target: PartialPosition) -> Result<Outcome, MotionError> {
        for axis in Axis::ALL {
            let Some(mm) = target.get(axis) else {
                continue;
            };
            let goal = checked_mm_to_steps(mm, self.step_distance_mm(axis)).ok_or_else(|| {
                MotionError::OutOfRange {
                    axis: axis.to_string(),
                    target: format!("{} mm", mm),
                }
            })?;
            let delta = goal.saturating_sub(self.state.position().get(axis));
            if delta != 0 && self.move_axis(axis, delta)?.is_stopped() {
                return Ok(Outcome::Stopped);
            }
        }
        Ok(Outcome::Completed(()))
    }

    /// Logical position of one axis in mm
    pub fn current_position_mm(&self, axis: Axis) -> f64 {
        steps_to_mm(self.state.position().get(axis), self.step_distance_mm(axis))
    }

    /// Logical position of all axes in mm
    pub fn position_mm(&self) -> Position {
        Position::new(
            self.current_position_mm(Axis::X),
            self.current_position_mm(Axis::Y),
            self.current_position_mm(Axis::Z),
        )
    }

    /// Energize or release the motors
    ///
    /// Releasing clears `homed` and the motors-enabled flag before the
    /// driver is touched, so the state is correct even if the driver fails.
    pub fn enable_motors(&self, enabled: bool) -> Result<(), MotionError> {
        if enabled {
            self.motors.set_enabled(true)?;
            self.state.set_motors_enabled(true);
        } else {
            self.state.set_motors_enabled(false);
            self.motors.set_enabled(false)?;
        }
        Ok(())
    }

    /// Set the direction lines for travel along `axis`
    ///
    /// Used by homing, which steps until a switch triggers instead of
    /// moving a known distance.
    pub(crate) fn prepare_jog(&self, axis: Axis, forward: bool) -> Result<(), HardwareError> {
        let unit = if forward { 1 } else { -1 };
        self.set_directions(motor_move(self.machine.corexy, axis, unit))
    }

    /// Issue one step along `axis` with the directions set by [`Self::prepare_jog`]
    pub(crate) fn jog_step(&self, axis: Axis) -> Result<(), HardwareError> {
        match axis {
            Axis::X | Axis::Y => self.pulse_pair(),
            Axis::Z => self.pulse_z(),
        }
    }

    /// Handle an observed stop request: drop `homed` and reset to idle
    pub fn abort_on_stop<T>(&self) -> Outcome<T> {
        tracing::info!("Motion interrupted by stop request");
        self.state.set_homed(false);
        self.state.signal_reset_to_idle();
        Outcome::Stopped
    }

    fn drive(&self, mv: MotorMove) -> Result<Outcome, MotionError> {
        self.set_directions(mv)?;
        let pair = matches!(mv, MotorMove::Pair { .. });
        for _ in 0..mv.steps() {
            if self.state.stop_requested() {
                return Ok(self.abort_on_stop());
            }
            if pair {
                self.pulse_pair()?;
            } else {
                self.pulse_z()?;
            }
        }
        Ok(Outcome::Completed(()))
    }

    fn set_directions(&self, mv: MotorMove) -> Result<(), HardwareError> {
        match mv {
            MotorMove::Pair { a, b } => {
                self.motors.set_direction(MotorId::A, a >= 0)?;
                self.motors.set_direction(MotorId::B, b >= 0)
            }
            MotorMove::Z(z) => self.motors.set_direction(MotorId::Z, z >= 0),
        }
    }

    fn pulse_pair(&self) -> Result<(), HardwareError> {
        self.motors.set_step(MotorId::A, true)?;
        self.motors.set_step(MotorId::B, true)?;
        pause(self.machine.pulse_width());
        self.motors.set_step(MotorId::A, false)?;
        self.motors.set_step(MotorId::B, false)?;
        pause(self.machine.step_interval());
        Ok(())
    }

    fn pulse_z(&self) -> Result<(), HardwareError> {
        self.motors
            .pulse_step(MotorId::Z, self.machine.pulse_width())?;
        pause(self.machine.step_interval());
        Ok(())
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}

impl std::fmt::Debug for MotionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionController")
            .field("position", &self.state.position())
            .field("corexy", &self.machine.corexy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inspectkit_core::{EventBus, ModuleStatus, StepPosition};
    use inspectkit_hardware::{SimStage, SimStageConfig};
    use inspectkit_settings::Config;

    fn setup() -> (SimStage, MotionController) {
        let stage = SimStage::new(SimStageConfig {
            start: StepPosition::new(0, 0, 0),
            ..Default::default()
        });
        let state = Arc::new(ModuleState::new(Arc::new(EventBus::new())));
        let motion = MotionController::new(
            state,
            Arc::new(stage.motors()),
            Config::instant().machine,
        );
        motion.enable_motors(true).unwrap();
        (stage, motion)
    }

    #[test]
    fn test_move_requires_enabled_motors() {
        let (_stage, motion) = setup();
        motion.enable_motors(false).unwrap();
        assert!(matches!(motion.move_x(5), Err(MotionError::MotorsDisabled)));
        assert_eq!(motion.state().position(), StepPosition::default());
    }

    #[test]
    fn test_zero_delta_is_a_no_op() {
        let (stage, motion) = setup();
        motion.enable_motors(false).unwrap();
        assert!(motion.move_y(0).unwrap().is_completed());
        assert_eq!(stage.step_edges(MotorId::A), 0);
    }

    #[test]
    fn test_moves_track_logical_and_physical_position() {
        let (stage, motion) = setup();
        assert!(motion.move_x(40).unwrap().is_completed());
        assert!(motion.move_y(-16).unwrap().is_completed());
        assert!(motion.move_z(8).unwrap().is_completed());

        assert_eq!(motion.state().position(), StepPosition::new(40, -16, 8));
        assert_eq!(stage.carriage(), StepPosition::new(40, -16, 8));
        assert_eq!(stage.step_edges(MotorId::A), stage.step_edges(MotorId::B));
    }

    #[test]
    fn test_go_to_converts_mm_and_keeps_omitted_axes() {
        let (stage, motion) = setup();
        motion.go_to(PartialPosition::xyz(1.0, 0.5, 0.1)).unwrap();
        assert_eq!(stage.carriage(), StepPosition::new(80, 40, 40));

        motion.go_to(PartialPosition::z_only(0.0)).unwrap();
        assert_eq!(stage.carriage(), StepPosition::new(80, 40, 0));
        assert!((motion.current_position_mm(Axis::X) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unreachable_targets_are_rejected() {
        let (stage, motion) = setup();
        let x_only = |x: f64| PartialPosition {
            x: Some(x),
            ..Default::default()
        };
        motion.go_to(x_only(1.0)).unwrap();

        for mm in [-1e30, f64::NAN, f64::INFINITY] {
            let err = motion.go_to(x_only(mm)).unwrap_err();
            assert!(matches!(err, MotionError::OutOfRange { .. }), "{mm}");
        }
        assert!(matches!(
            motion.move_y(i64::MIN),
            Err(MotionError::OutOfRange { .. })
        ));
        assert_eq!(motion.state().position(), StepPosition::new(80, 0, 0));
        assert_eq!(stage.carriage(), StepPosition::new(80, 0, 0));
    }

    #[test]
    fn test_stop_leaves_logical_position_ahead() {
        let (stage, motion) = setup();
        let state = motion.state().clone();
        state.set_homed(true);
        state.set_status(ModuleStatus::Moving);

        let hook_state = state.clone();
        let steps = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let counter = steps.clone();
        stage.set_step_hook(Box::new(move |motor| {
            if motor == MotorId::B
                && counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1 == 10
            {
                hook_state.request_stop();
            }
        }));

        let outcome = motion.move_x(100).unwrap();
        assert!(outcome.is_stopped());
        assert_eq!(state.position().x, 100);
        assert_eq!(stage.carriage().x, 10);
        assert!(!state.is_homed());
        assert_eq!(state.status(), ModuleStatus::Idle);
    }
}
