//! Homing state machine
//!
//! A full cycle walks `Enabling → HomingY → HomingX → HomingZ → Homed`.
//! Each axis is driven toward its negative limit switch one step at a time
//! until the switch triggers, then its logical position is zeroed. A stop
//! request moves the machine to `Stopped` from whichever axis is running.
//!
//! Before an axis is homed its switch is polled until it reads released.
//! Switches that never release raise the `Limit Switch Failed` alarm and
//! homing continues regardless.

use inspectkit_core::{
    AppEvent, Axis, HomingState, MachineEvent, ModuleState, MotionError, Outcome,
};
use inspectkit_hardware::LimitSwitches;
use std::sync::Arc;

use crate::controller::MotionController;

/// Alarm raised when a switch still reads triggered after debouncing
pub const LIMIT_SWITCH_FAILED: &str = "Limit Switch Failed";

/// Alarm raised when a switch is not reached within the homing step budget
pub const HOMING_FAILED: &str = "Homing Failed";

/// Sequences axis homing against the limit switches
pub struct HomingSequence {
    motion: Arc<MotionController>,
    switches: Arc<dyn LimitSwitches>,
}

impl HomingSequence {
    /// Create a homing sequence over a motion controller and its switches
    pub fn new(motion: Arc<MotionController>, switches: Arc<dyn LimitSwitches>) -> Self {
        Self { motion, switches }
    }

    /// The motion controller being homed
    pub fn motion(&self) -> &Arc<MotionController> {
        &self.motion
    }

    fn state(&self) -> &Arc<ModuleState> {
        self.motion.state()
    }

    /// Home every axis and mark the machine homed on success
    ///
    /// Clears any pending stop request first, then enables the motors.
    pub fn home_all(&self) -> Result<Outcome, MotionError> {
        tracing::info!("Homing all axes");
        let state = self.state();
        state.clear_stop();
        state.set_homed(false);

        let outcome = self.run_cycle(true).inspect_err(|e| self.fail(e))?;
        if outcome.is_completed() {
            state.transition_homing(HomingState::Homed)?;
            state.set_homed(true);
            state
                .events()
                .publish(AppEvent::Machine(MachineEvent::Homed))
                .ok();
            tracing::info!("Homing complete");
        }
        Ok(outcome)
    }

    /// Home X and Y only, enabling the motors first
    ///
    /// Does not set `homed`; only [`Self::home_all`] does.
    pub fn home_xy(&self) -> Result<Outcome, MotionError> {
        tracing::info!("Homing X/Y");
        self.run_cycle(false).inspect_err(|e| self.fail(e))
    }

    /// Release the motors so the carriage can be moved by hand
    pub fn disable_motors(&self) -> Result<(), MotionError> {
        tracing::info!("Disabling motors");
        self.state().transition_homing(HomingState::Disabled)?;
        self.motion.enable_motors(false)
    }

    fn run_cycle(&self, include_z: bool) -> Result<Outcome, MotionError> {
        self.state().transition_homing(HomingState::Enabling)?;
        self.motion.enable_motors(true)?;

        if self.home_axis(Axis::Y, HomingState::HomingY)?.is_stopped() {
            return Ok(Outcome::Stopped);
        }
        if self.home_axis(Axis::X, HomingState::HomingX)?.is_stopped() {
            return Ok(Outcome::Stopped);
        }
        if include_z {
            return self.home_axis(Axis::Z, HomingState::HomingZ);
        }
        Ok(Outcome::Completed(()))
    }

    /// Poll the switch of `axis` until it reads released
    ///
    /// Returns false, after raising the alarm, if it never did.
    pub fn debounce(&self, axis: Axis) -> Result<bool, MotionError> {
        let machine = self.motion.machine();
        for attempt in 0..machine.switch_poll_attempts {
            if !self.switches.is_triggered(axis)? {
                if attempt > 0 {
                    tracing::debug!("{} switch released after {} polls", axis, attempt);
                }
                return Ok(true);
            }
            self.switches.force_release(axis)?;
            let interval = machine.switch_poll_interval();
            if !interval.is_zero() {
                std::thread::sleep(interval);
            }
        }

        tracing::warn!(
            "{} limit switch still triggered after {} polls",
            axis,
            machine.switch_poll_attempts
        );
        self.state().raise_alarm(LIMIT_SWITCH_FAILED);
        self.switches.force_release(axis)?;
        Ok(false)
    }

    fn home_axis(&self, axis: Axis, phase: HomingState) -> Result<Outcome, MotionError> {
        let state = self.state();
        state.transition_homing(phase)?;
        self.debounce(axis)?;

        let max_steps = self.motion.machine().homing_max_steps;
        self.motion.prepare_jog(axis, false)?;
        let mut taken = 0u64;
        loop {
            if state.stop_requested() {
                state.transition_homing(HomingState::Stopped)?;
                return Ok(self.motion.abort_on_stop());
            }
            if self.switches.is_triggered(axis)? {
                break;
            }
            if taken >= max_steps {
                state.raise_alarm(HOMING_FAILED);
                return Err(MotionError::HomingFailed {
                    axis: axis.to_string(),
                    reason: format!("switch not reached within {} steps", max_steps),
                });
            }
            self.motion.jog_step(axis)?;
            taken += 1;
        }

        self.switches.force_release(axis)?;
        state.set_axis_position(axis, 0);
        tracing::debug!("{} homed after {} steps", axis, taken);
        Ok(Outcome::Completed(()))
    }

    fn fail(&self, error: &MotionError) {
        tracing::error!("Homing aborted: {}", error);
        self.state().transition_homing(HomingState::Stopped).ok();
        self.state().set_homed(false);
    }
}

impl std::fmt::Debug for HomingSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomingSequence")
            .field("state", &self.state().homing_state())
            .finish()
    }
}
