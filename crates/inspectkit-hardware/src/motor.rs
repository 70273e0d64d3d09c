//! Two-line (step, direction) motor driver interface

use inspectkit_core::{HardwareError, MotorId};
use std::time::Duration;

/// Low-level stepper driver
///
/// Implementations drive one direction line and one step line per motor and
/// a shared enable line. All methods take `&self`; drivers synchronize
/// internally so the worker and the operator command path can share one
/// instance.
pub trait MotorDriver: Send + Sync {
    /// Set the direction line of a motor (`true` = positive travel)
    fn set_direction(&self, motor: MotorId, forward: bool) -> Result<(), HardwareError>;

    /// Drive the step line of a motor high or low
    fn set_step(&self, motor: MotorId, high: bool) -> Result<(), HardwareError>;

    /// Energize or release all motors
    fn set_enabled(&self, enabled: bool) -> Result<(), HardwareError>;

    /// Issue one step: hold the step line high for `width`, then release it
    fn pulse_step(&self, motor: MotorId, width: Duration) -> Result<(), HardwareError> {
        self.set_step(motor, true)?;
        if !width.is_zero() {
            std::thread::sleep(width);
        }
        self.set_step(motor, false)
    }
}
