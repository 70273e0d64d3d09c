//! Limit switch interface

use inspectkit_core::{Axis, HardwareError};

/// Latched limit switch inputs, one per axis
///
/// A triggered reading stays latched until [`LimitSwitches::force_release`]
/// is called, so homing code must release a switch after acting on it.
pub trait LimitSwitches: Send + Sync {
    /// Whether the switch of `axis` currently reads triggered
    fn is_triggered(&self, axis: Axis) -> Result<bool, HardwareError>;

    /// Reset the latched state of the switch of `axis`
    fn force_release(&self, axis: Axis) -> Result<(), HardwareError>;
}
