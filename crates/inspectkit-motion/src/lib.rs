//! # InspectKit Motion
//!
//! Converts logical axis motion into stepper pulses and references the
//! carriage against its limit switches.
//!
//! - [`kinematics`]: the CoreXY transform from logical X/Y deltas to motor A/B deltas
//! - [`controller`]: per-axis moves, `go_to` and the cancellable pulse loop
//! - [`homing`]: the homing state machine with switch debouncing

pub mod controller;
pub mod homing;
pub mod kinematics;

pub use controller::MotionController;
pub use homing::{HomingSequence, HOMING_FAILED, LIMIT_SWITCH_FAILED};
pub use kinematics::{motor_move, MotorMove};
