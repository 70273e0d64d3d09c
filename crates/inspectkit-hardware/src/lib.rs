//! # InspectKit Hardware
//!
//! Capability interfaces consumed by the motion, focus and sampling layers:
//! - [`MotorDriver`]: step/direction outputs per motor plus the enable line
//! - [`LimitSwitches`]: latched limit switch inputs with a force-release reset
//! - [`Camera`]: frame capture and acquisition settings
//!
//! The [`sim`] module provides an in-memory stage implementing all three,
//! used by the test suites and for dry runs without the instrument attached.

pub mod camera;
pub mod motor;
pub mod sim;
pub mod switch;

pub use camera::Camera;
pub use motor::MotorDriver;
pub use sim::{SimCamera, SimMotors, SimStage, SimStageConfig, SimSwitches, StepHook};
pub use switch::LimitSwitches;
