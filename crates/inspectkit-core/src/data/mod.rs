//! Data models for positions, status, and instrument state
//!
//! This module provides:
//! - Logical axes and physical motors
//! - Position tracking in step units and in millimetres
//! - Partial positions for moves that touch only some axes
//! - Module status and the homing state machine
//! - Sample and bounding box model
//! - Per-capture metadata and camera settings

pub mod metadata;
pub mod sample;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical carriage axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal X axis (CoreXY)
    X,
    /// Horizontal Y axis (CoreXY)
    Y,
    /// Vertical focus axis
    Z,
}

impl Axis {
    /// All axes in homing-independent order
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "X"),
            Axis::Y => write!(f, "Y"),
            Axis::Z => write!(f, "Z"),
        }
    }
}

/// Physical stepper motor
///
/// Motors A and B are the two CoreXY belt motors; Z drives the focus axis directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotorId {
    /// CoreXY motor A
    A,
    /// CoreXY motor B
    B,
    /// Vertical motor
    Z,
}

impl fmt::Display for MotorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorId::A => write!(f, "A"),
            MotorId::B => write!(f, "B"),
            MotorId::Z => write!(f, "Z"),
        }
    }
}

/// Sign convention of the CoreXY belt arrangement
///
/// X motion always drives both motors the same way and Y motion drives them
/// in opposite directions; the convention decides which motor takes the
/// positive Y term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreXyConvention {
    /// A = X + Y, B = X - Y
    #[default]
    Standard,
    /// A = X - Y, B = X + Y
    Mirrored,
}

impl CoreXyConvention {
    /// Motor (A, B) deltas for a logical (X, Y) delta
    pub fn motor_deltas(&self, dx: i64, dy: i64) -> (i64, i64) {
        match self {
            CoreXyConvention::Standard => (dx + dy, dx - dy),
            CoreXyConvention::Mirrored => (dx - dy, dx + dy),
        }
    }

    /// Logical (X, Y) for motor (A, B) counts; inverse of [`Self::motor_deltas`]
    ///
    /// Only exact for counts produced by whole-step logical moves.
    pub fn cartesian(&self, a: i64, b: i64) -> (i64, i64) {
        match self {
            CoreXyConvention::Standard => ((a + b) / 2, (a - b) / 2),
            CoreXyConvention::Mirrored => ((a + b) / 2, (b - a) / 2),
        }
    }
}

impl fmt::Display for CoreXyConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Mirrored => write!(f, "mirrored"),
        }
    }
}

/// Logical carriage position in step units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPosition {
    /// X position in steps
    pub x: i64,
    /// Y position in steps
    pub y: i64,
    /// Z position in steps
    pub z: i64,
}

impl StepPosition {
    /// Create a new step position
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Get the position of one axis
    pub fn get(&self, axis: Axis) -> i64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Set the position of one axis
    pub fn set(&mut self, axis: Axis, steps: i64) {
        match axis {
            Axis::X => self.x = steps,
            Axis::Y => self.y = steps,
            Axis::Z => self.z = steps,
        }
    }

    /// Offset one axis by a signed number of steps
    pub fn offset(&mut self, axis: Axis, delta: i64) {
        self.set(axis, self.get(axis) + delta);
    }
}

impl fmt::Display for StepPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{} Y:{} Z:{} (steps)", self.x, self.y, self.z)
    }
}

/// Carriage position in millimetres
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl Position {
    /// Create a new position with X, Y, Z coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        debug_assert!(
            x.is_finite() && y.is_finite() && z.is_finite(),
            "Position axes must be finite: x={x}, y={y}, z={z}"
        );
        Self { x, y, z }
    }

    /// Get the coordinate of one axis
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Partial position for moves that only touch specific axes
///
/// Each axis is an `Option`: `None` means "stay where you are",
/// `Some(value)` means "go to value" (millimetres).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialPosition {
    /// X target (if Some, move this axis)
    pub x: Option<f64>,
    /// Y target (if Some, move this axis)
    pub y: Option<f64>,
    /// Z target (if Some, move this axis)
    pub z: Option<f64>,
}

impl PartialPosition {
    /// Create a new empty partial position (all axes None)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a partial position with only Z set
    pub fn z_only(z: f64) -> Self {
        Self {
            z: Some(z),
            ..Default::default()
        }
    }

    /// Create a partial position with XY set
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    /// Create a partial position with XYZ set
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Get the target of one axis
    pub fn get(&self, axis: Axis) -> Option<f64> {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Check if this partial position is empty (no axes set)
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}

/// Result of a cancellable routine
///
/// Cancellation through the stop signal is a normal early exit, not an error.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome<T = ()> {
    /// The routine ran to completion
    Completed(T),
    /// The stop signal was observed and the routine exited early
    Stopped,
}

impl<T> Outcome<T> {
    /// True when the routine ran to completion
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    /// True when the routine was interrupted by the stop signal
    pub fn is_stopped(&self) -> bool {
        matches!(self, Outcome::Stopped)
    }

    /// Value of a completed routine
    pub fn completed(self) -> Option<T> {
        match self {
            Outcome::Completed(value) => Some(value),
            Outcome::Stopped => None,
        }
    }

    /// Map the completed value
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Completed(value) => Outcome::Completed(f(value)),
            Outcome::Stopped => Outcome::Stopped,
        }
    }
}

/// Operational status of the module as reported to the operator console
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleStatus {
    /// Motors disabled, carriage may be moved by hand
    Disabled,
    /// Ready for commands
    Idle,
    /// Homing sequence in progress
    Homing,
    /// Point-to-point move in progress
    Moving,
    /// Autofocus sweep in progress
    Focusing,
    /// Random sampling in progress
    Sampling,
    /// Grid scan in progress
    Scanning,
}

impl ModuleStatus {
    /// Check if this status indicates a running routine
    pub fn is_busy(&self) -> bool {
        !matches!(self, ModuleStatus::Disabled | ModuleStatus::Idle)
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::Idle => write!(f, "Idle"),
            Self::Homing => write!(f, "Homing"),
            Self::Moving => write!(f, "Moving"),
            Self::Focusing => write!(f, "Focusing"),
            Self::Sampling => write!(f, "Sampling"),
            Self::Scanning => write!(f, "Scanning"),
        }
    }
}

/// Homing state machine states
///
/// `Disabled → Enabling → HomingY → HomingX → HomingZ → Homed`, with
/// `Stopped` reachable from every homing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomingState {
    /// Motors disabled
    Disabled,
    /// Motors being enabled, stop signal cleared
    Enabling,
    /// Driving toward the Y limit switch
    HomingY,
    /// Driving toward the X limit switch
    HomingX,
    /// Driving toward the Z limit switch
    HomingZ,
    /// All axes referenced; the carriage is idle
    Homed,
    /// Homing interrupted by the stop signal or a failed axis
    Stopped,
}

impl HomingState {
    /// Check if this state is one of the axis-driving states
    pub fn is_homing(&self) -> bool {
        matches!(
            self,
            HomingState::Enabling | HomingState::HomingY | HomingState::HomingX | HomingState::HomingZ
        )
    }

    /// Check if a transition from this state to `target` is valid.
    ///
    /// - Any state may start a new cycle (Enabling) or be disabled
    /// - Each axis state advances to the next axis or to Stopped
    /// - Homed is only reached from HomingZ
    pub fn can_transition_to(&self, target: HomingState) -> bool {
        use HomingState::*;
        if *self == target {
            return true;
        }
        match (self, target) {
            (_, Disabled | Enabling) => true,
            (Enabling, HomingY | Stopped) => true,
            (HomingY, HomingX | Stopped) => true,
            (HomingX, HomingZ | Stopped) => true,
            (HomingZ, Homed | Stopped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for HomingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::Enabling => write!(f, "Enabling"),
            Self::HomingY => write!(f, "HomingY"),
            Self::HomingX => write!(f, "HomingX"),
            Self::HomingZ => write!(f, "HomingZ"),
            Self::Homed => write!(f, "Homed"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}
