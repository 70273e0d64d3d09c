//! Error handling for InspectKit
//!
//! Provides error types for all layers of the instrument core:
//! - Hardware errors (digital I/O lines, camera capture)
//! - Motion errors (kinematics, homing)
//! - Focus errors (autofocus sweep configuration)
//! - Sampling errors (orchestration preconditions)
//! - Storage errors (image and metadata persistence)
//! - Command errors (operator command intake)
//!
//! All error types use `thiserror` for ergonomic error handling.
//! Cancellation through the stop signal is not an error; it is reported
//! through [`crate::Outcome::Stopped`].

use std::path::PathBuf;
use thiserror::Error;

/// Hardware error type
///
/// Raised by the capability interfaces (motor driver, limit switches, camera).
#[derive(Error, Debug, Clone)]
pub enum HardwareError {
    /// A digital output or input line could not be driven or read
    #[error("I/O line '{line}' failed: {reason}")]
    Line {
        /// The line identifier.
        line: String,
        /// The reason the line operation failed.
        reason: String,
    },

    /// Camera failed to deliver a frame
    #[error("Frame capture failed: {reason}")]
    CaptureFailed {
        /// The reason the capture failed.
        reason: String,
    },

    /// Camera rejected the requested settings
    #[error("Camera settings rejected: {reason}")]
    SettingsRejected {
        /// The reason the settings were rejected.
        reason: String,
    },
}

/// Motion error type
///
/// Represents failures of the kinematic controller and homing sequence.
#[derive(Error, Debug, Clone)]
pub enum MotionError {
    /// Motors are disabled and cannot be pulsed
    #[error("Motors are disabled")]
    MotorsDisabled,

    /// Homing travel exceeded its step budget without the switch triggering
    #[error("Homing failed on {axis}: {reason}")]
    HomingFailed {
        /// The axis being homed.
        axis: String,
        /// The reason the homing cycle failed.
        reason: String,
    },

    /// Requested position cannot be represented on the axis
    #[error("Target out of range on {axis}: {target}")]
    OutOfRange {
        /// The axis being moved.
        axis: String,
        /// The rejected target.
        target: String,
    },

    /// Invalid homing state transition
    #[error("Invalid homing transition from {current} to {requested}")]
    InvalidHomingTransition {
        /// The current state name.
        current: String,
        /// The requested state name.
        requested: String,
    },

    /// Underlying hardware fault while moving
    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

/// Focus error type
#[derive(Error, Debug, Clone)]
pub enum FocusError {
    /// Sweep bounds or step are unusable
    #[error("Invalid focus range {z_min_mm}..={z_max_mm} mm with step {step_mm} mm")]
    InvalidRange {
        /// Lower bound in mm.
        z_min_mm: f64,
        /// Upper bound in mm.
        z_max_mm: f64,
        /// Step size in mm.
        step_mm: f64,
    },

    /// No frame in the sweep could be scored
    #[error("Focus sweep produced no scored frames")]
    NoSamples,
}

/// Sampling error type
///
/// Precondition failures of the sampling orchestrator. Each of these is also
/// surfaced to the operator through the alarm string.
#[derive(Error, Debug, Clone)]
pub enum SamplingError {
    /// No sample loaded, or its bounding box was never computed
    #[error("No Bounding Box Set")]
    NoBoundingBox,

    /// The post-focus sharpness check failed
    #[error("Sample not detected or not in focus (score {score:.3})")]
    SampleNotDetected {
        /// The sharpness score that fell below the threshold.
        score: f64,
    },

    /// Grid step must be a positive whole number of millimetres
    #[error("Invalid scan step: x={step_x}, y={step_y}")]
    InvalidStep {
        /// Step along X in mm.
        step_x: u32,
        /// Step along Y in mm.
        step_y: u32,
    },
}

/// Storage error type
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Buffer directory could not be created
    #[error("Buffer directory {path:?} unavailable: {reason}")]
    BufferUnavailable {
        /// The buffer directory.
        path: PathBuf,
        /// The reason it is unavailable.
        reason: String,
    },

    /// Image or metadata file could not be written
    #[error("Failed to write {path:?}: {reason}")]
    WriteFailed {
        /// The file being written.
        path: PathBuf,
        /// The reason the write failed.
        reason: String,
    },
}

/// Command error type
#[derive(Error, Debug, Clone)]
pub enum CommandError {
    /// A long-running routine is already executing on the worker
    #[error("Instrument busy: {running} in progress")]
    Busy {
        /// Name of the routine currently running.
        running: String,
    },

    /// Operator command could not be parsed
    #[error("Cannot parse command '{input}': {reason}")]
    Parse {
        /// The raw command text.
        input: String,
        /// The reason parsing failed.
        reason: String,
    },

    /// Command argument is outside its accepted range
    #[error("Invalid {argument}: {reason}")]
    InvalidArgument {
        /// The argument name.
        argument: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// Worker thread could not be spawned
    #[error("Worker thread unavailable: {reason}")]
    WorkerUnavailable {
        /// The reason the worker could not start.
        reason: String,
    },
}

/// Main error type for InspectKit
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Hardware error
    #[error(transparent)]
    Hardware(#[from] HardwareError),

    /// Motion error
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Focus error
    #[error(transparent)]
    Focus(#[from] FocusError),

    /// Sampling error
    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Command error
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a precondition failure of a sampling routine
    pub fn is_precondition_failure(&self) -> bool {
        matches!(self, Error::Sampling(_))
    }

    /// Check if this is a hardware error, directly or through motion
    pub fn is_hardware_error(&self) -> bool {
        matches!(
            self,
            Error::Hardware(_) | Error::Motion(MotionError::Hardware(_))
        )
    }

    /// Check if this is a capture failure
    pub fn is_capture_failure(&self) -> bool {
        matches!(self, Error::Hardware(HardwareError::CaptureFailed { .. }))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_error_messages_match_alarm_text() {
        assert_eq!(SamplingError::NoBoundingBox.to_string(), "No Bounding Box Set");
        assert!(SamplingError::SampleNotDetected { score: 0.2 }
            .to_string()
            .starts_with("Sample not detected or not in focus"));
    }

    #[test]
    fn test_error_classification() {
        let err: Error = HardwareError::CaptureFailed {
            reason: "timeout".into(),
        }
        .into();
        assert!(err.is_capture_failure());
        assert!(err.is_hardware_error());
        assert!(!err.is_precondition_failure());

        let err: Error = MotionError::Hardware(HardwareError::Line {
            line: "A.step".into(),
            reason: "bus fault".into(),
        })
        .into();
        assert!(err.is_hardware_error());

        let err: Error = SamplingError::NoBoundingBox.into();
        assert!(err.is_precondition_failure());
    }
}
