//! Event type definitions for the event bus.
//!
//! Events are cloneable and serializable so the status collaborator can
//! forward them verbatim.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::data::{HomingState, ModuleStatus, Position};

/// Root event enum for all instrument events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppEvent {
    /// Motion, homing and alarm events
    Machine(MachineEvent),
    /// Autofocus events
    Focus(FocusEvent),
    /// Sampling and scanning events
    Sampling(SamplingEvent),
}

impl AppEvent {
    /// Get the category of this event
    pub fn category(&self) -> EventCategory {
        match self {
            AppEvent::Machine(_) => EventCategory::Machine,
            AppEvent::Focus(_) => EventCategory::Focus,
            AppEvent::Sampling(_) => EventCategory::Sampling,
        }
    }

    /// Get a short description of this event for logging
    pub fn description(&self) -> String {
        match self {
            AppEvent::Machine(e) => e.description(),
            AppEvent::Focus(e) => e.description(),
            AppEvent::Sampling(e) => e.description(),
        }
    }
}

/// Event category for filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    /// Motion, homing and alarm events.
    Machine,
    /// Autofocus events.
    Focus,
    /// Sampling and scanning events.
    Sampling,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Machine => write!(f, "Machine"),
            EventCategory::Focus => write!(f, "Focus"),
            EventCategory::Sampling => write!(f, "Sampling"),
        }
    }
}

/// Machine state events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MachineEvent {
    /// Motion was interrupted by the stop signal; the module is idle again.
    ResetToIdle,
    /// Module status changed.
    StatusChanged {
        /// New status.
        status: ModuleStatus,
    },
    /// Homing state machine advanced.
    HomingStateChanged {
        /// Previous state.
        old: HomingState,
        /// New state.
        new: HomingState,
    },
    /// A full homing sequence completed.
    Homed,
    /// Logical position changed (reported after each completed move).
    PositionChanged {
        /// Logical position in mm.
        position: Position,
    },
    /// Alarm raised (overwrites any previous alarm).
    AlarmRaised {
        /// Human-readable alarm message.
        message: String,
    },
    /// Alarm cleared by the operator.
    AlarmCleared,
    /// Motors enabled or disabled.
    MotorsEnabled {
        /// Whether the motors are energized.
        enabled: bool,
    },
}

impl MachineEvent {
    /// Get a short description for logging
    pub fn description(&self) -> String {
        match self {
            MachineEvent::ResetToIdle => "Reset to idle".to_string(),
            MachineEvent::StatusChanged { status } => format!("Status: {}", status),
            MachineEvent::HomingStateChanged { old, new } => {
                format!("Homing: {} -> {}", old, new)
            }
            MachineEvent::Homed => "Homing complete".to_string(),
            MachineEvent::PositionChanged { position } => format!("Position: {}", position),
            MachineEvent::AlarmRaised { message } => format!("Alarm: {}", message),
            MachineEvent::AlarmCleared => "Alarm cleared".to_string(),
            MachineEvent::MotorsEnabled { enabled } => {
                format!("Motors {}", if *enabled { "enabled" } else { "disabled" })
            }
        }
    }
}

/// Autofocus events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FocusEvent {
    /// One point of the sweep was scored.
    PointScored {
        /// Z position in mm.
        z_mm: f64,
        /// Sharpness score.
        score: f64,
    },
    /// Sweep finished and the carriage sits at the best z.
    Focused {
        /// Best z position in mm.
        z_mm: f64,
        /// Score at that position.
        score: f64,
    },
}

impl FocusEvent {
    /// Get a short description for logging
    pub fn description(&self) -> String {
        match self {
            FocusEvent::PointScored { z_mm, score } => {
                format!("Focus z={:.3} score={:.3}", z_mm, score)
            }
            FocusEvent::Focused { z_mm, score } => {
                format!("Focused at z={:.3} (score {:.3})", z_mm, score)
            }
        }
    }
}

/// Sampling and scanning events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SamplingEvent {
    /// A run started with a known image target.
    Started {
        /// Total number of images planned.
        total_images: usize,
    },
    /// One image was captured and persisted.
    ImageCaptured {
        /// Index of the image within the run.
        index: usize,
        /// Path of the written image.
        path: PathBuf,
    },
    /// A capture or persistence failure skipped one point.
    CaptureSkipped {
        /// Index of the skipped point.
        index: usize,
        /// Reason the capture was skipped.
        reason: String,
    },
    /// The run ended.
    Finished {
        /// Number of images captured.
        captured: usize,
        /// Whether the run was interrupted by the stop signal.
        stopped: bool,
    },
}

impl SamplingEvent {
    /// Get a short description for logging
    pub fn description(&self) -> String {
        match self {
            SamplingEvent::Started { total_images } => {
                format!("Run started: {} images", total_images)
            }
            SamplingEvent::ImageCaptured { index, path } => {
                format!("Captured #{}: {}", index, path.display())
            }
            SamplingEvent::CaptureSkipped { index, reason } => {
                format!("Skipped #{}: {}", index, reason)
            }
            SamplingEvent::Finished { captured, stopped } => {
                if *stopped {
                    format!("Run stopped after {} images", captured)
                } else {
                    format!("Run finished: {} images", captured)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_category() {
        let event = AppEvent::Machine(MachineEvent::ResetToIdle);
        assert_eq!(event.category(), EventCategory::Machine);

        let event = AppEvent::Focus(FocusEvent::Focused {
            z_mm: 1.0,
            score: 2.0,
        });
        assert_eq!(event.category(), EventCategory::Focus);

        let event = AppEvent::Sampling(SamplingEvent::Started { total_images: 4 });
        assert_eq!(event.category(), EventCategory::Sampling);
    }

    #[test]
    fn test_event_description() {
        let event = AppEvent::Machine(MachineEvent::AlarmRaised {
            message: "Limit Switch Failed".to_string(),
        });
        assert_eq!(event.description(), "Alarm: Limit Switch Failed");

        let event = AppEvent::Sampling(SamplingEvent::Finished {
            captured: 3,
            stopped: true,
        });
        assert!(event.description().contains("stopped"));
    }

    #[test]
    fn test_event_serialization() {
        let event = AppEvent::Machine(MachineEvent::HomingStateChanged {
            old: HomingState::HomingY,
            new: HomingState::Stopped,
        });
        let json = serde_json::to_string(&event).expect("Should serialize");
        let deserialized: AppEvent = serde_json::from_str(&json).expect("Should deserialize");
        assert_eq!(deserialized.category(), EventCategory::Machine);
    }
}
