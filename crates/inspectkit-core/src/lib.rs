//! # InspectKit Core
//!
//! Core types, shared state, and utilities for InspectKit.
//! Provides the fundamental abstractions for the instrument state,
//! homing state machine, sample model, events, and error taxonomy.

pub mod data;
pub mod error;
pub mod event_bus;
pub mod state;
pub mod types;
pub mod units;

pub use data::{
    metadata::{CameraSettings, ImageMetadata, WhiteBalanceGains},
    sample::{BoundingBox, Point2, Sample},
    Axis, CoreXyConvention, HomingState, ModuleStatus, MotorId, Outcome, PartialPosition, Position,
    StepPosition,
};

pub use error::{
    CommandError, Error, FocusError, HardwareError, MotionError, Result, SamplingError,
    StorageError,
};

pub use event_bus::{
    AppEvent, EventBus, EventCategory, EventFilter, FocusEvent, MachineEvent,
    SamplingEvent, SubscriptionId,
};

pub use state::{ImageCounters, ModuleState, StopSignal};

pub use types::{thread_safe, DataCallback, ThreadSafe};
