//! Shared instrument state and concurrency guards
//!
//! The state is split into independent leaf-level aggregates, each behind its
//! own lock: position, image counters, alarm, module status, homing state and
//! the loaded sample. No method holds one guard while acquiring another, so
//! a status poll sees each aggregate internally consistent but makes no
//! promise across aggregates.
//!
//! The stop request and the homed / motors-enabled flags are plain atomics
//! read and cleared cooperatively by the long-running routines.
//!
//! Logical position is updated *before* the pulses that realize it. After a
//! stop mid-motion the recorded position may lead the physical carriage
//! until the next full homing cycle.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::data::sample::Sample;
use crate::data::{Axis, HomingState, ModuleStatus, StepPosition};
use crate::error::MotionError;
use crate::event_bus::{AppEvent, EventBus, MachineEvent};

/// Cooperative cancellation token
///
/// Cloning shares the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    /// Create a new, cleared signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request every running routine to stop at its next step boundary
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous request
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Image counters of the current sampling or scanning run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCounters {
    /// Planned number of images
    pub total_images: usize,
    /// Images captured so far
    pub image_count: usize,
}

/// Whole-instrument state shared between the worker and the status reporter
#[derive(Debug)]
pub struct ModuleState {
    position: Mutex<StepPosition>,
    images: Mutex<ImageCounters>,
    alarm: Mutex<Option<String>>,
    status: Mutex<ModuleStatus>,
    homing: Mutex<HomingState>,
    sample: Mutex<Option<Sample>>,
    stop: StopSignal,
    homed: AtomicBool,
    motors_enabled: AtomicBool,
    events: Arc<EventBus>,
}

impl ModuleState {
    /// Create the state for a freshly started instrument (motors disabled, not homed)
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            position: Mutex::new(StepPosition::default()),
            images: Mutex::new(ImageCounters::default()),
            alarm: Mutex::new(None),
            status: Mutex::new(ModuleStatus::Disabled),
            homing: Mutex::new(HomingState::Disabled),
            sample: Mutex::new(None),
            stop: StopSignal::new(),
            homed: AtomicBool::new(false),
            motors_enabled: AtomicBool::new(false),
            events,
        }
    }

    /// Event bus the state publishes to
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    fn emit(&self, event: MachineEvent) {
        self.events.publish(AppEvent::Machine(event)).ok();
    }

    // ---------------------------------------------------------------------
    // Position
    // ---------------------------------------------------------------------

    /// Snapshot of the logical position
    pub fn position(&self) -> StepPosition {
        *self.position.lock()
    }

    /// Offset one axis of the logical position
    pub fn offset_position(&self, axis: Axis, delta: i64) {
        self.position.lock().offset(axis, delta);
    }

    /// Overwrite one axis of the logical position (used when zeroing)
    pub fn set_axis_position(&self, axis: Axis, steps: i64) {
        self.position.lock().set(axis, steps);
    }

    // ---------------------------------------------------------------------
    // Image counters
    // ---------------------------------------------------------------------

    /// Snapshot of the image counters
    pub fn counters(&self) -> ImageCounters {
        *self.images.lock()
    }

    /// Zero both counters
    pub fn reset_counters(&self) {
        *self.images.lock() = ImageCounters::default();
    }

    /// Start a run: image count zero, target set
    pub fn begin_run(&self, total_images: usize) {
        *self.images.lock() = ImageCounters {
            total_images,
            image_count: 0,
        };
    }

    /// Count one captured image, returning the new count
    pub fn increment_image_count(&self) -> usize {
        let mut images = self.images.lock();
        images.image_count += 1;
        images.image_count
    }

    // ---------------------------------------------------------------------
    // Alarm
    // ---------------------------------------------------------------------

    /// Current alarm, if any
    pub fn alarm(&self) -> Option<String> {
        self.alarm.lock().clone()
    }

    /// Raise an alarm, overwriting any previous one
    pub fn raise_alarm(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Alarm: {}", message);
        *self.alarm.lock() = Some(message.clone());
        self.emit(MachineEvent::AlarmRaised { message });
    }

    /// Clear the alarm (operator refresh)
    pub fn clear_alarm(&self) {
        let had_alarm = self.alarm.lock().take().is_some();
        if had_alarm {
            tracing::info!("Alarm cleared by operator");
            self.emit(MachineEvent::AlarmCleared);
        }
    }

    // ---------------------------------------------------------------------
    // Module status
    // ---------------------------------------------------------------------

    /// Current module status
    pub fn status(&self) -> ModuleStatus {
        *self.status.lock()
    }

    /// Set the module status
    pub fn set_status(&self, status: ModuleStatus) {
        let changed = {
            let mut current = self.status.lock();
            let changed = *current != status;
            *current = status;
            changed
        };
        if changed {
            self.emit(MachineEvent::StatusChanged { status });
        }
    }

    /// Return to idle after the stop signal interrupted a routine
    pub fn signal_reset_to_idle(&self) {
        tracing::info!("Stop observed, resetting to idle");
        self.set_status(ModuleStatus::Idle);
        self.emit(MachineEvent::ResetToIdle);
    }

    // ---------------------------------------------------------------------
    // Homing state machine
    // ---------------------------------------------------------------------

    /// Current homing state
    pub fn homing_state(&self) -> HomingState {
        *self.homing.lock()
    }

    /// Advance the homing state machine
    pub fn transition_homing(&self, next: HomingState) -> Result<(), MotionError> {
        let old = {
            let mut current = self.homing.lock();
            let old = *current;
            if !old.can_transition_to(next) {
                return Err(MotionError::InvalidHomingTransition {
                    current: old.to_string(),
                    requested: next.to_string(),
                });
            }
            *current = next;
            old
        };
        if old != next {
            tracing::debug!("Homing state {} -> {}", old, next);
            self.emit(MachineEvent::HomingStateChanged { old, new: next });
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Sample
    // ---------------------------------------------------------------------

    /// Replace the loaded sample
    pub fn load_sample(&self, sample: Sample) {
        tracing::info!("Loaded sample {}", sample.sample_id);
        *self.sample.lock() = Some(sample);
    }

    /// Snapshot of the loaded sample
    pub fn sample(&self) -> Option<Sample> {
        self.sample.lock().clone()
    }

    /// Mutate the loaded sample in place; returns None when no sample is loaded
    pub fn with_sample<R>(&self, f: impl FnOnce(&mut Sample) -> R) -> Option<R> {
        self.sample.lock().as_mut().map(f)
    }

    // ---------------------------------------------------------------------
    // Stop / homed / motors-enabled signals
    // ---------------------------------------------------------------------

    /// Shared stop token
    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    /// Whether a stop is currently requested
    pub fn stop_requested(&self) -> bool {
        self.stop.is_requested()
    }

    /// Request a stop; the carriage position is no longer trusted
    pub fn request_stop(&self) {
        self.stop.request();
        self.homed.store(false, Ordering::SeqCst);
    }

    /// Clear the stop request (only at the start of a homing cycle)
    pub fn clear_stop(&self) {
        self.stop.clear();
    }

    /// Whether a full homing cycle completed since the last stop or disable
    pub fn is_homed(&self) -> bool {
        self.homed.load(Ordering::SeqCst)
    }

    /// Set or clear the homed flag
    pub fn set_homed(&self, homed: bool) {
        self.homed.store(homed, Ordering::SeqCst);
    }

    /// Whether the motors are energized
    pub fn motors_enabled(&self) -> bool {
        self.motors_enabled.load(Ordering::SeqCst)
    }

    /// Record the motors-enabled state; disabling also clears `homed`
    pub fn set_motors_enabled(&self, enabled: bool) {
        self.motors_enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.homed.store(false, Ordering::SeqCst);
        }
        self.emit(MachineEvent::MotorsEnabled { enabled });
    }
}
