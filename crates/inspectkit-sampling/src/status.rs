//! Status snapshots and the periodic reporter

use chrono::{DateTime, Utc};
use inspectkit_core::{
    AppEvent, DataCallback, HomingState, MachineEvent, ModuleStatus, Position, SamplingEvent,
};
use inspectkit_motion::MotionController;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Point-in-time view of the instrument
///
/// Each field is read under its own guard, so a snapshot taken while a
/// routine runs may mix values from slightly different moments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Module status
    pub status: ModuleStatus,
    /// Homing state machine
    pub homing_state: HomingState,
    /// Logical position in mm
    pub position: Position,
    /// Whether a full homing cycle completed since the last stop or release
    pub homed: bool,
    /// Whether the motors are energized
    pub motors_enabled: bool,
    /// Current alarm, if any
    pub alarm: Option<String>,
    /// Images planned for the running routine
    pub total_images: usize,
    /// Images captured so far by the running routine
    pub image_count: usize,
    /// Identifier of the loaded sample
    pub sample_id: Option<String>,
    /// Layer of the loaded sample
    pub current_layer: Option<u32>,
}

impl StatusSnapshot {
    /// Read the current state through `motion`
    pub fn capture(motion: &MotionController) -> Self {
        let state = motion.state();
        let counters = state.counters();
        let sample = state.sample();
        Self {
            timestamp: Utc::now(),
            status: state.status(),
            homing_state: state.homing_state(),
            position: motion.position_mm(),
            homed: state.is_homed(),
            motors_enabled: state.motors_enabled(),
            alarm: state.alarm(),
            total_images: counters.total_images,
            image_count: counters.image_count,
            sample_id: sample.as_ref().map(|s| s.sample_id.clone()),
            current_layer: sample.as_ref().map(|s| s.current_layer),
        }
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} [{}] X:{:.3} Y:{:.3} Z:{:.3}",
            self.status, self.homing_state, self.position.x, self.position.y, self.position.z
        );
        if self.total_images > 0 {
            line.push_str(&format!(" images {}/{}", self.image_count, self.total_images));
        }
        if let Some(alarm) = &self.alarm {
            line.push_str(&format!(" ALARM: {}", alarm));
        }
        line
    }
}

/// Whether `event` warrants a snapshot ahead of the next tick
fn reports_immediately(event: &AppEvent) -> bool {
    matches!(
        event,
        AppEvent::Machine(
            MachineEvent::StatusChanged { .. }
                | MachineEvent::AlarmRaised { .. }
                | MachineEvent::AlarmCleared
                | MachineEvent::Homed
        ) | AppEvent::Sampling(SamplingEvent::Finished { .. })
    )
}

/// Publishes a [`StatusSnapshot`] at a fixed interval
///
/// Status changes, alarms, homing and finished runs arrive over the event
/// bus and are reported without waiting for the next tick.
pub struct StatusReporter {
    motion: Arc<MotionController>,
    interval: Duration,
}

impl StatusReporter {
    /// Create a reporter; a zero interval is raised to one millisecond
    pub fn new(motion: Arc<MotionController>, interval: Duration) -> Self {
        Self {
            motion,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Polling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Take a snapshot now
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.motion)
    }

    /// Poll until `shutdown` turns true or its sender is dropped
    pub async fn run(
        &self,
        sink: DataCallback<StatusSnapshot>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut events = self.motion.state().events().receiver();
        tracing::debug!("Status reporter started ({:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.emit(&sink),
                event = events.recv() => match event {
                    Ok(event) if reports_immediately(&event) => self.emit(&sink),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!("Status reporter skipped {} events", skipped);
                        self.emit(&sink);
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::debug!("Status reporter stopped");
    }

    fn emit(&self, sink: &DataCallback<StatusSnapshot>) {
        let snapshot = self.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => tracing::trace!("status {}", json),
            Err(e) => tracing::warn!("Failed to encode status: {}", e),
        }
        sink(snapshot);
    }
}
