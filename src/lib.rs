//! # InspectKit
//!
//! Motion, focus and sampling control for an automated optical inspection
//! and polishing instrument.
//!
//! ## Architecture
//!
//! InspectKit is organized as a workspace with multiple crates:
//!
//! 1. **inspectkit-core** - Core types, shared state, events, error taxonomy
//! 2. **inspectkit-hardware** - Motor, limit switch and camera traits plus a simulated stage
//! 3. **inspectkit-settings** - Configuration files and defaults
//! 4. **inspectkit-motion** - CoreXY kinematics, moves and homing
//! 5. **inspectkit-focus** - Sharpness metric, autofocus and white balance
//! 6. **inspectkit-sampling** - Random sampling, grid scanning, commands and status
//! 7. **inspectkit** - Main binary that integrates all crates

pub use inspectkit_core::{
    Axis, BoundingBox, CameraSettings, CoreXyConvention, Error, HomingState, ImageMetadata,
    ModuleState, ModuleStatus, Outcome, PartialPosition, Point2, Position, Result, Sample,
};
pub use inspectkit_focus::{FocusEngine, FocusSample};
pub use inspectkit_hardware::{Camera, LimitSwitches, MotorDriver, SimStage, SimStageConfig};
pub use inspectkit_motion::{HomingSequence, MotionController};
pub use inspectkit_sampling::{
    Command, ModuleController, SamplingOrchestrator, SamplingReport, StatusReporter,
    StatusSnapshot,
};
pub use inspectkit_settings::{Config, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Initialize logging
///
/// Logs go to stderr so stdout stays free for command replies. The
/// `RUST_LOG` environment variable refines the default `info` level.
pub fn init_logging(format: LogFormat) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    match format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(base.pretty())
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(env_filter)
            .with(base.json())
            .try_init()?,
    }

    Ok(())
}
