//! # InspectKit Sampling
//!
//! Multi-point imaging routines and the operator-facing surface of the
//! instrument:
//! - [`storage`]: image and metadata persistence in the buffer directory
//! - [`orchestrator`]: random sampling and grid scanning
//! - [`commands`]: the closed set of operator commands and their text syntax
//! - [`controller`]: the [`ModuleController`] facade running routines on a worker thread
//! - [`status`]: status snapshots and the periodic reporter

pub mod commands;
pub mod controller;
pub mod orchestrator;
pub mod status;
pub mod storage;

pub use commands::{CameraUpdate, Command, SampleSpec};
pub use controller::ModuleController;
pub use orchestrator::{
    scan_axis_positions, CapturedImage, SamplingOrchestrator, SamplingReport, NO_BOUNDING_BOX,
    SAMPLE_NOT_DETECTED,
};
pub use status::{StatusReporter, StatusSnapshot};
pub use storage::CaptureStore;
