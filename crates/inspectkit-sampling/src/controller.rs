//! Module controller
//!
//! Owns the instrument state and every subsystem, and turns operator
//! [`Command`]s into calls on them. Quick commands run on the caller's
//! thread; homing, moves, focus and the imaging routines run on a single
//! named worker thread, and a second one is refused while the first is
//! still going. `Stop` never waits for the worker: it only raises the
//! stop signal, which every routine checks between steps.

use inspectkit_core::{
    CommandError, EventBus, ModuleState, ModuleStatus, Point2, Result,
};
use inspectkit_focus::{apply_camera_settings, FocusEngine};
use inspectkit_hardware::{Camera, LimitSwitches, MotorDriver};
use inspectkit_motion::{HomingSequence, MotionController};
use inspectkit_settings::Config;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::commands::Command;
use crate::orchestrator::SamplingOrchestrator;
use crate::status::{StatusReporter, StatusSnapshot};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Returns the module to idle (or disabled) when a routine ends, including by panic
struct SettleStatus {
    name: &'static str,
    state: Arc<ModuleState>,
}

impl Drop for SettleStatus {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("{} panicked", self.name);
            self.state.raise_alarm(format!("{} aborted unexpectedly", self.name));
        }
        self.state.set_status(if self.state.motors_enabled() {
            ModuleStatus::Idle
        } else {
            ModuleStatus::Disabled
        });
    }
}

/// Facade over the instrument
pub struct ModuleController {
    state: Arc<ModuleState>,
    motion: Arc<MotionController>,
    homing: Arc<HomingSequence>,
    focus: Arc<FocusEngine>,
    orchestrator: Arc<SamplingOrchestrator>,
    camera: Arc<dyn Camera>,
    config: Config,
    worker: Mutex<Option<Worker>>,
}

impl ModuleController {
    /// Wire the subsystems over the given hardware
    pub fn new(
        config: Config,
        motors: Arc<dyn MotorDriver>,
        switches: Arc<dyn LimitSwitches>,
        camera: Arc<dyn Camera>,
    ) -> Self {
        let state = Arc::new(ModuleState::new(Arc::new(EventBus::new())));
        let motion = Arc::new(MotionController::new(
            state.clone(),
            motors,
            config.machine.clone(),
        ));
        let homing = Arc::new(HomingSequence::new(motion.clone(), switches));
        let focus = Arc::new(FocusEngine::new(
            motion.clone(),
            camera.clone(),
            config.focus.clone(),
        ));
        let orchestrator = Arc::new(SamplingOrchestrator::new(
            homing.clone(),
            focus.clone(),
            camera.clone(),
            &config,
        ));

        Self {
            state,
            motion,
            homing,
            focus,
            orchestrator,
            camera,
            config,
            worker: Mutex::new(None),
        }
    }

    /// Shared instrument state
    pub fn state(&self) -> &Arc<ModuleState> {
        &self.state
    }

    /// Event bus of the instrument
    pub fn events(&self) -> &Arc<EventBus> {
        self.state.events()
    }

    /// Motion controller
    pub fn motion(&self) -> &Arc<MotionController> {
        &self.motion
    }

    /// Sampling orchestrator
    pub fn orchestrator(&self) -> &Arc<SamplingOrchestrator> {
        &self.orchestrator
    }

    /// Configuration the controller was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Status snapshot
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::capture(&self.motion)
    }

    /// Status reporter polling at the configured interval
    pub fn status_reporter(&self) -> StatusReporter {
        StatusReporter::new(self.motion.clone(), self.config.status.poll_interval())
    }

    /// Name of the routine on the worker, if one is running
    pub fn running(&self) -> Option<&'static str> {
        self.worker
            .lock()
            .as_ref()
            .filter(|w| !w.handle.is_finished())
            .map(|w| w.name)
    }

    /// Whether a routine is running on the worker
    pub fn is_busy(&self) -> bool {
        self.running().is_some()
    }

    /// Block until the worker, if any, has finished
    pub fn wait_idle(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if worker.handle.join().is_err() {
                tracing::error!("Worker running {} panicked", worker.name);
            }
        }
    }

    /// Parse and dispatch one line of operator input
    pub fn dispatch_line(&self, line: &str) -> Result<()> {
        let command: Command = line.parse()?;
        self.dispatch(command)
    }

    /// Execute a command
    ///
    /// Long-running commands return as soon as the worker has started;
    /// their own failures are logged and left in the alarm where the
    /// routine raised one.
    pub fn dispatch(&self, command: Command) -> Result<()> {
        tracing::debug!("Dispatching {:?}", command);
        match command {
            Command::Stop => {
                tracing::info!("Stop requested");
                self.state.request_stop();
                Ok(())
            }
            Command::ClearAlarm => {
                self.state.clear_alarm();
                Ok(())
            }
            Command::DisableMotors => {
                if self.is_busy() {
                    self.state.request_stop();
                    self.wait_idle();
                }
                self.homing.disable_motors()?;
                self.state.set_status(ModuleStatus::Disabled);
                Ok(())
            }
            Command::LoadSample(spec) => {
                spec.validate()?;
                self.ensure_idle()?;
                let fallback = Point2::new(
                    self.config.machine.stage_center_x_mm,
                    self.config.machine.stage_center_y_mm,
                );
                let sample = spec.build(fallback);
                tracing::info!(
                    "Loaded sample {} ({}, {:.3} mm/layer)",
                    sample.sample_id,
                    sample.mount_type,
                    sample.mm_per_layer
                );
                self.state.load_sample(sample);
                Ok(())
            }
            Command::UpdateCameraSettings(update) => {
                let settings = update.apply_to(self.orchestrator.camera_settings());
                apply_camera_settings(self.camera.as_ref(), &settings)?;
                self.orchestrator.set_camera_settings(settings);
                Ok(())
            }
            Command::Home => {
                let homing = self.homing.clone();
                self.spawn("home", ModuleStatus::Homing, move || {
                    homing.home_all().map(drop).map_err(Into::into)
                })
            }
            Command::GoTo(target) => {
                let motion = self.motion.clone();
                self.spawn("goto", ModuleStatus::Moving, move || {
                    motion.go_to(target).map(drop).map_err(Into::into)
                })
            }
            Command::Focus { z_min, z_max, step } => {
                let focus = self.focus.clone();
                self.spawn("focus", ModuleStatus::Focusing, move || {
                    focus.auto_focus(z_min, z_max, step).map(drop)
                })
            }
            Command::StartSampling { count, save_images } => {
                let orchestrator = self.orchestrator.clone();
                self.spawn("sample", ModuleStatus::Sampling, move || {
                    orchestrator.random_sampling(count, save_images).map(drop)
                })
            }
            Command::StartScanning {
                step_x,
                step_y,
                save_images,
            } => {
                let orchestrator = self.orchestrator.clone();
                self.spawn("scan", ModuleStatus::Scanning, move || {
                    orchestrator
                        .scanning_images(step_x, step_y, save_images)
                        .map(drop)
                })
            }
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.running() {
            Some(running) => Err(CommandError::Busy {
                running: running.to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    fn spawn(
        &self,
        name: &'static str,
        status: ModuleStatus,
        job: impl FnOnce() -> Result<()> + Send + 'static,
    ) -> Result<()> {
        let mut worker = self.worker.lock();
        if let Some(current) = worker.as_ref() {
            if !current.handle.is_finished() {
                return Err(CommandError::Busy {
                    running: current.name.to_string(),
                }
                .into());
            }
        }
        if let Some(finished) = worker.take() {
            finished.handle.join().ok();
        }

        let job: Job = Box::new(job);
        let state = self.state.clone();
        state.set_status(status);
        let handle = std::thread::Builder::new()
            .name(format!("inspectkit-{}", name))
            .spawn(move || {
                let _settle = SettleStatus { name, state };
                tracing::info!("Starting {}", name);
                match job() {
                    Ok(()) => tracing::info!("{} finished", name),
                    Err(e) => tracing::error!("{} failed: {}", name, e),
                }
            })
            .map_err(|e| {
                self.state.set_status(ModuleStatus::Idle);
                CommandError::WorkerUnavailable {
                    reason: e.to_string(),
                }
            })?;

        *worker = Some(Worker { name, handle });
        Ok(())
    }
}

impl std::fmt::Debug for ModuleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleController")
            .field("running", &self.running())
            .field("status", &self.state.status())
            .finish()
    }
}

impl Drop for ModuleController {
    fn drop(&mut self) {
        if self.is_busy() {
            self.state.request_stop();
        }
        self.wait_idle();
    }
}
