use inspectkit_core::{CommandError, Error, HomingState, ModuleStatus};
use inspectkit_hardware::{SimStage, SimStageConfig};
use inspectkit_sampling::{Command, ModuleController, SampleSpec};
use inspectkit_settings::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn controller(dir: &TempDir) -> (SimStage, ModuleController) {
    let mut config = Config::instant();
    config.storage.buffer_dir = dir.path().to_path_buf();
    let stage = SimStage::new(SimStageConfig::default());
    let controller = ModuleController::new(
        config,
        Arc::new(stage.motors()),
        Arc::new(stage.switches()),
        Arc::new(stage.camera()),
    );
    (stage, controller)
}

struct Hold {
    hold: Arc<AtomicBool>,
    reached: Arc<AtomicBool>,
}

impl Hold {
    fn wait_reached(&self) {
        while !self.reached.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn release(&self) {
        self.hold.store(false, Ordering::SeqCst);
    }
}

// parks the worker inside its first step until released
fn hold_steps(stage: &SimStage) -> Hold {
    let hold = Arc::new(AtomicBool::new(true));
    let reached = Arc::new(AtomicBool::new(false));
    let (flag, seen) = (hold.clone(), reached.clone());
    stage.set_step_hook(Box::new(move |_| {
        seen.store(true, Ordering::SeqCst);
        while flag.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(1));
        }
    }));
    Hold { hold, reached }
}

#[test]
fn test_sampling_through_commands() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);

    controller
        .dispatch_line("load id=S-7 mount=puck layer_mm=0.01 height=19.6 width=2 length=2")
        .unwrap();
    controller
        .dispatch_line("camera exposure=8000 kelvin=6600")
        .unwrap();
    assert_eq!(
        stage.applied_settings().map(|(s, _)| s.exposure_us),
        Some(8000)
    );

    controller.dispatch_line("sample n=3").unwrap();
    controller.wait_idle();

    let pngs = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|x| x == "png"))
        .count();
    assert_eq!(pngs, 3);

    let metadata = std::fs::read_to_string(dir.path().join("S-7_L000_0000.json")).unwrap();
    let record: serde_json::Value = serde_json::from_str(&metadata).unwrap();
    assert_eq!(record["exposure_us"], 8000);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.status, ModuleStatus::Idle);
    assert_eq!(snapshot.current_layer, Some(1));
    assert_eq!(snapshot.image_count, 0);
    assert!(snapshot.homed);
    assert_eq!(snapshot.alarm, None);
}

#[test]
fn test_second_routine_is_refused_while_busy() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);
    let hold = hold_steps(&stage);

    controller.dispatch(Command::Home).unwrap();
    hold.wait_reached();
    assert!(controller.is_busy());
    assert_eq!(controller.running(), Some("home"));
    assert_eq!(controller.state().status(), ModuleStatus::Homing);

    let err = controller.dispatch_line("scan step_x=1 step_y=1").unwrap_err();
    assert!(matches!(
        err,
        Error::Command(CommandError::Busy { ref running }) if running == "home"
    ));
    assert!(controller
        .dispatch_line("load id=A mount=b layer_mm=0.1 height=1 width=1 length=1")
        .is_err());

    // quick commands still go through
    controller.dispatch(Command::ClearAlarm).unwrap();
    controller.dispatch(Command::Stop).unwrap();
    hold.release();
    controller.wait_idle();

    assert!(!controller.is_busy());
    assert!(!controller.state().is_homed());
    assert_eq!(controller.state().homing_state(), HomingState::Stopped);
    assert_eq!(controller.state().status(), ModuleStatus::Idle);
}

#[test]
fn test_home_then_goto() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);

    controller.dispatch(Command::Home).unwrap();
    controller.wait_idle();
    assert!(controller.state().is_homed());
    assert_eq!(stage.carriage().x, 0);

    controller.dispatch_line("goto x=1 y=0.5 z=0.25").unwrap();
    controller.wait_idle();
    let position = controller.snapshot().position;
    assert_eq!((position.x, position.y, position.z), (1.0, 0.5, 0.25));
    assert_eq!(stage.carriage().x, 80);
    assert_eq!(stage.carriage().y, 40);
    assert_eq!(stage.carriage().z, 100);
}

#[test]
fn test_disable_motors_interrupts_and_releases() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);
    let hold = hold_steps(&stage);

    controller.dispatch(Command::Home).unwrap();
    hold.wait_reached();
    let releaser = {
        let flag = hold.hold.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.store(false, Ordering::SeqCst);
        })
    };
    controller.dispatch(Command::DisableMotors).unwrap();
    releaser.join().unwrap();

    assert!(!controller.is_busy());
    assert!(!stage.enabled());
    assert!(!controller.state().motors_enabled());
    assert_eq!(controller.state().homing_state(), HomingState::Disabled);
    assert_eq!(controller.state().status(), ModuleStatus::Disabled);
}

#[test]
fn test_goto_with_motors_off_fails_on_worker() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);

    controller.dispatch_line("goto x=5").unwrap();
    controller.wait_idle();
    assert_eq!(stage.carriage().x, 400);
    assert_eq!(controller.state().status(), ModuleStatus::Disabled);
}

#[test]
fn test_unparseable_line() {
    let dir = TempDir::new().unwrap();
    let (_stage, controller) = controller(&dir);
    let err = controller.dispatch_line("sample n=lots").unwrap_err();
    assert!(matches!(err, Error::Command(CommandError::Parse { .. })));
}

#[test]
fn test_non_finite_and_empty_extents_are_refused() {
    let dir = TempDir::new().unwrap();
    let (_stage, controller) = controller(&dir);

    for line in [
        "load id=S-1 mount=puck layer_mm=0.01 height=19.6 width=nan length=2",
        "load id=S-1 mount=puck layer_mm=0.01 height=19.6 width=0 length=2",
        "load id=../S-1 mount=puck layer_mm=0.01 height=19.6 width=2 length=2",
        "goto x=inf",
    ] {
        let err = controller.dispatch_line(line).unwrap_err();
        assert!(matches!(err, Error::Command(CommandError::Parse { .. })), "{line}");
    }

    let spec = SampleSpec {
        sample_id: "S-1".into(),
        mount_type: "puck".into(),
        mm_per_layer: 0.01,
        initial_height_mm: 19.6,
        width_mm: f64::NAN,
        height_mm: 2.0,
        center: None,
    };
    let err = controller.dispatch(Command::LoadSample(spec)).unwrap_err();
    assert!(matches!(
        err,
        Error::Command(CommandError::InvalidArgument { ref argument, .. }) if argument == "width"
    ));
    assert!(controller.state().sample().is_none());
}

#[test]
fn test_unreachable_goto_fails_without_moving() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);

    controller.dispatch(Command::Home).unwrap();
    controller.wait_idle();
    controller.dispatch_line("goto x=1").unwrap();
    controller.wait_idle();

    controller.dispatch_line("goto x=-1e30").unwrap();
    controller.wait_idle();
    assert_eq!(stage.carriage().x, 80);
    assert_eq!(controller.snapshot().position.x, 1.0);
    assert_eq!(controller.state().status(), ModuleStatus::Idle);
}

#[test]
fn test_panicking_routine_still_returns_to_idle() {
    let dir = TempDir::new().unwrap();
    let (stage, controller) = controller(&dir);
    controller.dispatch(Command::Home).unwrap();
    controller.wait_idle();

    let armed = Arc::new(AtomicBool::new(true));
    let trigger = armed.clone();
    stage.set_step_hook(Box::new(move |_| {
        if trigger.swap(false, Ordering::SeqCst) {
            panic!("driver fault");
        }
    }));

    controller.dispatch_line("goto x=1").unwrap();
    controller.wait_idle();
    assert!(!controller.is_busy());
    assert_eq!(controller.state().status(), ModuleStatus::Idle);
    assert_eq!(
        controller.state().alarm().as_deref(),
        Some("goto aborted unexpectedly")
    );

    // the next routine gets a fresh worker
    stage.clear_step_hook();
    controller.dispatch(Command::Home).unwrap();
    controller.wait_idle();
    assert!(controller.state().is_homed());
    assert_eq!(controller.state().status(), ModuleStatus::Idle);
}
