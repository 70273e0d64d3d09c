use image::{DynamicImage, GrayImage, Luma};
use inspectkit_core::{
    AppEvent, CameraSettings, Error, EventBus, EventCategory, EventFilter, FocusError,
    FocusEvent, HardwareError, ModuleState, Sample, StepPosition, WhiteBalanceGains,
};
use inspectkit_focus::{apply_camera_settings, FocusEngine};
use inspectkit_hardware::{Camera, SimStage, SimStageConfig};
use inspectkit_motion::MotionController;
use inspectkit_settings::Config;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Rig {
    stage: SimStage,
    motion: Arc<MotionController>,
    engine: FocusEngine,
}

// the simulated focal plane sits at z = 160 steps = 0.4 mm
fn rig() -> Rig {
    let stage = SimStage::new(SimStageConfig {
        start: StepPosition::new(0, 0, 0),
        ..Default::default()
    });
    let mut config = Config::instant();
    config.machine.stage_focus_height_mm = 20.0;

    let state = Arc::new(ModuleState::new(Arc::new(EventBus::new())));
    let motion = Arc::new(MotionController::new(
        state,
        Arc::new(stage.motors()),
        config.machine.clone(),
    ));
    motion.enable_motors(true).unwrap();
    let engine = FocusEngine::new(motion.clone(), Arc::new(stage.camera()), config.focus);
    Rig {
        stage,
        motion,
        engine,
    }
}

#[test]
fn test_default_sweep_centres_on_sample_surface() {
    let rig = rig();
    // 20.0 - 19.6 puts the expected surface on the focal plane
    rig.motion
        .state()
        .load_sample(Sample::new("AF-1", "puck", 0.1, 19.6));
    assert!((rig.engine.expected_focus_mm() - 0.4).abs() < 1e-9);

    let best = rig
        .engine
        .auto_focus(None, None, None)
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(best.z_mm, 0.4);
    assert_eq!(rig.stage.carriage().z, 160);
    assert!(best.score > 1.0);
}

#[test]
fn test_explicit_range_and_idempotence() {
    let rig = rig();
    let first = rig
        .engine
        .auto_focus(Some(0.2), Some(0.6), Some(0.05))
        .unwrap()
        .completed()
        .unwrap();
    let second = rig
        .engine
        .auto_focus(Some(0.2), Some(0.6), Some(0.05))
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(first.z_mm, 0.4);
    assert_eq!(first.z_mm, second.z_mm);
    assert!((rig.motion.current_position_mm(inspectkit_core::Axis::Z) - 0.4).abs() < 1e-9);
}

#[test]
fn test_sweep_is_inclusive_of_upper_bound() {
    let rig = rig();
    let scored = Arc::new(AtomicUsize::new(0));
    let counter = scored.clone();
    rig.motion.state().events().subscribe(
        EventFilter::Categories(vec![EventCategory::Focus]),
        move |event| {
            if let AppEvent::Focus(FocusEvent::PointScored { .. }) = event {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
    );

    rig.engine
        .auto_focus(Some(0.1), Some(0.7), Some(0.05))
        .unwrap();
    // 0.10, 0.15, ..., 0.70
    assert_eq!(scored.load(Ordering::SeqCst), 13);
}

#[test]
fn test_invalid_range_is_rejected() {
    let rig = rig();
    let err = rig
        .engine
        .auto_focus(Some(1.0), Some(0.0), Some(0.05))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Focus(FocusError::InvalidRange { .. })
    ));
    assert!(rig
        .engine
        .auto_focus(Some(0.0), Some(1.0), Some(0.0))
        .is_err());
}

#[test]
fn test_stop_aborts_sweep() {
    let rig = rig();
    rig.motion.state().request_stop();
    let outcome = rig.engine.auto_focus(None, None, None).unwrap();
    assert!(outcome.is_stopped());
    assert_eq!(rig.stage.capture_count(), 0);
}

#[test]
fn test_capture_failure_propagates() {
    let rig = rig();
    rig.stage.fail_next_captures(1);
    let err = rig
        .engine
        .auto_focus(Some(0.3), Some(0.5), Some(0.05))
        .unwrap_err();
    assert!(err.is_capture_failure());
}

#[test]
fn test_camera_settings_reach_the_driver() {
    let rig = rig();
    let camera = rig.stage.camera();
    let settings = CameraSettings {
        color_temperature_k: 6600,
        ..Default::default()
    };
    let gains = apply_camera_settings(&camera, &settings).unwrap();
    assert!((gains.red - 1.0).abs() < 1e-9);
    assert_eq!(rig.stage.applied_settings(), Some((settings, gains)));
}

// same frame at every height, so every point of a sweep scores the same
struct FixedCamera;

impl Camera for FixedCamera {
    fn capture_frame(&self) -> Result<DynamicImage, HardwareError> {
        Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| {
            Luma([if (x / 4 + y / 4) % 2 == 0 { 40 } else { 200 }])
        })))
    }

    fn apply_settings(
        &self,
        _settings: &CameraSettings,
        _gains: WhiteBalanceGains,
    ) -> Result<(), HardwareError> {
        Ok(())
    }
}

#[test]
fn test_ties_keep_the_lowest_z() {
    let rig = rig();
    let engine = FocusEngine::new(
        rig.motion.clone(),
        Arc::new(FixedCamera),
        Config::instant().focus,
    );

    let best = engine
        .auto_focus(Some(0.3), Some(0.5), Some(0.05))
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(best.z_mm, 0.3);
    assert_eq!(rig.stage.carriage().z, 120);
}
