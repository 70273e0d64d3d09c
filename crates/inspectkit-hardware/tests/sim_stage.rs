use inspectkit_core::{CameraSettings, CoreXyConvention, MotorId, StepPosition, WhiteBalanceGains};
use inspectkit_hardware::{Camera, MotorDriver, SimStage, SimStageConfig};
use std::time::Duration;

fn pulse_pair(motors: &dyn MotorDriver, a_forward: bool, b_forward: bool, steps: u32) {
    motors.set_direction(MotorId::A, a_forward).unwrap();
    motors.set_direction(MotorId::B, b_forward).unwrap();
    for _ in 0..steps {
        motors.pulse_step(MotorId::A, Duration::ZERO).unwrap();
        motors.pulse_step(MotorId::B, Duration::ZERO).unwrap();
    }
}

#[test]
fn test_same_direction_moves_x_opposite_moves_y() {
    let stage = SimStage::new(SimStageConfig {
        start: StepPosition::new(0, 0, 0),
        ..Default::default()
    });
    let motors = stage.motors();
    motors.set_enabled(true).unwrap();

    pulse_pair(&motors, true, true, 10);
    assert_eq!(stage.carriage(), StepPosition::new(10, 0, 0));

    pulse_pair(&motors, true, false, 4);
    assert_eq!(stage.carriage(), StepPosition::new(10, 4, 0));
}

#[test]
fn test_mirrored_belts_flip_y() {
    let stage = SimStage::new(SimStageConfig {
        convention: CoreXyConvention::Mirrored,
        start: StepPosition::new(0, 0, 0),
        ..Default::default()
    });
    let motors = stage.motors();
    motors.set_enabled(true).unwrap();

    pulse_pair(&motors, true, false, 4);
    assert_eq!(stage.carriage(), StepPosition::new(0, -4, 0));
}

#[test]
fn test_frames_blur_away_from_focus() {
    let stage = SimStage::new(SimStageConfig {
        start: StepPosition::new(0, 0, 160),
        ..Default::default()
    });
    let camera = stage.camera();

    let sharp = camera.capture_frame().unwrap().to_luma8();
    let motors = stage.motors();
    motors.set_enabled(true).unwrap();
    motors.set_direction(MotorId::Z, true).unwrap();
    for _ in 0..40 {
        motors.pulse_step(MotorId::Z, Duration::ZERO).unwrap();
    }
    let soft = camera.capture_frame().unwrap().to_luma8();

    // adjacent checker cells at the first cell boundary
    let contrast = |img: &image::GrayImage| {
        (img.get_pixel(7, 4)[0] as i32 - img.get_pixel(8, 4)[0] as i32).abs()
    };
    assert!(contrast(&sharp) > contrast(&soft));
}

#[test]
fn test_settings_are_recorded() {
    let stage = SimStage::new(SimStageConfig::default());
    let settings = CameraSettings {
        exposure_us: 2500,
        ..Default::default()
    };
    let gains = WhiteBalanceGains {
        red: 1.2,
        blue: 0.8,
    };
    stage.camera().apply_settings(&settings, gains).unwrap();
    assert_eq!(stage.applied_settings(), Some((settings, gains)));
}
