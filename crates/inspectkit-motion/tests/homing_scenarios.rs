use inspectkit_core::{
    AppEvent, Axis, EventBus, EventCategory, EventFilter, HomingState, MachineEvent, ModuleState,
    MotorId, PartialPosition, StepPosition,
};
use inspectkit_hardware::{SimStage, SimStageConfig};
use inspectkit_motion::{HomingSequence, MotionController};
use inspectkit_settings::Config;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

fn rig(stage: &SimStage) -> (Arc<ModuleState>, HomingSequence) {
    let state = Arc::new(ModuleState::new(Arc::new(EventBus::new())));
    let motion = Arc::new(MotionController::new(
        state.clone(),
        Arc::new(stage.motors()),
        Config::instant().machine,
    ));
    (
        state,
        HomingSequence::new(motion, Arc::new(stage.switches())),
    )
}

#[test]
fn test_stop_during_home_xy_resets_to_idle() {
    let stage = SimStage::new(SimStageConfig::default());
    let (state, homing) = rig(&stage);
    state.set_homed(true);

    let reset_seen = Arc::new(AtomicBool::new(false));
    let seen = reset_seen.clone();
    state.events().subscribe(
        EventFilter::Categories(vec![EventCategory::Machine]),
        move |event| {
            if let AppEvent::Machine(MachineEvent::ResetToIdle) = event {
                seen.store(true, Ordering::SeqCst);
            }
        },
    );

    // the Y switch sits 300 steps away; stop after 25
    let stop_state = state.clone();
    let pulses = Arc::new(AtomicU32::new(0));
    let counter = pulses.clone();
    stage.set_step_hook(Box::new(move |motor| {
        if motor == MotorId::B && counter.fetch_add(1, Ordering::SeqCst) + 1 == 25 {
            stop_state.request_stop();
        }
    }));

    let outcome = homing.home_xy().unwrap();
    assert!(outcome.is_stopped());
    assert!(!state.is_homed());
    assert!(reset_seen.load(Ordering::SeqCst));
    assert_eq!(state.homing_state(), HomingState::Stopped);
    assert_eq!(stage.carriage().y, 275);
}

#[test]
fn test_home_all_clears_a_previous_stop() {
    let stage = SimStage::new(SimStageConfig::default());
    let (state, homing) = rig(&stage);
    state.request_stop();

    assert!(homing.home_all().unwrap().is_completed());
    assert!(!state.stop_requested());
    assert!(state.is_homed());
}

#[test]
fn test_home_xy_does_not_mark_homed() {
    let stage = SimStage::new(SimStageConfig::default());
    let (state, homing) = rig(&stage);

    assert!(homing.home_xy().unwrap().is_completed());
    assert!(!state.is_homed());
    assert_eq!(stage.carriage(), StepPosition::new(0, 0, 200));
    assert_eq!(state.position().get(Axis::X), 0);
}

#[test]
fn test_go_to_after_homing_reaches_target() {
    let stage = SimStage::new(SimStageConfig::default());
    let (_state, homing) = rig(&stage);
    homing.home_all().unwrap();

    let motion = homing.motion();
    let outcome = motion
        .go_to(PartialPosition::xyz(2.0, 1.5, 0.4))
        .unwrap();
    assert!(outcome.is_completed());
    assert_eq!(stage.carriage(), StepPosition::new(160, 120, 160));
    assert_eq!(
        stage.step_edges(MotorId::A),
        stage.step_edges(MotorId::B)
    );
}
