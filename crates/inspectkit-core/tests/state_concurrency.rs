use inspectkit_core::units::{mm_to_microns, mm_to_steps, microns_to_mm, steps_to_mm};
use inspectkit_core::{Axis, EventBus, ModuleState, Sample};
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

#[test]
fn test_concurrent_readers_see_consistent_counters() {
    let state = Arc::new(ModuleState::new(Arc::new(EventBus::new())));
    state.begin_run(500);

    let writer = {
        let state = state.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                state.increment_image_count();
                state.offset_position(Axis::X, 1);
            }
        })
    };

    let reader = {
        let state = state.clone();
        thread::spawn(move || {
            for _ in 0..500 {
                let counters = state.counters();
                assert_eq!(counters.total_images, 500);
                assert!(counters.image_count <= 500);
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();

    assert_eq!(state.counters().image_count, 500);
    assert_eq!(state.position().x, 500);
}

#[test]
fn test_stop_is_visible_across_threads() {
    let state = Arc::new(ModuleState::new(Arc::new(EventBus::new())));
    state.set_homed(true);
    let signal = state.stop_signal().clone();

    thread::spawn(move || signal.request()).join().unwrap();

    assert!(state.stop_requested());
    // request() on a cloned token does not touch homed; request_stop() does
    assert!(state.is_homed());
    state.request_stop();
    assert!(!state.is_homed());
}

#[test]
fn test_layer_progression_lowers_surface() {
    let state = ModuleState::new(Arc::new(EventBus::new()));
    state.load_sample(Sample::new("S-7", "resin", 0.25, 3.0));
    for _ in 0..4 {
        state.with_sample(|s| s.complete_layer());
    }
    let sample = state.sample().unwrap();
    assert_eq!(sample.current_layer, 4);
    assert!((sample.current_height_mm() - 2.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn prop_steps_survive_mm_round_trip(steps in -1_000_000i64..1_000_000) {
        let mm = steps_to_mm(steps, 0.0125);
        prop_assert_eq!(mm_to_steps(mm, 0.0125), steps);
    }

    #[test]
    fn prop_microns_survive_mm_round_trip(microns in -100_000i64..100_000) {
        prop_assert_eq!(mm_to_microns(microns_to_mm(microns)), microns);
    }
}
