use cadence_animation_core::{
    Engine, EngineError, LinearInit, LinearProcessor, Motivator, Processor, ProcessorType,
    ScalarProcessor, SplineInit, SplineProcessor, SplinePlayback, Target1f,
};
use cadence_test_fixtures::ramp_spline;

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

/// Engine with the standard processors plus one linear motivator.
fn engine_with_linear(start: f32, target: f32, time: i32) -> (Engine, Motivator) {
    let mut engine = Engine::with_standard_processors();
    let m = engine
        .initialize_motivator(&LinearInit::new(start, target, time), 1)
        .expect("linear is registered");
    (engine, m)
}

/// it should advance a linear motivator halfway in half the time
#[test]
fn basic_scalar_travel() {
    let (mut engine, m) = engine_with_linear(0.0, 10.0, 10);
    for _ in 0..5 {
        engine.advance_frame(1);
    }
    let p = engine.scalars(LinearProcessor::TYPE).unwrap();
    let i = p.index_for(&m).unwrap();
    approx(p.value(i), 5.0, 1e-4);
    assert_eq!(p.target_time(i, 1), 5);
}

/// it should fail with UnknownProcessorType on an empty registry and leave
/// the handle reset
#[test]
fn unknown_type_tag_is_reported() {
    let mut engine = Engine::new();
    let err = engine
        .initialize_motivator(&LinearInit::at_rest(0.0), 1)
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::UnknownProcessorType {
            type_tag: LinearProcessor::TYPE
        }
    );
    assert_eq!(engine.num_processors(), 0);
}

/// it should register idempotently: the first factory for a tag wins
#[test]
fn registration_is_idempotent() {
    let mut engine = Engine::with_standard_processors();
    engine.register_processor_type(LinearProcessor::TYPE, || {
        panic!("second registration must not be used")
    });
    let m = engine
        .initialize_motivator(&LinearInit::at_rest(1.0), 1)
        .unwrap();
    assert!(engine.valid_motivator(&m));
}

/// it should preserve values and rebind handles across defragmentation
#[test]
fn defragmentation_preserves_values() {
    let mut engine = Engine::with_standard_processors();
    let mut handles = Vec::new();
    for k in 0..3 {
        let base = (k * 3) as f32;
        let m = engine
            .initialize_motivator(&LinearInit::at_rest(base), 3)
            .unwrap();
        let p = engine.scalars_mut(LinearProcessor::TYPE).unwrap();
        let i = p.index_for(&m).unwrap();
        p.set_targets(
            i,
            3,
            &[
                Target1f::to_value(base + 1.0, 0),
                Target1f::to_value(base + 2.0, 0),
                Target1f::to_value(base + 3.0, 0),
            ],
        );
        handles.push(m);
    }
    let mut h2 = handles[1];
    engine.remove_motivator(&mut h2);
    assert!(!h2.is_bound());

    // Defragmentation runs at the head of the processor's next advance.
    engine.advance_frame(0);
    engine.verify_internal_state();

    let p = engine.scalars(LinearProcessor::TYPE).unwrap();
    // The highest run moved into the freed hole at base 3.
    let i3 = p.index_for(&handles[2]).expect("H3 still bound");
    assert_eq!(i3, 3);
    assert_eq!(p.values(i3), &[7.0, 8.0, 9.0]);
    assert_eq!(p.dimensions(i3), 3);
    // H1 untouched.
    let i1 = p.index_for(&handles[0]).unwrap();
    assert_eq!(i1, 0);
    assert_eq!(p.values(i1), &[1.0, 2.0, 3.0]);
}

/// it should reset the old handle on transfer and keep per-slot state
#[test]
fn transfer_retargets_ownership() {
    let (mut engine, h1) = engine_with_linear(4.0, 4.0, 0);
    let p = engine.scalars_mut(LinearProcessor::TYPE).unwrap();
    let base = p.index_for(&h1).unwrap();

    let mut h2 = Motivator::default();
    p.transfer_motivator(base, &mut h2);
    assert!(p.valid_motivator(base, &h2));
    assert!(!p.valid_motivator(base, &h1));
    assert_eq!(p.index_for(&h1), None);
    approx(p.value(base), 4.0, 0.0);

    // Transfer back: h1 owns the run again, state still unchanged.
    let mut h1b = Motivator::default();
    p.transfer_motivator(base, &mut h1b);
    assert!(p.valid_motivator(base, &h1b));
    assert!(!p.valid_motivator(base, &h2));
    approx(p.value(base), 4.0, 0.0);
    p.verify_internal_state();
}

/// it should leave the engine indistinguishable after initialize + remove
#[test]
fn initialize_then_remove_round_trip() {
    let mut engine = Engine::with_standard_processors();
    let mut m = engine
        .initialize_motivator(&LinearInit::new(0.0, 1.0, 5), 2)
        .unwrap();
    assert!(engine.valid_motivator(&m));
    assert_eq!(engine.dimensions(&m), 2);

    engine.remove_motivator(&mut m);
    assert!(!m.is_bound());
    assert!(!engine.valid_motivator(&m));
    assert_eq!(engine.dimensions(&m), 0);

    // After the deferred compaction, the pool is empty again.
    engine.advance_frame(0);
    engine.verify_internal_state();
    let p = engine
        .processor(LinearProcessor::TYPE)
        .expect("processor instance persists");
    assert_eq!(p.dimensions(0), 0);
}

/// it should keep every live handle valid with its init-time width across
/// arbitrary churn
#[test]
fn churn_keeps_handles_valid() {
    let mut engine = Engine::with_standard_processors();
    let mut live: Vec<(Motivator, usize)> = Vec::new();
    for round in 0..6 {
        for width in [1usize, 3, 4] {
            let m = engine
                .initialize_motivator(&LinearInit::at_rest(round as f32), width)
                .unwrap();
            live.push((m, width));
        }
        // Remove every third handle.
        let mut k = 0;
        live.retain_mut(|(m, _)| {
            k += 1;
            if k % 3 == 0 {
                engine.remove_motivator(m);
                false
            } else {
                true
            }
        });
        engine.advance_frame(1);
        engine.verify_internal_state();
        for (m, width) in &live {
            assert!(engine.valid_motivator(m), "handle died in round {round}");
            assert_eq!(engine.dimensions(m), *width);
        }
    }
}

/// it should not change outputs on a zero-delta advance
#[test]
fn zero_delta_is_idempotent() {
    let (mut engine, m) = engine_with_linear(0.0, 10.0, 10);
    engine.advance_frame(3);
    let p = engine.scalars(LinearProcessor::TYPE).unwrap();
    let i = p.index_for(&m).unwrap();
    let before = p.value(i);
    engine.advance_frame(0);
    let p = engine.scalars(LinearProcessor::TYPE).unwrap();
    approx(p.value(i), before, 0.0);
}

/// it should ignore unsupported drivers without failing (probe pattern)
#[test]
fn unsupported_driver_is_noop() {
    let mut engine = Engine::with_standard_processors();
    let m = engine.initialize_motivator(&SplineInit, 1).unwrap();
    let p = engine.scalars_mut(SplineProcessor::TYPE).unwrap();
    let i = p.index_for(&m).unwrap();
    p.set_splines(i, 1, &[ramp_spline(10.0, 10.0)], &SplinePlayback::default());

    // Probing the waypoint driver on a spline-only algorithm: no panic, no
    // state change; readers keep reporting the spline path.
    p.set_targets(i, 1, &[Target1f::to_value(99.0, 5)]);
    approx(p.value(i), 0.0, 5e-2);
    approx(p.target_value(i), 10.0, 5e-2);
    assert_eq!(p.target_time(i, 1), 10);

    // And the curve-shape driver, also not implemented by this algorithm.
    p.set_target_with_shape(i, 1, &[42.0], &[0.0], &Default::default());
    approx(p.target_value(i), 10.0, 5e-2);
}

/// it should expose convenience single-value readers consistent with bulk
#[test]
fn convenience_readers_match_bulk() {
    let (mut engine, m) = engine_with_linear(0.0, 8.0, 8);
    engine.advance_frame(2);
    let p = engine.scalars(LinearProcessor::TYPE).unwrap();
    let i = p.index_for(&m).unwrap();
    let mut v = [0.0];
    p.velocities(i, 1, &mut v);
    approx(p.velocity(i), v[0], 0.0);
    let mut d = [0.0];
    p.differences(i, 1, &mut d);
    approx(p.difference(i), d[0], 0.0);
    approx(p.direction(i), p.velocity(i), 0.0);
    approx(p.target_velocity(i), 0.0, 0.0);
}

/// it should report a mismatched init payload without binding a handle
#[test]
fn init_payload_mismatch() {
    let mut p = SplineProcessor::default();
    let err = p
        .initialize_motivator(&LinearInit::at_rest(0.0), 1)
        .unwrap_err();
    assert!(matches!(err, EngineError::InitTypeMismatch { .. }));
    assert_eq!(p.dimensions(0), 0);
}

/// it should format type tags into engine errors
#[test]
fn error_display_names_tag() {
    let err = EngineError::UnknownProcessorType {
        type_tag: ProcessorType("gravity"),
    };
    assert_eq!(
        err.to_string(),
        "no processor registered for type tag `gravity`"
    );
}
