use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tree3d::morph::{GroupCounts, GroupMotion, MorphEngine, TransitionState};
use tree3d::MorphTarget;

const FRAME: f32 = 1.0 / 60.0;

fn engine(seed: u64, counts: GroupCounts, target: MorphTarget) -> MorphEngine {
    let mut rng = StdRng::seed_from_u64(seed);
    MorphEngine::new(&mut rng, counts, target)
}

fn small() -> GroupCounts {
    GroupCounts {
        ornaments: 64,
        photo_slots: 6,
        spiral_stars: 32,
    }
}

proptest! {
    #[test]
    fn progress_stays_in_unit_interval(
        steps in prop::collection::vec((0.0f32..0.5, any::<bool>()), 1..120)
    ) {
        let mut engine = engine(7, small(), MorphTarget::Tree);
        for (dt, toggle) in steps {
            if toggle {
                engine.toggle();
            }
            engine.advance(dt);
            for group in engine.groups() {
                let progress = group.transition().progress();
                prop_assert!((0.0..=1.0).contains(&progress), "{} at {progress}", group.name());
            }
            let apex = engine.apex().transition().progress();
            prop_assert!((0.0..=1.0).contains(&apex));
        }
    }

    #[test]
    fn progress_never_decreases_towards_tree(
        dts in prop::collection::vec(0.0f32..0.2, 1..200)
    ) {
        let mut state = TransitionState::new(MorphTarget::Tree);
        let mut last = state.progress();
        for dt in dts {
            state.step(dt, GroupMotion::ORNAMENTS.transition_speed);
            prop_assert!(state.progress() >= last);
            prop_assert!(state.progress() <= 1.0);
            last = state.progress();
        }
    }

    #[test]
    fn rapid_toggling_keeps_transforms_finite(
        toggles in prop::collection::vec(any::<bool>(), 1..200),
        dt in prop_oneof![
            Just(0.0f32),
            0.0f32..0.1,
            Just(f32::NAN),
            Just(f32::INFINITY),
            Just(-1.0f32),
        ]
    ) {
        let mut engine = engine(11, small(), MorphTarget::Scattered);
        for toggle in toggles {
            if toggle {
                engine.toggle();
            }
            engine.advance(dt);
            engine.advance(FRAME);
        }
        for group in engine.groups() {
            prop_assert!(group.transforms().iter().all(|t| t.is_finite()), "{}", group.name());
        }
        prop_assert!(engine.apex().transform().is_finite());
    }
}

#[test]
fn progress_holds_at_one() {
    let mut state = TransitionState::new(MorphTarget::Tree);
    for _ in 0..200 {
        state.step(FRAME, 1.5);
    }
    assert_eq!(state.progress(), 1.0);
    state.step(FRAME, 1.5);
    assert_eq!(state.progress(), 1.0);
    assert!(state.is_settled());
}

#[test]
fn assembled_tree_has_no_scatter_residue() {
    let mut engine = engine(2024, GroupCounts::default(), MorphTarget::Scattered);
    assert!(engine.set_target(MorphTarget::Tree));

    // Two seconds is well past the 1 / 1.5 s ornament transition
    for _ in 0..120 {
        engine.advance(FRAME);
    }

    let group = engine.ornaments();
    assert_eq!(group.len(), 4000);
    assert_eq!(group.transition().progress(), 1.0);
    assert_eq!(group.transition().eased(), 1.0);

    let bound = group.motion().max_vertical_offset() + 1e-4;
    for (particle, transform) in group.particles().iter().zip(group.transforms().iter()) {
        let tree = particle.tree_position();
        let delta = transform.position - tree;
        assert!(delta.x.abs() < 1e-4 && delta.z.abs() < 1e-4, "{delta:?}");
        assert!(delta.y.abs() <= bound, "{delta:?}");
    }
}

#[test]
fn apex_scale_approaches_without_overshoot() {
    let mut engine = engine(5, small(), MorphTarget::Tree);
    let target = engine.apex().target_scale();
    assert_eq!(target, 0.5);
    assert_eq!(engine.apex().scale(), 0.0);

    let mut last = engine.apex().scale();
    for _ in 0..150 {
        engine.advance(FRAME);
        let scale = engine.apex().scale();
        assert!(scale > last, "{scale} <= {last}");
        assert!(scale < target);
        last = scale;
    }
    assert!(target - last < 0.01);
}

#[test]
fn same_seed_same_geometry() {
    let a = engine(99, small(), MorphTarget::Tree);
    let b = engine(99, small(), MorphTarget::Tree);
    for (ga, gb) in a.groups().iter().zip(b.groups().iter()) {
        for (pa, pb) in ga.particles().iter().zip(gb.particles()) {
            assert_eq!(pa.tree_position(), pb.tree_position());
            assert_eq!(pa.scatter_position(), pb.scatter_position());
        }
    }
}

#[test]
fn geometry_survives_toggles() {
    let mut engine = engine(3, small(), MorphTarget::Tree);
    let before: Vec<_> = engine
        .ornaments()
        .particles()
        .iter()
        .map(|p| p.tree_position())
        .collect();
    for _ in 0..10 {
        engine.toggle();
        engine.advance(0.1);
    }
    let after: Vec<_> = engine
        .ornaments()
        .particles()
        .iter()
        .map(|p| p.tree_position())
        .collect();
    assert_eq!(before, after);
}
