//! Per-frame morphing between the scattered cloud and the tree.
//!
//! Every group owns a [`TransitionState`] that walks towards the shared
//! [`MorphTarget`] at its own speed. Each call to [`MorphEngine::advance`]
//! steps all groups and rewrites every instance transform in one pass.

use crate::config::MorphTarget;
use crate::geometry;
use crate::math::{approach_factor, ease_in_out_quad, rotate_about_y};
use crate::particle::{Particle, Transform};
use glam::Vec3;
use rand::Rng;
use std::f32::consts::TAU;

/// Progress of one group between scattered (0) and tree (1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    progress: f32,
    target: MorphTarget,
}

impl TransitionState {
    /// Starts fully scattered, heading for `target`
    pub fn new(target: MorphTarget) -> Self {
        TransitionState {
            progress: 0.0,
            target,
        }
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn target(&self) -> MorphTarget {
        self.target
    }

    pub fn eased(&self) -> f32 {
        ease_in_out_quad(self.progress)
    }

    pub fn is_settled(&self) -> bool {
        self.progress == self.target.progress()
    }

    pub fn set_target(&mut self, target: MorphTarget) {
        self.target = target;
    }

    /// Moves progress towards the target by at most `dt * speed`, never past it
    pub fn step(&mut self, dt: f32, speed: f32) {
        let step = dt * speed;
        if step.is_nan() || step <= 0.0 {
            return;
        }
        // Progress spans [0, 1], so one full step always reaches the goal
        let step = step.min(1.0);
        let goal = self.target.progress();
        if self.progress < goal {
            self.progress = (self.progress + step).min(goal);
        } else if self.progress > goal {
            self.progress = (self.progress - step).max(goal);
        }
    }

    pub fn advanced(mut self, dt: f32, speed: f32) -> Self {
        self.step(dt, speed);
        self
    }
}

/// Rotation once a group has fallen into place
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settle {
    /// Eased factor above which rotation locks to the base rotation
    pub threshold: f32,
    pub rates: Vec3,
    pub amplitude: f32,
}

/// Scale pulsing: `bias + amplitude * sin(time * rate + index)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    pub bias: f32,
    pub amplitude: f32,
    pub rate: f32,
}

/// Rigid revolution of the whole group around the vertical axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    /// Raw progress above which the group revolves
    pub after: f32,
    pub speed: f32,
}

/// Vertical drift along the spiral
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flow {
    /// Raw progress above which particles flow
    pub after: f32,
    pub rate: f32,
    pub index_phase: f32,
    pub amplitude: f32,
}

/// Secondary motion tuning for one particle group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupMotion {
    /// Progress gained per second
    pub transition_speed: f32,
    /// Vertical wobble amplitude
    pub wobble: f32,
    /// Angular rates (rad/s) while not settled
    pub spin: Vec3,
    pub settle: Option<Settle>,
    pub pulse: Pulse,
    /// Scale multiplier while the target is the scattered shape
    pub scattered_scale: f32,
    pub orbit: Option<Orbit>,
    pub flow: Option<Flow>,
}

impl GroupMotion {
    pub const ORNAMENTS: GroupMotion = GroupMotion {
        transition_speed: 1.5,
        wobble: 0.1,
        spin: Vec3::new(0.2, 0.1, 0.0),
        settle: None,
        pulse: Pulse {
            bias: 0.8,
            amplitude: 0.2,
            rate: 2.0,
        },
        scattered_scale: 1.0,
        orbit: None,
        flow: None,
    };

    pub const PHOTOS: GroupMotion = GroupMotion {
        transition_speed: 1.5,
        wobble: 0.2,
        spin: Vec3::new(0.5, 0.3, 0.2),
        settle: Some(Settle {
            threshold: 0.8,
            rates: Vec3::new(0.5, 0.3, 0.4),
            amplitude: 0.05,
        }),
        pulse: Pulse {
            bias: 1.0,
            amplitude: 0.0,
            rate: 0.0,
        },
        scattered_scale: 0.8,
        orbit: None,
        flow: None,
    };

    pub const SPIRAL: GroupMotion = GroupMotion {
        transition_speed: 1.0,
        wobble: 0.0,
        spin: Vec3::ZERO,
        settle: None,
        pulse: Pulse {
            bias: 1.0,
            amplitude: 0.5,
            rate: 3.0,
        },
        scattered_scale: 1.0,
        orbit: Some(Orbit {
            after: 0.5,
            speed: 0.2,
        }),
        flow: Some(Flow {
            after: 0.8,
            rate: 0.5,
            index_phase: 0.01,
            amplitude: 0.2,
        }),
    };

    /// Largest vertical offset secondary motion can add once settled
    pub fn max_vertical_offset(&self) -> f32 {
        self.wobble.abs() + self.flow.map_or(0.0, |flow| flow.amplitude.abs())
    }

    /// Resolves one particle's transform for this frame
    pub fn resolve(
        &self,
        particle: &Particle,
        index: usize,
        transition: &TransitionState,
        time: f32,
    ) -> Transform {
        let progress = transition.progress();
        let eased = transition.eased();
        let phase = index as f32;

        let mut position = particle.blend(eased);
        position.y += (time * particle.speed() + phase).sin() * self.wobble;
        if let Some(flow) = self.flow.filter(|flow| progress > flow.after) {
            let offset = (time * flow.rate + phase * flow.index_phase) % TAU;
            position.y += offset.sin() * flow.amplitude;
        }
        if let Some(orbit) = self.orbit.filter(|orbit| progress > orbit.after) {
            position = rotate_about_y(position, time * orbit.speed);
        }

        let base = particle.base_rotation();
        let rotation = match self.settle {
            Some(settle) if eased > settle.threshold => {
                let sway = Vec3::new(
                    (time * settle.rates.x).sin(),
                    (time * settle.rates.y).sin(),
                    (time * settle.rates.z).sin(),
                );
                base + sway * settle.amplitude
            }
            _ => base + self.spin * time,
        };

        let pulse = self.pulse.bias + self.pulse.amplitude * (time * self.pulse.rate + phase).sin();
        let shrink = match transition.target() {
            MorphTarget::Scattered => self.scattered_scale,
            MorphTarget::Tree => 1.0,
        };

        Transform {
            position,
            rotation,
            scale: Vec3::splat(particle.base_scale() * pulse * shrink),
        }
    }
}

/// Per-instance transforms consumed by batched rendering
#[derive(Debug, Clone, Default)]
pub struct InstanceBuffer {
    transforms: Vec<Transform>,
}

impl InstanceBuffer {
    pub fn with_len(len: usize) -> Self {
        InstanceBuffer {
            transforms: vec![Transform::IDENTITY; len],
        }
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Transform> {
        self.transforms.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transform> {
        self.transforms.iter()
    }
}

/// A batch of particles sharing one transition and one motion profile
#[derive(Debug, Clone)]
pub struct ParticleGroup {
    name: &'static str,
    particles: Vec<Particle>,
    motion: GroupMotion,
    transition: TransitionState,
    buffer: InstanceBuffer,
}

impl ParticleGroup {
    pub fn new(
        name: &'static str,
        particles: Vec<Particle>,
        motion: GroupMotion,
        target: MorphTarget,
    ) -> Self {
        log::debug!("created {name} group with {} particles", particles.len());
        let mut group = ParticleGroup {
            name,
            buffer: InstanceBuffer::with_len(particles.len()),
            particles,
            motion,
            transition: TransitionState::new(target),
        };
        group.write_transforms(0.0);
        group
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn motion(&self) -> &GroupMotion {
        &self.motion
    }

    pub fn transition(&self) -> &TransitionState {
        &self.transition
    }

    pub fn transforms(&self) -> &InstanceBuffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn set_target(&mut self, target: MorphTarget) {
        self.transition.set_target(target);
    }

    /// Steps the transition and rewrites every transform for `time`
    pub fn advance(&mut self, dt: f32, time: f32) {
        self.transition.step(dt, self.motion.transition_speed);
        self.write_transforms(time);
    }

    fn write_transforms(&mut self, time: f32) {
        let motion = &self.motion;
        let transition = &self.transition;
        for (index, (slot, particle)) in self
            .buffer
            .transforms
            .iter_mut()
            .zip(&self.particles)
            .enumerate()
        {
            *slot = motion.resolve(particle, index, transition, time);
        }
    }
}

pub const APEX_TRANSITION_SPEED: f32 = 1.5;
/// Lerp factor per frame at 60 fps for the apex star's entrance scale
pub const APEX_SCALE_APPROACH: f32 = 0.05;
pub const APEX_BOB_RATE: f32 = 1.5;
pub const APEX_BOB_AMPLITUDE: f32 = 0.1;
pub const APEX_SPIN_RATE: f32 = 0.5;

/// The star on top of the tree.
///
/// Its position follows the usual progress and easing contract, but its
/// scale approaches the resting scale exponentially so it pops in and out
/// independently of the position blend.
#[derive(Debug, Clone)]
pub struct ApexStar {
    particle: Particle,
    transition: TransitionState,
    scale: f32,
    transform: Transform,
}

impl ApexStar {
    pub fn new(particle: Particle, target: MorphTarget) -> Self {
        let transform = Transform {
            position: particle.scatter_position(),
            scale: Vec3::ZERO,
            ..Transform::IDENTITY
        };
        ApexStar {
            particle,
            transition: TransitionState::new(target),
            scale: 0.0,
            transform,
        }
    }

    pub fn particle(&self) -> &Particle {
        &self.particle
    }

    pub fn transition(&self) -> &TransitionState {
        &self.transition
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Scale the star is currently heading for
    pub fn target_scale(&self) -> f32 {
        match self.transition.target() {
            MorphTarget::Tree => self.particle.base_scale(),
            MorphTarget::Scattered => 0.0,
        }
    }

    /// Whether the star's glow light should be on
    pub fn is_lit(&self) -> bool {
        self.transition.target() == MorphTarget::Tree
    }

    pub fn set_target(&mut self, target: MorphTarget) {
        self.transition.set_target(target);
    }

    pub fn advance(&mut self, dt: f32, time: f32) {
        self.transition.step(dt, APEX_TRANSITION_SPEED);

        let target = self.target_scale();
        self.scale += (target - self.scale) * approach_factor(APEX_SCALE_APPROACH, 60.0, dt);

        let mut position = self.particle.blend(self.transition.eased());
        position.y += (time * APEX_BOB_RATE).sin() * APEX_BOB_AMPLITUDE;
        self.transform = Transform {
            position,
            rotation: Vec3::new(0.0, time * APEX_SPIN_RATE, 0.0),
            scale: Vec3::splat(self.scale),
        };
    }
}

/// Distance the photo plane sits in front of its frame
pub const PHOTO_PLANE_OFFSET: f32 = 0.04;

/// Group sizes used to build a [`MorphEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCounts {
    pub ornaments: usize,
    pub photo_slots: usize,
    pub spiral_stars: usize,
}

impl Default for GroupCounts {
    fn default() -> Self {
        GroupCounts {
            ornaments: 4000,
            photo_slots: 30,
            spiral_stars: 800,
        }
    }
}

/// Owns every particle group and the shared animation clock
#[derive(Debug, Clone)]
pub struct MorphEngine {
    ornaments: ParticleGroup,
    photos: ParticleGroup,
    spiral: ParticleGroup,
    apex: ApexStar,
    target: MorphTarget,
    elapsed: f64,
}

impl MorphEngine {
    /// Builds all groups once; their geometry never changes afterwards
    pub fn new<R: Rng + ?Sized>(rng: &mut R, counts: GroupCounts, target: MorphTarget) -> Self {
        let ornaments = ParticleGroup::new(
            "ornaments",
            geometry::ornament_particles(rng, counts.ornaments),
            GroupMotion::ORNAMENTS,
            target,
        );
        let photos = ParticleGroup::new(
            "photo frames",
            geometry::photo_particles(rng, counts.photo_slots),
            GroupMotion::PHOTOS,
            target,
        );
        let spiral = ParticleGroup::new(
            "spiral stars",
            geometry::spiral_particles(rng, counts.spiral_stars),
            GroupMotion::SPIRAL,
            target,
        );
        let apex = ApexStar::new(geometry::apex_particle(rng), target);

        MorphEngine {
            ornaments,
            photos,
            spiral,
            apex,
            target,
            elapsed: 0.0,
        }
    }

    pub fn target(&self) -> MorphTarget {
        self.target
    }

    /// Seconds of simulated time
    pub fn time(&self) -> f32 {
        self.elapsed as f32
    }

    /// Sets every group's target. Returns false when nothing changed.
    pub fn set_target(&mut self, target: MorphTarget) -> bool {
        if self.target == target {
            return false;
        }
        log::info!("morphing towards {target:?}");
        self.target = target;
        self.ornaments.set_target(target);
        self.photos.set_target(target);
        self.spiral.set_target(target);
        self.apex.set_target(target);
        true
    }

    pub fn toggle(&mut self) -> MorphTarget {
        self.set_target(self.target.toggled());
        self.target
    }

    /// Advances the clock by `dt` seconds and recomputes every transform
    pub fn advance(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += f64::from(dt);
        let time = self.time();
        self.ornaments.advance(dt, time);
        self.photos.advance(dt, time);
        self.spiral.advance(dt, time);
        self.apex.advance(dt, time);
    }

    pub fn ornaments(&self) -> &ParticleGroup {
        &self.ornaments
    }

    pub fn photo_frames(&self) -> &ParticleGroup {
        &self.photos
    }

    pub fn spiral(&self) -> &ParticleGroup {
        &self.spiral
    }

    pub fn apex(&self) -> &ApexStar {
        &self.apex
    }

    /// The instanced groups in draw order
    pub fn groups(&self) -> [&ParticleGroup; 3] {
        [&self.ornaments, &self.photos, &self.spiral]
    }

    /// Transform of the photo plane sitting on frame `slot`
    pub fn photo_plane(&self, slot: usize) -> Option<Transform> {
        self.photos
            .transforms()
            .get(slot)
            .map(|frame| frame.translated_local(Vec3::new(0.0, 0.0, PHOTO_PLANE_OFFSET)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::particle::ParticleKind;
    use pretty_assertions::assert_eq;

    fn particle() -> Particle {
        Particle::new(
            ParticleKind::PhotoSlot,
            Vec3::new(8.0, -3.0, 2.0),
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.1, 0.2, 0.0),
            0.8,
            0.3,
        )
    }

    #[test]
    fn step_stops_exactly_at_target() {
        let state = TransitionState::new(MorphTarget::Tree).advanced(0.5, 1.5);
        assert_eq!(state.progress(), 0.75);
        let state = state.advanced(0.5, 1.5);
        assert_eq!(state.progress(), 1.0);
        assert!(state.is_settled());
    }

    #[test]
    fn step_ignores_bad_time() {
        let mut state = TransitionState::new(MorphTarget::Tree);
        state.step(f32::NAN, 1.0);
        state.step(-1.0, 1.0);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn huge_step_lands_on_target() {
        let mut state = TransitionState::new(MorphTarget::Tree);
        state.step(f32::MAX, 1.5);
        assert_eq!(state.progress(), 1.0);

        state.set_target(MorphTarget::Scattered);
        state.step(f32::INFINITY, 1.0);
        assert_eq!(state.progress(), 0.0);
    }

    #[test]
    fn spiral_flows_only_near_the_end() {
        let motion = GroupMotion::SPIRAL;
        let star = particle();
        let (index, time) = (3, 2.0);

        let almost = TransitionState::new(MorphTarget::Tree).advanced(0.7, 1.0);
        let resolved = motion.resolve(&star, index, &almost, time);
        assert_eq!(resolved.position.y, star.blend(almost.eased()).y);

        let done = TransitionState::new(MorphTarget::Tree).advanced(1.0, 1.0);
        let resolved = motion.resolve(&star, index, &done, time);
        let flow = ((0.5 * time + 0.01 * index as f32) % TAU).sin() * 0.2;
        assert!((resolved.position.y - (star.tree_position().y + flow)).abs() < 1e-5);
    }

    #[test]
    fn photos_tumble_until_settled() {
        let motion = GroupMotion::PHOTOS;
        let transition = TransitionState::new(MorphTarget::Tree);
        let spinning = motion.resolve(&particle(), 0, &transition, 2.0);
        assert!((spinning.rotation - Vec3::new(1.1, 0.8, 0.4)).length() < 1e-5);

        let settled_state = transition.advanced(1.0, 1.0);
        let settled = motion.resolve(&particle(), 0, &settled_state, 2.0);
        assert!((settled.rotation - particle().base_rotation()).abs().max_element() <= 0.05);
    }

    #[test]
    fn photos_shrink_while_scattered() {
        let motion = GroupMotion::PHOTOS;
        let scattered = motion.resolve(
            &particle(),
            0,
            &TransitionState::new(MorphTarget::Scattered),
            0.0,
        );
        assert!((scattered.scale.x - 0.64).abs() < 1e-6);
        let tree = motion.resolve(&particle(), 0, &TransitionState::new(MorphTarget::Tree), 0.0);
        assert!((tree.scale.x - 0.8).abs() < 1e-6);
    }

    #[test]
    fn spiral_orbits_only_past_half_way() {
        let motion = GroupMotion::SPIRAL;
        let star = particle();
        let early = TransitionState::new(MorphTarget::Tree).advanced(0.4, 1.0);
        let resolved = motion.resolve(&star, 0, &early, 5.0);
        let blended = star.blend(early.eased());
        assert_eq!((resolved.position.x, resolved.position.z), (blended.x, blended.z));

        let late = TransitionState::new(MorphTarget::Tree).advanced(1.0, 1.0);
        let resolved = motion.resolve(&star, 0, &late, 5.0);
        let expected = rotate_about_y(star.tree_position(), 5.0 * 0.2);
        assert!((resolved.position.x - expected.x).abs() < 1e-5);
        assert!((resolved.position.z - expected.z).abs() < 1e-5);
    }

    #[test]
    fn toggle_is_idempotent_at_the_boundary() {
        let mut rng = rand::rng();
        let counts = GroupCounts {
            ornaments: 10,
            photo_slots: 3,
            spiral_stars: 5,
        };
        let mut engine = MorphEngine::new(&mut rng, counts, MorphTarget::Tree);
        assert!(!engine.set_target(MorphTarget::Tree));
        assert!(engine.set_target(MorphTarget::Scattered));
        assert_eq!(engine.ornaments().transition().target(), MorphTarget::Scattered);
        assert_eq!(engine.toggle(), MorphTarget::Tree);
    }

    #[test]
    fn photo_plane_sits_in_front_of_its_frame() {
        let mut rng = rand::rng();
        let counts = GroupCounts {
            ornaments: 1,
            photo_slots: 4,
            spiral_stars: 1,
        };
        let mut engine = MorphEngine::new(&mut rng, counts, MorphTarget::Tree);
        engine.advance(0.5);
        for slot in 0..4 {
            let frame = engine.photo_frames().transforms().get(slot).copied().unwrap();
            let plane = engine.photo_plane(slot).unwrap();
            assert!(((plane.position - frame.position).length() - PHOTO_PLANE_OFFSET).abs() < 1e-5);
        }
        assert!(engine.photo_plane(4).is_none());
    }
}
