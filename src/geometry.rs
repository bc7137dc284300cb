//! Procedural placement of every particle group.
//!
//! All generators are called exactly once per particle when a group is
//! built. The results are cached by the group for the whole session.

use crate::color::{Rgb, GOLD, ORNAMENT_PALETTE};
use crate::particle::{Particle, ParticleKind};
use glam::{Vec2, Vec3};
use rand::Rng;
use std::f32::consts::{PI, TAU};

/// Angle increment of the ornament spiral, close to the golden angle
pub const GOLDEN_ANGLE: f32 = 2.39996;
/// Angle increment of the photo spiral, deliberately out of step with the ornaments
pub const SURFACE_ANGLE: f32 = 5.5;

pub const TREE_HEIGHT: f32 = 12.0;
pub const TREE_RADIUS: f32 = 4.5;
pub const ORNAMENT_SCATTER_RADIUS: f32 = 15.0;
pub const GOLD_CHANCE: f32 = 0.2;
pub const GOLD_SCALE_BOOST: f32 = 1.5;
pub const GOLD_GLOW: f32 = 2.5;

pub const PHOTO_RADIUS: f32 = 4.2;
pub const PHOTO_SCATTER_RADIUS: f32 = 18.0;

pub const SPIRAL_HEIGHT: f32 = 13.0;
pub const SPIRAL_RADIUS: f32 = 5.0;
pub const SPIRAL_LOOPS: f32 = 6.0;
pub const SPIRAL_OFFSET: f32 = 1.5;
pub const SPIRAL_JITTER: f32 = 0.5;
pub const SPIRAL_SCATTER_RADIUS: f32 = 20.0;

/// Resting height of the apex star centre
pub const APEX_HEIGHT: f32 = 5.8 + 1.5;
pub const APEX_SCATTER_RADIUS: f32 = 2.0;
pub const STAR_POINTS: usize = 5;
pub const STAR_OUTER_RADIUS: f32 = 1.8;
pub const STAR_INNER_RADIUS: f32 = 0.8;

/// Uniform random point inside a sphere.
///
/// The cube root on the radial draw keeps the density uniform instead of
/// clustering at the centre.
pub fn scatter_point<R: Rng + ?Sized>(rng: &mut R, radius: f32) -> Vec3 {
    let u: f32 = rng.random();
    let v: f32 = rng.random();
    let theta = TAU * u;
    let phi = (2.0 * v - 1.0).clamp(-1.0, 1.0).acos();
    let r = rng.random::<f32>().cbrt() * radius;
    let sin_phi = phi.sin();
    Vec3::new(
        r * sin_phi * theta.cos(),
        r * sin_phi * theta.sin(),
        r * phi.cos(),
    )
}

/// Height and cone radius for slot `index` of `total`
fn cone_level(height: f32, max_radius: f32, index: usize, total: usize) -> (f32, f32) {
    let y_ratio = index as f32 / total as f32;
    ((y_ratio - 0.5) * height, (1.0 - y_ratio) * max_radius)
}

/// Point inside the tree cone on a golden-angle spiral.
///
/// The radial jitter is square-root scaled so the cone fills as a volume.
pub fn tree_volume_point<R: Rng + ?Sized>(
    rng: &mut R,
    height: f32,
    max_radius: f32,
    index: usize,
    total: usize,
) -> Vec3 {
    let (y, radius) = cone_level(height, max_radius, index, total);
    let angle = index as f32 * GOLDEN_ANGLE;
    let r = rng.random::<f32>().sqrt() * radius;
    Vec3::new(angle.cos() * r, y, angle.sin() * r)
}

/// Point exactly on the lateral surface of the tree cone
pub fn tree_surface_point(height: f32, max_radius: f32, index: usize, total: usize) -> Vec3 {
    let (y, radius) = cone_level(height, max_radius, index, total);
    let angle = index as f32 * SURFACE_ANGLE;
    Vec3::new(angle.cos() * radius, y, angle.sin() * radius)
}

/// Point on a spiral ring wound `loops` times just outside the tree
pub fn spiral_galaxy_point<R: Rng + ?Sized>(
    rng: &mut R,
    index: usize,
    total: usize,
    loops: f32,
    height: f32,
    max_radius: f32,
) -> Vec3 {
    let (y, tree_radius) = cone_level(height, max_radius, index, total);
    let progress = index as f32 / total as f32;
    let radius = tree_radius + SPIRAL_OFFSET + rng.random::<f32>() * SPIRAL_JITTER;
    let angle = progress * loops * TAU;
    Vec3::new(angle.cos() * radius, y, angle.sin() * radius)
}

/// Yaw that turns a frame at `position` to face away from the tree axis
pub fn outward_yaw(position: Vec3) -> f32 {
    let facing = position.normalize_or_zero();
    facing.x.atan2(facing.z)
}

/// Random point in a spherical shell, used for the background star field
pub fn shell_point<R: Rng + ?Sized>(rng: &mut R, inner: f32, outer: f32) -> Vec3 {
    let direction = scatter_point(rng, 1.0).normalize_or(Vec3::Y);
    direction * rng.random_range(inner..=outer)
}

fn random_tilt<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(rng.random::<f32>() * PI, rng.random::<f32>() * PI, 0.0)
}

/// Ornament cloud: palette colours with a chance of bigger gold baubles
pub fn ornament_particles<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Particle> {
    (0..count)
        .map(|i| {
            let gold = rng.random::<f32>() < GOLD_CHANCE;
            let color = if gold {
                Rgb::hex(GOLD) * GOLD_GLOW
            } else {
                Rgb::hex(ORNAMENT_PALETTE[rng.random_range(0..ORNAMENT_PALETTE.len())])
            };
            let mut scale = rng.random::<f32>() * 0.15 + 0.05;
            if gold {
                scale *= GOLD_SCALE_BOOST;
            }

            let scatter = scatter_point(rng, ORNAMENT_SCATTER_RADIUS);
            let tree = tree_volume_point(rng, TREE_HEIGHT, TREE_RADIUS, i, count);
            let rotation = random_tilt(rng);
            let speed = rng.random::<f32>() * 0.5 + 0.5;
            Particle::new(
                ParticleKind::Ornament { color, gold },
                scatter,
                tree,
                rotation,
                scale,
                speed,
            )
        })
        .collect()
}

/// Photo frames hung on the cone surface, each facing outwards
pub fn photo_particles<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Particle> {
    (0..count)
        .map(|i| {
            let tree = tree_surface_point(TREE_HEIGHT, PHOTO_RADIUS, i, count);
            let rotation = Vec3::new(0.0, outward_yaw(tree), 0.0);
            let scatter = scatter_point(rng, PHOTO_SCATTER_RADIUS);
            let speed = rng.random::<f32>() * 0.3 + 0.2;
            Particle::new(ParticleKind::PhotoSlot, scatter, tree, rotation, 0.8, speed)
        })
        .collect()
}

/// Ring of stars spiralling around the outside of the tree
pub fn spiral_particles<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Particle> {
    (0..count)
        .map(|i| {
            let tree = spiral_galaxy_point(
                rng,
                i,
                count,
                SPIRAL_LOOPS,
                SPIRAL_HEIGHT,
                SPIRAL_RADIUS,
            );
            let scatter = scatter_point(rng, SPIRAL_SCATTER_RADIUS);
            let rotation = random_tilt(rng);
            let scale = rng.random::<f32>() * 0.08 + 0.02;
            let speed = rng.random::<f32>() * 0.5 + 0.2;
            Particle::new(ParticleKind::SpiralStar, scatter, tree, rotation, scale, speed)
        })
        .collect()
}

/// The single star crowning the tree; it drops in from just above the apex
pub fn apex_particle<R: Rng + ?Sized>(rng: &mut R) -> Particle {
    let tree = Vec3::new(0.0, APEX_HEIGHT, 0.0);
    let scatter = tree + Vec3::Y * APEX_SCATTER_RADIUS + scatter_point(rng, APEX_SCATTER_RADIUS);
    Particle::new(ParticleKind::ApexStar, scatter, tree, Vec3::ZERO, 0.5, 1.0)
}

/// Outline of a pointed star, first tip straight up
pub fn star_outline(points: usize, outer: f32, inner: f32) -> Vec<Vec2> {
    let corners = points * 2;
    (0..corners)
        .map(|i| {
            let angle = i as f32 / corners as f32 * TAU + PI / 2.0;
            let r = if i % 2 == 0 { outer } else { inner };
            Vec2::new(angle.cos() * r, angle.sin() * r)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn scatter_points_stay_inside_the_sphere() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..2000 {
            assert!(scatter_point(&mut rng, 15.0).length() <= 15.0 + 1e-4);
        }
    }

    #[test]
    fn scatter_points_do_not_cluster_at_the_centre() {
        let mut rng = StdRng::seed_from_u64(2);
        let samples = 4000;
        let inner = (0..samples)
            .filter(|_| scatter_point(&mut rng, 1.0).length() < 0.5)
            .count();
        // A uniform ball keeps an eighth of its volume inside half the radius.
        let fraction = inner as f32 / samples as f32;
        assert!((fraction - 0.125).abs() < 0.03, "fraction {fraction}");
    }

    #[test]
    fn tree_volume_point_is_reproducible_from_the_same_seed() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        for i in 0..100 {
            assert_eq!(
                tree_volume_point(&mut a, 12.0, 4.5, i, 100),
                tree_volume_point(&mut b, 12.0, 4.5, i, 100)
            );
        }
    }

    #[test]
    fn tree_volume_point_stays_inside_the_cone() {
        let mut rng = StdRng::seed_from_u64(3);
        let total = 500;
        for i in 0..total {
            let p = tree_volume_point(&mut rng, 12.0, 4.5, i, total);
            let (y, radius) = cone_level(12.0, 4.5, i, total);
            assert_eq!(p.y, y);
            assert!(Vec2::new(p.x, p.z).length() <= radius + 1e-4);
        }
    }

    #[test]
    fn surface_points_sit_on_the_cone() {
        let total = 30;
        for i in 0..total {
            let p = tree_surface_point(12.0, 4.2, i, total);
            assert_eq!(p, tree_surface_point(12.0, 4.2, i, total));
            let (_, radius) = cone_level(12.0, 4.2, i, total);
            assert!((Vec2::new(p.x, p.z).length() - radius).abs() < 1e-4);
        }
        assert_eq!(tree_surface_point(12.0, 4.2, 0, total).y, -6.0);
    }

    #[test]
    fn spiral_stays_outside_the_tree() {
        let mut rng = StdRng::seed_from_u64(4);
        let total = 800;
        for i in 0..total {
            let p = spiral_galaxy_point(&mut rng, i, total, 6.0, 13.0, 5.0);
            let (_, tree_radius) = cone_level(13.0, 5.0, i, total);
            let r = Vec2::new(p.x, p.z).length();
            assert!(r >= tree_radius + SPIRAL_OFFSET - 1e-4);
            assert!(r <= tree_radius + SPIRAL_OFFSET + SPIRAL_JITTER + 1e-4);
        }
    }

    #[test]
    fn photo_frames_face_outwards() {
        let mut rng = StdRng::seed_from_u64(5);
        for particle in photo_particles(&mut rng, 30) {
            let yaw = particle.base_rotation().y;
            let facing = Vec3::new(yaw.sin(), 0.0, yaw.cos());
            let radial = particle.tree_position() * Vec3::new(1.0, 0.0, 1.0);
            if radial.length() > 1e-3 {
                assert!(facing.dot(radial.normalize()) > 0.99);
            }
        }
    }

    #[test]
    fn gold_ornaments_are_boosted() {
        let mut rng = StdRng::seed_from_u64(6);
        let particles = ornament_particles(&mut rng, 1000);
        let gold = particles
            .iter()
            .filter(|p| matches!(p.kind(), ParticleKind::Ornament { gold: true, .. }))
            .count();
        assert!(gold > 100 && gold < 300, "gold count {gold}");
        for particle in &particles {
            assert!(particle.base_scale() >= 0.05 && particle.base_scale() < 0.3);
            assert!(particle.speed() >= 0.5 && particle.speed() < 1.0);
        }
    }

    #[test]
    fn star_outline_alternates_radii() {
        let outline = star_outline(5, 1.8, 0.8);
        assert_eq!(outline.len(), 10);
        assert!((outline[0] - Vec2::new(0.0, 1.8)).length() < 1e-5);
        assert!((outline[1].length() - 0.8).abs() < 1e-5);
    }
}
