use crate::color::Rgb;
use glam::{EulerRot, Mat4, Quat, Vec3};

/// What a particle is drawn as
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParticleKind {
    /// Crystal ornament; gold ones are bigger and glow
    Ornament { color: Rgb, gold: bool },
    /// Polaroid frame carrying a user photo
    PhotoSlot,
    /// Small star in the spiral orbiting the tree
    SpiralStar,
    /// The star on top of the tree
    ApexStar,
}

/// Static per-particle parameters, fixed at group creation.
///
/// Both endpoints are immutable for the lifetime of the particle so that
/// reassembling the tree always lands every particle on the same spot.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    scatter_position: Vec3,
    tree_position: Vec3,
    base_rotation: Vec3,
    base_scale: f32,
    speed: f32,
    kind: ParticleKind,
}

impl Particle {
    pub fn new(
        kind: ParticleKind,
        scatter_position: Vec3,
        tree_position: Vec3,
        base_rotation: Vec3,
        base_scale: f32,
        speed: f32,
    ) -> Self {
        Particle {
            scatter_position,
            tree_position,
            base_rotation,
            base_scale,
            speed,
            kind,
        }
    }

    pub fn scatter_position(&self) -> Vec3 {
        self.scatter_position
    }

    pub fn tree_position(&self) -> Vec3 {
        self.tree_position
    }

    /// Euler angles (XYZ) in radians
    pub fn base_rotation(&self) -> Vec3 {
        self.base_rotation
    }

    pub fn base_scale(&self) -> f32 {
        self.base_scale
    }

    /// Animation speed variance used to desynchronize secondary motion
    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn kind(&self) -> ParticleKind {
        self.kind
    }

    /// Interpolated base position for an eased factor
    pub fn blend(&self, eased: f32) -> Vec3 {
        self.scatter_position.lerp(self.tree_position, eased)
    }
}

/// A rigid transform resolved for a single frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Euler angles (XYZ) in radians
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    pub fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::XYZ, self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.position)
    }

    /// Moves the transform along its own axes
    pub fn translated_local(&self, offset: Vec3) -> Transform {
        Transform {
            position: self.position + self.orientation() * offset,
            ..*self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}
