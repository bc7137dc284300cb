use glam::{Vec2, Vec3};

/// Vertex structure with view-space position, screen position, normal and texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub screen_position: Vec2,
    pub normal: Vec3,
    pub uv: Vec2,
}
