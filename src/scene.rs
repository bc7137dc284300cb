//! Camera, lights and post-processing around the particle groups.
//!
//! The scene mounts the morph engine and the photo board, exposes the
//! single tree/scattered toggle, and turns pointer positions into photo
//! hover and click events.

use crate::color::Rgb;
use crate::config::{Config, MorphTarget};
use crate::geometry::{self, STAR_INNER_RADIUS, STAR_OUTER_RADIUS, STAR_POINTS};
use crate::graphics::{self, draw_splat, draw_triangle, FrameBuffer};
use crate::interaction::{Affordance, PhotoInteraction};
use crate::math::{approach_factor, calculate_light_intensity, lerp, point_in_triangle};
use crate::morph::{GroupCounts, MorphEngine};
use crate::particle::{ParticleKind, Transform};
use crate::photos::{ImageRef, PhotoBoard, TextureLoader};
use crate::vertex::Vertex;
use glam::{EulerRot, Mat3, Mat4, Quat, Vec2, Vec3, Vec4Swizzles};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{PI, TAU};

pub const BACKGROUND: &str = "#00100C";
pub const CONTENT_OFFSET: Vec3 = Vec3::new(0.0, -1.5, 0.0);
pub const FRAME_SIZE: Vec2 = Vec2::new(1.2, 1.5);
pub const PHOTO_SIZE: Vec2 = Vec2::new(1.0, 1.0);

/// Strength of the film grain laid over the finished frame
const GRAIN_OPACITY: f32 = 0.02;
const NEAR: f32 = 0.1;
const FAR: f32 = 500.0;

/// Orbit camera around the tree; pan and zoom are disabled
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub distance: f32,
    /// Rotation around the vertical axis, radians
    pub azimuth: f32,
    /// Angle from the vertical axis, radians
    pub polar: f32,
    /// Vertical field of view, radians
    pub fov_y: f32,
}

impl Camera {
    pub const MIN_POLAR: f32 = PI / 3.0;
    pub const MAX_POLAR: f32 = PI / 1.8;
    /// Auto-rotate speed; 1.0 is one turn per minute
    pub const AUTO_ROTATE_SPEED: f32 = 0.5;

    pub fn eye(&self) -> Vec3 {
        let (sin_p, cos_p) = self.polar.sin_cos();
        let (sin_a, cos_a) = self.azimuth.sin_cos();
        Vec3::new(sin_p * sin_a, cos_p, sin_p * cos_a) * self.distance
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), Vec3::ZERO, Vec3::Y)
    }

    /// Rotates around the target, keeping the polar angle in range
    pub fn orbit(&mut self, delta_azimuth: f32, delta_polar: f32) {
        self.azimuth = (self.azimuth + delta_azimuth).rem_euclid(TAU);
        self.polar = (self.polar + delta_polar).clamp(Self::MIN_POLAR, Self::MAX_POLAR);
    }

    pub fn auto_rotate(&mut self, dt: f32) {
        self.orbit(TAU / 60.0 * Self::AUTO_ROTATE_SPEED * dt, 0.0);
    }
}

impl Default for Camera {
    fn default() -> Self {
        Camera {
            distance: 25.0,
            azimuth: 0.0,
            polar: PI / 2.0,
            fov_y: 45f32.to_radians(),
        }
    }
}

/// Sways the content towards the pointer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rig {
    pub rotation: Vec2,
}

impl Rig {
    pub const SWAY: Vec2 = Vec2::new(0.2, 0.1);
    pub const APPROACH: f32 = 0.05;

    /// `pointer` is normalized to [-1, 1] with +y up
    pub fn advance(&mut self, pointer: Vec2, dt: f32) {
        let factor = approach_factor(Self::APPROACH, 60.0, dt);
        self.rotation.y = lerp(self.rotation.y, pointer.x * Self::SWAY.x, factor);
        self.rotation.x = lerp(self.rotation.x, -pointer.y * Self::SWAY.y, factor);
    }
}

/// Gentle floating of the whole content group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloatMotion {
    pub speed: f32,
    pub rotation_intensity: f32,
    pub float_intensity: f32,
}

impl FloatMotion {
    pub const CARD: FloatMotion = FloatMotion {
        speed: 2.0,
        rotation_intensity: 0.2,
        float_intensity: 0.5,
    };

    pub fn transform(&self, time: f32) -> Mat4 {
        let t = time / 4.0 * self.speed;
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            t.cos() / 8.0 * self.rotation_intensity,
            t.sin() / 8.0 * self.rotation_intensity,
            t.sin() / 20.0 * self.rotation_intensity,
        );
        let lift = t.sin() / 10.0 * self.float_intensity;
        Mat4::from_rotation_translation(rotation, Vec3::Y * lift)
    }
}

/// A point or spot light, treated as omnidirectional
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Rgb,
    pub intensity: f32,
    /// Light fades to nothing at this distance when set
    pub range: Option<f32>,
}

impl PointLight {
    fn contribution(&self, position: Vec3, normal: Vec3) -> Rgb {
        let facing = calculate_light_intensity(normal, position, self.position)
            .max(calculate_light_intensity(-normal, position, self.position));
        let falloff = match self.range {
            Some(range) => {
                let fade = (1.0 - position.distance(self.position) / range).max(0.0);
                fade * fade
            }
            None => 1.0,
        };
        self.color * (self.intensity * facing * falloff)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lighting {
    pub ambient: Rgb,
    pub lights: Vec<PointLight>,
}

impl Lighting {
    /// Emerald ambient, a warm key light and two fills
    pub fn studio() -> Self {
        Lighting {
            ambient: Rgb::hex("#059669") * 0.2,
            lights: vec![
                PointLight {
                    position: Vec3::new(10.0, 20.0, 10.0),
                    color: Rgb::hex("#FCD34D"),
                    intensity: 2.0,
                    range: None,
                },
                PointLight {
                    position: Vec3::new(-10.0, -5.0, -10.0),
                    color: Rgb::hex("#047857"),
                    intensity: 2.0,
                    range: None,
                },
                PointLight {
                    position: Vec3::new(0.0, 5.0, 0.0),
                    color: Rgb::hex("#FFD700"),
                    intensity: 1.0,
                    range: Some(10.0),
                },
            ],
        }
    }

    /// Two-sided diffuse shading in world space
    pub fn shade(
        &self,
        base: Rgb,
        position: Vec3,
        normal: Vec3,
        extra: Option<&PointLight>,
    ) -> Rgb {
        let mut light = self.ambient;
        for source in self.lights.iter().chain(extra) {
            light += source.contribution(position, normal);
        }
        base.tint(light)
    }
}

/// Far-away star in the background shell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackdropStar {
    pub position: Vec3,
    pub phase: f32,
}

/// Size of the render target in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: usize, height: usize) -> Self {
        Viewport {
            width: width as f32,
            height: height as f32,
        }
    }

    /// Pointer position normalized to [-1, 1], +y up
    pub fn normalize(&self, point: Vec2) -> Vec2 {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(
            point.x / self.width * 2.0 - 1.0,
            1.0 - point.y / self.height * 2.0,
        )
        .clamp(Vec2::splat(-1.0), Vec2::splat(1.0))
    }
}

/// World to screen mapping for one frame
#[derive(Debug, Clone, Copy)]
pub struct Projector {
    view: Mat4,
    projection: Mat4,
    viewport: Viewport,
    /// Pixels per world unit at distance one
    focal: f32,
}

impl Projector {
    pub fn new(camera: &Camera, viewport: Viewport) -> Self {
        let aspect = if viewport.height > 0.0 {
            viewport.width / viewport.height
        } else {
            1.0
        };
        Projector {
            view: camera.view(),
            projection: Mat4::perspective_rh(camera.fov_y, aspect, NEAR, FAR),
            viewport,
            focal: viewport.height / 2.0 / (camera.fov_y / 2.0).tan(),
        }
    }

    pub fn focal(&self) -> f32 {
        self.focal
    }

    /// View-space position of a world point
    pub fn to_view(&self, world: Vec3) -> Vec3 {
        self.view.transform_point3(world)
    }

    /// Screen position and depth of a world point, `None` behind the camera
    pub fn project(&self, world: Vec3) -> Option<(Vec2, f32)> {
        let view = self.to_view(world);
        if -view.z < NEAR {
            return None;
        }
        let depth = view.length();
        let clip = self.projection * view.extend(1.0);
        let ndc = clip.xy() / clip.w;
        let screen = Vec2::new(
            (ndc.x + 1.0) / 2.0 * self.viewport.width,
            (1.0 - ndc.y) / 2.0 * self.viewport.height,
        );
        Some((screen, depth))
    }

    fn vertex(&self, world: Vec3, normal: Vec3, uv: Vec2) -> Option<Vertex> {
        let (screen_position, _) = self.project(world)?;
        Some(Vertex {
            position: self.to_view(world),
            screen_position,
            normal,
            uv,
        })
    }
}

/// Corners of a centred quad in local XY with texture coordinates, v growing downwards
fn quad(size: Vec2) -> [(Vec3, Vec2); 4] {
    let (w, h) = (size.x / 2.0, size.y / 2.0);
    [
        (Vec3::new(-w, h, 0.0), Vec2::new(0.0, 0.0)),
        (Vec3::new(w, h, 0.0), Vec2::new(1.0, 0.0)),
        (Vec3::new(w, -h, 0.0), Vec2::new(1.0, 1.0)),
        (Vec3::new(-w, -h, 0.0), Vec2::new(0.0, 1.0)),
    ]
}

/// Everything on screen, plus the glue between pointer input and the photo slots
pub struct Scene {
    engine: MorphEngine,
    board: PhotoBoard,
    interaction: PhotoInteraction,
    camera: Camera,
    rig: Rig,
    float: FloatMotion,
    lighting: Lighting,
    backdrop: Vec<BackdropStar>,
    star_outline: Vec<Vec2>,
    pointer: Vec2,
    content: Mat4,
    grain_seed: u64,
}

impl Scene {
    /// Builds every particle group from the configured seed and binds the initial photos
    pub fn new(config: &Config, photos: Vec<ImageRef>, loader: &mut dyn TextureLoader) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let counts = GroupCounts {
            ornaments: config.ornaments,
            photo_slots: config.photo_slots,
            spiral_stars: config.spiral_stars,
        };
        let engine = MorphEngine::new(&mut rng, counts, config.start);
        let backdrop = (0..config.backdrop_stars)
            .map(|_| BackdropStar {
                position: geometry::shell_point(&mut rng, 100.0, 150.0),
                phase: rng.random::<f32>() * TAU,
            })
            .collect();

        let mut board = PhotoBoard::new(config.photo_slots);
        board.bind(photos, loader);

        let mut scene = Scene {
            engine,
            board,
            interaction: PhotoInteraction::new(),
            camera: Camera::default(),
            rig: Rig::default(),
            float: FloatMotion::CARD,
            lighting: Lighting::studio(),
            backdrop,
            star_outline: geometry::star_outline(STAR_POINTS, STAR_OUTER_RADIUS, STAR_INNER_RADIUS),
            pointer: Vec2::ZERO,
            content: Mat4::IDENTITY,
            grain_seed: config.seed,
        };
        scene.update_content();
        scene
    }

    pub fn engine(&self) -> &MorphEngine {
        &self.engine
    }

    pub fn board(&self) -> &PhotoBoard {
        &self.board
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn target(&self) -> MorphTarget {
        self.engine.target()
    }

    pub fn hovered_photo(&self) -> Option<usize> {
        self.interaction.hovered()
    }

    /// The only input into the morph engine
    pub fn set_target(&mut self, target: MorphTarget) -> bool {
        self.engine.set_target(target)
    }

    pub fn toggle(&mut self) -> MorphTarget {
        self.engine.toggle()
    }

    /// Replaces the photo list; slots rebind without touching geometry
    pub fn set_photos(&mut self, photos: Vec<ImageRef>, loader: &mut dyn TextureLoader) {
        self.board.bind(photos, loader);
    }

    /// Installs finished texture loads
    pub fn pump_textures(&mut self, loader: &mut dyn TextureLoader) -> usize {
        self.board.pump(loader)
    }

    /// One simulation step
    pub fn advance(&mut self, dt: f32) {
        self.engine.advance(dt);
        self.rig.advance(self.pointer, dt);
        if self.engine.target() == MorphTarget::Tree {
            self.camera.auto_rotate(dt);
        }
        self.update_content();
    }

    fn update_content(&mut self) {
        let rig = Mat4::from_euler(EulerRot::XYZ, self.rig.rotation.x, self.rig.rotation.y, 0.0);
        self.content = Mat4::from_translation(CONTENT_OFFSET)
            * rig
            * self.float.transform(self.engine.time());
    }

    pub fn orbit(&mut self, drag: Vec2, viewport: Viewport) {
        if viewport.height <= 0.0 {
            return;
        }
        self.camera.orbit(
            -TAU * drag.x / viewport.height,
            -TAU * drag.y / viewport.height,
        );
    }

    pub fn reset_camera(&mut self) {
        self.camera = Camera::default();
    }

    /// Pointer moved to `point` (render pixels). Returns an affordance change.
    pub fn pointer_moved(&mut self, point: Vec2, viewport: Viewport) -> Option<Affordance> {
        self.pointer = viewport.normalize(point);
        let hit = self.hit_photo(point, viewport);
        self.interaction.pointer_moved(hit, &mut self.board)
    }

    /// Image to show when clicking at `point`, if a loaded photo is there
    pub fn click(&mut self, point: Vec2, viewport: Viewport) -> Option<ImageRef> {
        let hit = self.hit_photo(point, viewport);
        self.interaction.click(hit, &self.board)
    }

    /// Drops hover state; the UI should show the default affordance afterwards
    pub fn teardown(&mut self) -> Affordance {
        let affordance = self.interaction.teardown(&mut self.board);
        self.board.release_all();
        affordance
    }

    /// Closest photo plane under `point`
    pub fn hit_photo(&self, point: Vec2, viewport: Viewport) -> Option<usize> {
        let projector = Projector::new(&self.camera, viewport);
        let mut best: Option<(usize, f32)> = None;
        for slot in 0..self.board.slots().len() {
            let Some(plane) = self.engine.photo_plane(slot) else {
                continue;
            };
            let model = self.content * plane.to_matrix();
            let corners: Option<Vec<(Vec2, f32)>> = quad(PHOTO_SIZE)
                .iter()
                .map(|(local, _)| projector.project(model.transform_point3(*local)))
                .collect();
            let Some(corners) = corners else {
                continue;
            };
            let s: Vec<Vec2> = corners.iter().map(|(screen, _)| *screen).collect();
            let inside = point_in_triangle(point, s[0], s[1], s[2])
                || point_in_triangle(point, s[0], s[2], s[3]);
            if !inside {
                continue;
            }
            let depth = corners.iter().map(|(_, d)| d).sum::<f32>() / corners.len() as f32;
            if best.is_none_or(|(_, best_depth)| depth < best_depth) {
                best = Some((slot, depth));
            }
        }
        best.map(|(slot, _)| slot)
    }

    /// Renders the whole scene into `frame`
    pub fn render(&self, frame: &mut FrameBuffer) {
        frame.clear(Rgb::hex(BACKGROUND));
        let viewport = Viewport::new(frame.width(), frame.height());
        let projector = Projector::new(&self.camera, viewport);
        let time = self.engine.time();
        let rotation = Mat3::from_mat4(self.content);
        let star_light = self.engine.apex().is_lit().then(|| PointLight {
            position: self.content.transform_point3(self.engine.apex().particle().tree_position()),
            color: Rgb::hex("#FFD700"),
            intensity: 5.0,
            range: Some(15.0),
        });

        self.render_backdrop(frame, &projector, time);

        for (particle, transform) in self
            .engine
            .ornaments()
            .particles()
            .iter()
            .zip(self.engine.ornaments().transforms().iter())
        {
            let ParticleKind::Ornament { color, .. } = particle.kind() else {
                continue;
            };
            let world = self.content.transform_point3(transform.position);
            let Some((screen, depth)) = projector.project(world) else {
                continue;
            };
            let normal = (rotation * (transform.orientation() * Vec3::Z)).normalize_or_zero();
            let lit = self.lighting.shade(color, world, normal, star_light.as_ref());
            let radius = transform.scale.x * projector.focal() / depth;
            draw_splat(frame, screen, depth, radius, lit);
        }

        let star_glow = Rgb::hex("#E2E8F0") * 0.3 + Rgb::WHITE * 2.0;
        for transform in self.engine.spiral().transforms().iter() {
            let world = self.content.transform_point3(transform.position);
            if let Some((screen, depth)) = projector.project(world) {
                let radius = 0.5 * transform.scale.x * projector.focal() / depth;
                draw_splat(frame, screen, depth, radius, star_glow);
            }
        }

        for transform in self.engine.photo_frames().transforms().iter() {
            self.render_frame(frame, &projector, transform, star_light.as_ref());
        }

        self.render_apex_star(frame, &projector);

        graphics::bloom(frame, 1.2, 1.5, 1);
        frame.map_pixels(|c| graphics::tone_map(c, 1.5));

        // Photos are unlit and skip tone mapping.
        for (slot, photo) in self.board.slots().iter().enumerate() {
            let (Some(texture), Some(plane)) = (photo.texture(), self.engine.photo_plane(slot))
            else {
                continue;
            };
            let tint = photo.tint();
            self.render_quad(frame, &projector, &plane, PHOTO_SIZE, |fragment| {
                Some(texture.sample(fragment.uv.x, fragment.uv.y).tint(tint))
            });
        }

        graphics::vignette(frame, 0.1, 1.1);
        let frame_seed = self.grain_seed ^ u64::from(time.to_bits());
        graphics::grain(frame, GRAIN_OPACITY, frame_seed);
    }

    fn render_backdrop(&self, frame: &mut FrameBuffer, projector: &Projector, time: f32) {
        for star in &self.backdrop {
            let Some((screen, depth)) = projector.project(star.position) else {
                continue;
            };
            if screen.x < 0.0 || screen.y < 0.0 {
                continue;
            }
            let fade = 0.25 + 0.2 * (time * 0.5 + star.phase).sin();
            frame.plot(screen.x as usize, screen.y as usize, depth, Rgb::WHITE * fade);
        }
    }

    fn render_frame(
        &self,
        frame: &mut FrameBuffer,
        projector: &Projector,
        transform: &Transform,
        star_light: Option<&PointLight>,
    ) {
        let lighting = &self.lighting;
        let view_to_world = projector.view.inverse();
        self.render_quad(frame, projector, transform, FRAME_SIZE, |fragment| {
            let world = view_to_world.transform_point3(fragment.position);
            Some(lighting.shade(Rgb::WHITE, world, fragment.normal, star_light))
        });
    }

    fn render_quad<F>(
        &self,
        frame: &mut FrameBuffer,
        projector: &Projector,
        transform: &Transform,
        size: Vec2,
        shade: F,
    ) where
        F: FnMut(&graphics::Fragment) -> Option<Rgb>,
    {
        let model = self.content * transform.to_matrix();
        let normal = model.transform_vector3(Vec3::Z).normalize_or_zero();
        let vertices: Option<Vec<Vertex>> = quad(size)
            .iter()
            .map(|(local, uv)| projector.vertex(model.transform_point3(*local), normal, *uv))
            .collect();
        let Some(v) = vertices else {
            return;
        };
        let mut shade = shade;
        draw_triangle(&v[0], &v[1], &v[2], frame, &mut shade);
        draw_triangle(&v[0], &v[2], &v[3], frame, &mut shade);
    }

    fn render_apex_star(&self, frame: &mut FrameBuffer, projector: &Projector) {
        let apex = self.engine.apex();
        if apex.scale() < 1e-3 {
            return;
        }
        let model = self.content * apex.transform().to_matrix();
        let normal = model.transform_vector3(Vec3::Z).normalize_or_zero();
        let Some(center) = projector.vertex(model.transform_point3(Vec3::ZERO), normal, Vec2::ZERO)
        else {
            return;
        };
        let rim: Option<Vec<Vertex>> = self
            .star_outline
            .iter()
            .map(|p| projector.vertex(model.transform_point3(p.extend(0.0)), normal, Vec2::ZERO))
            .collect();
        let Some(rim) = rim else {
            return;
        };

        let glow = Rgb::hex("#FCD34D") + Rgb::hex("#FFD700") * 4.0;
        for i in 0..rim.len() {
            let next = &rim[(i + 1) % rim.len()];
            draw_triangle(&center, &rim[i], next, frame, |_| Some(glow));
        }
    }
}
