use crate::color::Rgb;
use crate::math::edge_function;
use crate::photos::Texture;
use crate::vertex::Vertex;
use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Colour and depth buffers for one frame
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
    depth: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize, background: Rgb) -> Self {
        FrameBuffer {
            width,
            height,
            pixels: vec![background; width * height],
            depth: vec![f32::INFINITY; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgb> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    pub fn depth(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.depth[y * self.width + x])
    }

    pub fn clear(&mut self, background: Rgb) {
        self.pixels.fill(background);
        self.depth.fill(f32::INFINITY);
    }

    /// Writes `color` if `depth` is closer than what is already there
    pub fn plot(&mut self, x: usize, y: usize, depth: f32, color: Rgb) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let offset = y * self.width + x;
        if depth < self.depth[offset] {
            self.depth[offset] = depth;
            self.pixels[offset] = color;
            true
        } else {
            false
        }
    }

    /// Applies `f` to every pixel
    pub fn map_pixels(&mut self, f: impl Fn(Rgb) -> Rgb) {
        for pixel in &mut self.pixels {
            *pixel = f(*pixel);
        }
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, Rgb> {
        self.pixels.chunks_exact(self.width.max(1))
    }
}

/// Interpolated surface data handed to a triangle shader
#[derive(Debug, Clone, Copy)]
pub struct Fragment {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

/// Draws a triangle, shading each covered pixel.
///
/// Both windings are filled. The shader returns `None` for transparent
/// fragments, which leave colour and depth untouched.
pub fn draw_triangle<F>(
    v0: &Vertex,
    v1: &Vertex,
    v2: &Vertex,
    frame: &mut FrameBuffer,
    mut shade: F,
)
where
    F: FnMut(&Fragment) -> Option<Rgb>,
{
    let (width, height) = (frame.width as f32, frame.height as f32);
    if width < 1.0 || height < 1.0 {
        return;
    }

    // Compute bounding box of the triangle
    let min_x = v0
        .screen_position
        .x
        .min(v1.screen_position.x)
        .min(v2.screen_position.x)
        .floor()
        .max(0.0);
    let max_x = v0
        .screen_position
        .x
        .max(v1.screen_position.x)
        .max(v2.screen_position.x)
        .ceil()
        .min(width - 1.0);
    let min_y = v0
        .screen_position
        .y
        .min(v1.screen_position.y)
        .min(v2.screen_position.y)
        .floor()
        .max(0.0);
    let max_y = v0
        .screen_position
        .y
        .max(v1.screen_position.y)
        .max(v2.screen_position.y)
        .ceil()
        .min(height - 1.0);
    if min_x > max_x || min_y > max_y {
        return;
    }

    let area = edge_function(v0.screen_position, v1.screen_position, v2.screen_position);
    if area.abs() < f32::EPSILON {
        return;
    }

    for y in min_y as usize..=max_y as usize {
        for x in min_x as usize..=max_x as usize {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);

            // Normalized barycentric coordinates, positive inside for either winding
            let w0 = edge_function(v1.screen_position, v2.screen_position, p) / area;
            let w1 = edge_function(v2.screen_position, v0.screen_position, p) / area;
            let w2 = edge_function(v0.screen_position, v1.screen_position, p) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let position = v0.position * w0 + v1.position * w1 + v2.position * w2;
            let depth = position.length();
            let offset = y * frame.width + x;
            if depth >= frame.depth[offset] {
                continue;
            }

            let fragment = Fragment {
                position,
                normal: (v0.normal * w0 + v1.normal * w1 + v2.normal * w2).normalize_or_zero(),
                uv: v0.uv * w0 + v1.uv * w1 + v2.uv * w2,
            };
            if let Some(color) = shade(&fragment) {
                frame.depth[offset] = depth;
                frame.pixels[offset] = color;
            }
        }
    }
}

/// Draws a round particle of `radius` pixels centred on `center`
pub fn draw_splat(frame: &mut FrameBuffer, center: Vec2, depth: f32, radius: f32, color: Rgb) {
    // Wide enough to always cover at least one pixel centre
    let radius = radius.max(std::f32::consts::FRAC_1_SQRT_2);
    let min_x = (center.x - radius).floor().max(0.0) as usize;
    let min_y = (center.y - radius).floor().max(0.0) as usize;
    let max_x = (center.x + radius).ceil();
    let max_y = (center.y + radius).ceil();
    if max_x < 0.0 || max_y < 0.0 {
        return;
    }
    let max_x = (max_x as usize).min(frame.width.saturating_sub(1));
    let max_y = (max_y as usize).min(frame.height.saturating_sub(1));

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if p.distance(center) <= radius {
                frame.plot(x, y, depth, color);
            }
        }
    }
}

/// Draws a line between two points in the pixel buffer using Bresenham's algorithm
pub fn draw_line(frame: &mut FrameBuffer, from: Vec2, to: Vec2, color: Rgb) {
    let (mut x0, mut y0, x1, y1) = (
        from.x.round() as isize,
        from.y.round() as isize,
        to.x.round() as isize,
        to.y.round() as isize,
    );
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy; // error value e_xy

    loop {
        if x0 >= 0 && y0 >= 0 {
            frame.plot(x0 as usize, y0 as usize, 0.0, color);
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Draws `texture` as large as fits, centred, with a thin gold border
pub fn draw_image_fit(frame: &mut FrameBuffer, texture: &Texture, margin: usize) {
    let avail_w = frame.width.saturating_sub(margin * 2) as f32;
    let avail_h = frame.height.saturating_sub(margin * 2) as f32;
    if avail_w < 1.0 || avail_h < 1.0 {
        return;
    }
    let scale = (avail_w / texture.width() as f32).min(avail_h / texture.height() as f32);
    let w = texture.width() as f32 * scale;
    let h = texture.height() as f32 * scale;
    let left = (frame.width as f32 - w) / 2.0;
    let top = (frame.height as f32 - h) / 2.0;

    for y in top.max(0.0) as usize..((top + h) as usize).min(frame.height) {
        for x in left.max(0.0) as usize..((left + w) as usize).min(frame.width) {
            let u = (x as f32 + 0.5 - left) / w;
            let v = (y as f32 + 0.5 - top) / h;
            frame.plot(x, y, 0.0, texture.sample(u, v));
        }
    }

    let gold = Rgb::hex("#FCD34D");
    let corners = [
        Vec2::new(left - 1.0, top - 1.0),
        Vec2::new(left + w, top - 1.0),
        Vec2::new(left + w, top + h),
        Vec2::new(left - 1.0, top + h),
    ];
    for i in 0..corners.len() {
        draw_line(frame, corners[i], corners[(i + 1) % corners.len()], gold);
    }
}

/// Darkens every pixel by `amount` in [0, 1]
pub fn dim(frame: &mut FrameBuffer, amount: f32) {
    let keep = 1.0 - amount.clamp(0.0, 1.0);
    for pixel in &mut frame.pixels {
        *pixel = *pixel * keep;
    }
}

/// Spreads light from pixels brighter than `threshold` into their neighbourhood
pub fn bloom(frame: &mut FrameBuffer, threshold: f32, intensity: f32, radius: usize) {
    let (width, height) = (frame.width, frame.height);
    let bright: Vec<Rgb> = frame
        .pixels
        .iter()
        .map(|&c| {
            if c.luminance() > threshold {
                c * ((c.luminance() - threshold) / c.luminance())
            } else {
                Rgb::BLACK
            }
        })
        .collect();
    if bright.iter().all(|c| *c == Rgb::BLACK) {
        return;
    }

    let r = radius as isize;
    let weight = intensity / ((2 * r + 1) * (2 * r + 1)) as f32;
    for y in 0..height as isize {
        for x in 0..width as isize {
            let mut glow = Rgb::BLACK;
            for dy in -r..=r {
                for dx in -r..=r {
                    let (sx, sy) = (x + dx, y + dy);
                    if sx >= 0 && sy >= 0 && (sx as usize) < width && (sy as usize) < height {
                        glow += bright[sy as usize * width + sx as usize];
                    }
                }
            }
            frame.pixels[y as usize * width + x as usize] += glow * weight;
        }
    }
}

/// Reinhard tone mapping of an HDR colour
pub fn tone_map(color: Rgb, exposure: f32) -> Rgb {
    let map = |c: f32| {
        let c = c.max(0.0) * exposure;
        c / (1.0 + c)
    };
    Rgb::new(map(color.r), map(color.g), map(color.b))
}

/// Darkens towards the edges
pub fn vignette(frame: &mut FrameBuffer, offset: f32, darkness: f32) {
    let (width, height) = (frame.width as f32, frame.height as f32);
    for (y, row) in frame.pixels.chunks_exact_mut(frame.width.max(1)).enumerate() {
        for (x, pixel) in row.iter_mut().enumerate() {
            let u = (x as f32 + 0.5) / width - 0.5;
            let v = (y as f32 + 0.5) / height - 0.5;
            let distance = Vec2::new(u, v).length() * 2.0_f32.sqrt();
            let falloff = ((distance - offset).max(0.0) * darkness).min(1.0);
            *pixel = *pixel * (1.0 - falloff * falloff);
        }
    }
}

/// Film grain: screens monochrome noise over the frame at `opacity`.
///
/// The same `seed` always yields the same grain.
pub fn grain(frame: &mut FrameBuffer, opacity: f32, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let opacity = opacity.clamp(0.0, 1.0);
    for pixel in &mut frame.pixels {
        let noise = rng.random::<f32>() * opacity;
        let screen = |c: f32| c + noise * (1.0 - c.clamp(0.0, 1.0));
        *pixel = Rgb::new(screen(pixel.r), screen(pixel.g), screen(pixel.b));
    }
}

/// Box-filters a supersampled frame down by an integer `factor`
pub fn downsample(frame: &FrameBuffer, factor: usize) -> FrameBuffer {
    if factor <= 1 {
        return frame.clone();
    }
    let width = frame.width / factor;
    let height = frame.height / factor;
    let mut out = FrameBuffer::new(width, height, Rgb::BLACK);
    let weight = 1.0 / (factor * factor) as f32;
    for y in 0..height {
        for x in 0..width {
            let mut sum = Rgb::BLACK;
            for sy in 0..factor {
                for sx in 0..factor {
                    sum += frame.pixels[(y * factor + sy) * frame.width + x * factor + sx];
                }
            }
            out.pixels[y * width + x] = sum * weight;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, z: f32) -> Vertex {
        Vertex {
            position: Vec3::new(0.0, 0.0, z),
            screen_position: Vec2::new(x, y),
            normal: Vec3::Z,
            uv: Vec2::new(x / 10.0, y / 10.0),
        }
    }

    #[test]
    fn triangle_fills_either_winding() {
        let (a, b, c) = (vertex(0.0, 0.0, 5.0), vertex(10.0, 0.0, 5.0), vertex(0.0, 10.0, 5.0));
        for (v0, v1, v2) in [(&a, &b, &c), (&a, &c, &b)] {
            let mut frame = FrameBuffer::new(10, 10, Rgb::BLACK);
            draw_triangle(v0, v1, v2, &mut frame, |_| Some(Rgb::WHITE));
            assert_eq!(frame.pixel(1, 1), Some(Rgb::WHITE));
            assert_eq!(frame.pixel(9, 9), Some(Rgb::BLACK));
        }
    }

    #[test]
    fn closer_triangle_wins_and_transparent_fragments_skip() {
        let mut frame = FrameBuffer::new(10, 10, Rgb::BLACK);
        let far = [vertex(0.0, 0.0, 9.0), vertex(10.0, 0.0, 9.0), vertex(0.0, 10.0, 9.0)];
        let near = [vertex(0.0, 0.0, 2.0), vertex(10.0, 0.0, 2.0), vertex(0.0, 10.0, 2.0)];
        draw_triangle(&near[0], &near[1], &near[2], &mut frame, |_| Some(Rgb::WHITE));
        draw_triangle(&far[0], &far[1], &far[2], &mut frame, |_| Some(Rgb::hex("#FF0000")));
        assert_eq!(frame.pixel(1, 1), Some(Rgb::WHITE));

        let mut frame = FrameBuffer::new(10, 10, Rgb::BLACK);
        draw_triangle(&near[0], &near[1], &near[2], &mut frame, |_| None);
        assert_eq!(frame.depth(1, 1), Some(f32::INFINITY));
    }

    #[test]
    fn splat_respects_depth() {
        let mut frame = FrameBuffer::new(8, 8, Rgb::BLACK);
        draw_splat(&mut frame, Vec2::new(4.0, 4.0), 1.0, 2.0, Rgb::WHITE);
        draw_splat(&mut frame, Vec2::new(4.0, 4.0), 3.0, 2.0, Rgb::hex("#FF0000"));
        assert_eq!(frame.pixel(4, 4), Some(Rgb::WHITE));
        assert_eq!(frame.pixel(0, 0), Some(Rgb::BLACK));
    }

    #[test]
    fn tone_map_is_bounded() {
        let mapped = tone_map(Rgb::new(100.0, 0.0, 1.0), 1.5);
        assert!(mapped.r < 1.0 && mapped.r > 0.98);
        assert_eq!(mapped.g, 0.0);
        assert!((mapped.b - 0.6).abs() < 1e-6);
    }

    #[test]
    fn grain_is_faint_and_repeatable() {
        let gray = Rgb::new(0.5, 0.5, 0.5);
        let mut a = FrameBuffer::new(16, 16, gray);
        let mut b = FrameBuffer::new(16, 16, gray);
        grain(&mut a, 0.02, 9);
        grain(&mut b, 0.02, 9);
        assert_eq!(a.pixels, b.pixels);
        for pixel in a.rows().flatten() {
            assert!(pixel.r >= 0.5 && pixel.r <= 0.5 + 0.01 + 1e-6);
            assert_eq!(pixel.r, pixel.b);
        }
        assert!(a.rows().flatten().any(|p| *p != gray));

        let mut c = FrameBuffer::new(16, 16, gray);
        grain(&mut c, 0.02, 10);
        assert_ne!(a.pixels, c.pixels);
    }

    #[test]
    fn downsample_averages_blocks() {
        let mut frame = FrameBuffer::new(4, 2, Rgb::BLACK);
        frame.plot(0, 0, 1.0, Rgb::WHITE);
        frame.plot(1, 1, 1.0, Rgb::WHITE);
        let small = downsample(&frame, 2);
        assert_eq!((small.width(), small.height()), (2, 1));
        assert_eq!(small.pixel(0, 0), Some(Rgb::new(0.5, 0.5, 0.5)));
        assert_eq!(small.pixel(1, 0), Some(Rgb::BLACK));
    }
}
