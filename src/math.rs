use glam::{Vec2, Vec3};

/// Quadratic ease-in-out applied to raw transition progress
pub fn ease_in_out_quad(t: f32) -> f32 {
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

/// Linear interpolation between two scalars
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Per-frame lerp factor corrected for the actual frame time.
///
/// `per_frame` is the factor the motion was tuned with at `reference_fps`.
/// The result is always in `[0, 1]`, so applying it never overshoots.
pub fn approach_factor(per_frame: f32, reference_fps: f32, dt: f32) -> f32 {
    if dt.is_nan() || dt <= 0.0 {
        return 0.0;
    }
    let keep = (1.0 - per_frame.clamp(0.0, 1.0)).powf(dt * reference_fps);
    (1.0 - keep).clamp(0.0, 1.0)
}

/// Rotates a point around the vertical axis
pub fn rotate_about_y(point: Vec3, angle: f32) -> Vec3 {
    let (sin_a, cos_a) = angle.sin_cos();
    Vec3::new(
        point.x * cos_a - point.z * sin_a,
        point.y,
        point.x * sin_a + point.z * cos_a,
    )
}

/// Edge function used in rasterization
pub fn edge_function(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (c.x - a.x) * (b.y - a.y) - (c.y - a.y) * (b.x - a.x)
}

/// Tests whether `p` lies inside triangle `a b c`, regardless of winding
pub fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let w0 = edge_function(b, c, p);
    let w1 = edge_function(c, a, p);
    let w2 = edge_function(a, b, p);
    (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0) || (w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0)
}

/// Calculates the diffuse light intensity based on the normal vector and light position
pub fn calculate_light_intensity(normal: Vec3, position: Vec3, light_pos: Vec3) -> f32 {
    let light_dir = (light_pos - position).normalize_or_zero();
    normal.dot(light_dir).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0.0, 0.0)]
    #[test_case(0.25, 0.125)]
    #[test_case(0.5, 0.5)]
    #[test_case(0.75, 0.875)]
    #[test_case(1.0, 1.0)]
    fn ease_in_out_quad_values(t: f32, expected: f32) {
        assert!((ease_in_out_quad(t) - expected).abs() < 1e-6);
    }

    #[test]
    fn ease_is_monotonic() {
        let mut previous = ease_in_out_quad(0.0);
        for step in 1..=100 {
            let eased = ease_in_out_quad(step as f32 / 100.0);
            assert!(eased >= previous);
            previous = eased;
        }
    }

    #[test]
    fn approach_factor_matches_reference_rate() {
        let factor = approach_factor(0.05, 60.0, 1.0 / 60.0);
        assert!((factor - 0.05).abs() < 1e-5);
        assert_eq!(approach_factor(0.05, 60.0, 0.0), 0.0);
        assert!(approach_factor(0.05, 60.0, 100.0) <= 1.0);
    }

    #[test]
    fn quarter_turn_about_y() {
        let rotated = rotate_about_y(Vec3::X, std::f32::consts::FRAC_PI_2);
        assert!((rotated - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn point_in_triangle_ignores_winding() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(4.0, 0.0);
        let c = Vec2::new(0.0, 4.0);
        let inside = Vec2::new(1.0, 1.0);
        let outside = Vec2::new(3.0, 3.0);
        assert!(point_in_triangle(inside, a, b, c));
        assert!(point_in_triangle(inside, a, c, b));
        assert!(!point_in_triangle(outside, a, b, c));
    }
}
