use std::ops::{Add, AddAssign, Mul};

/// Linear HDR colour. Components may exceed 1.0 before tone mapping.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Rgb { r, g, b }
    }

    /// Builds a colour from 8-bit channels
    pub fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Rgb::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Parses `#rrggbb`; malformed input yields black
    pub fn hex(code: &str) -> Self {
        let digits = code.trim_start_matches('#');
        if digits.len() != 6 {
            return Rgb::BLACK;
        }
        let channel = |range: std::ops::Range<usize>| {
            digits
                .get(range)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .unwrap_or(0)
        };
        Rgb::rgb8(channel(0..2), channel(2..4), channel(4..6))
    }

    pub fn luminance(self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    /// Component-wise product
    pub fn tint(self, other: Rgb) -> Rgb {
        Rgb::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    /// Clamped 8-bit channels
    pub fn to_rgb8(self) -> (u8, u8, u8) {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        (quantize(self.r), quantize(self.g), quantize(self.b))
    }
}

impl Add for Rgb {
    type Output = Rgb;

    fn add(self, rhs: Rgb) -> Rgb {
        Rgb::new(self.r + rhs.r, self.g + rhs.g, self.b + rhs.b)
    }
}

impl AddAssign for Rgb {
    fn add_assign(&mut self, rhs: Rgb) {
        *self = *self + rhs;
    }
}

impl Mul<f32> for Rgb {
    type Output = Rgb;

    fn mul(self, rhs: f32) -> Rgb {
        Rgb::new(self.r * rhs, self.g * rhs, self.b * rhs)
    }
}

/// Ornament palette: emerald, deep emerald, gold, light gold, sparkle white
pub const ORNAMENT_PALETTE: [&str; 5] = ["#059669", "#047857", "#FFD700", "#FCD34D", "#FFFFFF"];

pub const GOLD: &str = "#FFD700";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_codes() {
        assert_eq!(Rgb::hex("#FFD700").to_rgb8(), (255, 215, 0));
        assert_eq!(Rgb::hex("059669").to_rgb8(), (5, 150, 105));
        assert_eq!(Rgb::hex("#12"), Rgb::BLACK);
    }

    #[test]
    fn hdr_values_clamp_when_quantized() {
        assert_eq!((Rgb::WHITE * 2.5).to_rgb8(), (255, 255, 255));
    }
}
