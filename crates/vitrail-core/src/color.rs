//! 24-bit color primitives with alpha-aware compositing.

use std::sync::OnceLock;

use crate::settings;

/// An opaque 24-bit RGB color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Create a new color.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// White.
    pub const WHITE: Self = Self::new(255, 255, 255);
    /// Black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Red.
    pub const RED: Self = Self::new(255, 0, 0);
    /// Green.
    pub const GREEN: Self = Self::new(0, 255, 0);
    /// Blue.
    pub const BLUE: Self = Self::new(0, 0, 255);
    /// Yellow.
    pub const YELLOW: Self = Self::new(255, 255, 0);
    /// Cyan.
    pub const CYAN: Self = Self::new(0, 255, 255);
    /// Magenta.
    pub const MAGENTA: Self = Self::new(255, 0, 255);
    /// Mid gray.
    pub const GRAY: Self = Self::new(128, 128, 128);
    /// Dark red, used by the error log window.
    pub const DARK_RED: Self = Self::new(128, 0, 0);
    /// Dark gray.
    pub const DARK_GRAY: Self = Self::new(64, 64, 64);
}

/// An RGB color with an 8-bit alpha channel (255 = fully opaque).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Default for Rgba {
    fn default() -> Self {
        Self::opaque(Rgb::BLACK)
    }
}

impl From<Rgb> for Rgba {
    fn from(c: Rgb) -> Self {
        Self::opaque(c)
    }
}

impl Rgba {
    /// Create a color with an explicit alpha.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a fully opaque color.
    pub const fn opaque(c: Rgb) -> Self {
        Self {
            r: c.r,
            g: c.g,
            b: c.b,
            a: 255,
        }
    }

    /// The RGB part of this color.
    pub const fn rgb(self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }

    /// Alpha as a fraction in `[0, 1]`.
    pub fn alpha_fraction(self) -> f32 {
        f32::from(self.a) / 255.0
    }

    /// Additive blend of `other` into `self` with the given weight.
    ///
    /// Each channel accumulates `other_channel * other_alpha * weight`,
    /// rounding to nearest with ties to even and saturating at 255. The
    /// target alpha is preserved.
    pub fn accumulate(&mut self, other: Rgba, weight: f32) {
        let factor = other.alpha_fraction() * weight.clamp(0.0, 1.0);
        self.r = add_channel(self.r, other.r, factor);
        self.g = add_channel(self.g, other.g, factor);
        self.b = add_channel(self.b, other.b, factor);
    }
}

fn add_channel(base: u8, addend: u8, factor: f32) -> u8 {
    let add = (f32::from(addend) * factor).round_ties_even();
    let sum = f32::from(base) + add;
    if sum >= 255.0 { 255 } else { sum as u8 }
}

/// Fast fixed-point interpolation of one channel.
fn lerp_channel(a: u8, b: u8, t: f32) -> u8 {
    let v = f32::from(a) + t * (f32::from(b) - f32::from(a));
    v.clamp(0.0, 255.0).round_ties_even() as u8
}

const GAMMA: f32 = 2.2;

fn gamma_lut() -> &'static [f32; 256] {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = (i as f32).powf(GAMMA);
        }
        table
    })
}

/// Gamma-corrected interpolation of one channel, using the precomputed
/// forward table.
fn interpolate_channel(a: u8, b: u8, t: f32) -> u8 {
    let lut = gamma_lut();
    let a_f = lut[usize::from(a)];
    let b_f = lut[usize::from(b)];
    let c_f = a_f + t * (b_f - a_f);
    c_f.max(0.0).powf(1.0 / GAMMA).round().clamp(0.0, 255.0) as u8
}

/// Interpolate between two colors.
///
/// When the process-wide gamma-correction setting is on the interpolation
/// happens in gamma space, otherwise on raw 8-bit channels.
pub fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
    if settings::gamma_correction_enabled() {
        Rgb::new(
            interpolate_channel(a.r, b.r, t),
            interpolate_channel(a.g, b.g, t),
            interpolate_channel(a.b, b.b, t),
        )
    } else {
        Rgb::new(
            lerp_channel(a.r, b.r, t),
            lerp_channel(a.g, b.g, t),
            lerp_channel(a.b, b.b, t),
        )
    }
}

/// Scalar interpolation between two floats, clamped to the segment.
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + t.clamp(0.0, 1.0) * (b - a)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_saturates() {
        let mut c = Rgba::new(255, 200, 100, 255);
        c.accumulate(Rgba::new(50, 100, 200, 255), 1.0);
        assert_eq!(c, Rgba::new(255, 255, 255, 255));
    }

    #[test]
    fn accumulate_scales_by_alpha() {
        let mut c = Rgba::new(0, 0, 0, 255);
        c.accumulate(Rgba::new(20, 20, 20, 128), 1.0);
        assert_eq!(c.rgb(), Rgb::new(10, 10, 10));
        assert_eq!(c.a, 255, "target alpha must be preserved");
    }

    #[test]
    fn accumulate_zero_weight_is_noop() {
        let mut c = Rgba::new(1, 2, 3, 255);
        c.accumulate(Rgba::new(200, 200, 200, 255), 0.0);
        assert_eq!(c, Rgba::new(1, 2, 3, 255));
    }

    #[test]
    fn lerp_endpoints() {
        let a = Rgb::new(10, 20, 30);
        let b = Rgb::new(200, 100, 0);
        assert_eq!(lerp(a, b, 0.0), a);
        assert_eq!(lerp(a, b, 1.0), b);
    }

    #[test]
    fn lerp_channel_midpoint() {
        assert_eq!(lerp_channel(0, 100, 0.5), 50);
        assert_eq!(lerp_channel(0, 200, 0.5), 100);
    }

    #[test]
    fn gamma_interpolation_biases_toward_bright() {
        // In gamma space the midpoint of black and white sits well above
        // the linear midpoint of 127.
        let mid = interpolate_channel(0, 255, 0.5);
        assert!(mid > 180, "gamma midpoint was {mid}");
    }

    #[test]
    fn rgba_from_rgb_is_opaque() {
        let c: Rgba = Rgb::RED.into();
        assert_eq!(c.a, 255);
    }

    #[test]
    fn lerp_f32_clamps() {
        assert_eq!(lerp_f32(0.0, 10.0, 2.0), 10.0);
        assert_eq!(lerp_f32(0.0, 10.0, -1.0), 0.0);
    }
}
