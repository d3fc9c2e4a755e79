// ============================================================================
// COLOR — straight RGB brush / background colours
// ============================================================================

use image::Rgba;

/// An opaque RGB colour with channels in `0.0..=1.0`.
///
/// Brushes paint with a `Color` and take their transparency from the brush
/// opacity and stamp falloff, never from the colour itself.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Build from a surface pixel, dropping its alpha.
    pub fn from_pixel(pixel: Rgba<u8>) -> Self {
        Self::from_rgb8(pixel[0], pixel[1], pixel[2])
    }

    pub fn to_rgb8(self) -> [u8; 3] {
        [
            channel_to_u8(self.r),
            channel_to_u8(self.g),
            channel_to_u8(self.b),
        ]
    }

    /// Opaque pixel form, used for clears.
    pub fn to_pixel(self) -> Rgba<u8> {
        let [r, g, b] = self.to_rgb8();
        Rgba([r, g, b, 255])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_array(c: [f32; 3]) -> Self {
        Self::rgb(c[0], c[1], c[2])
    }

    /// Parse `RRGGBB`, optionally prefixed with `#`.
    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some(Self::from_rgb8(r, g, b))
    }

    /// Serialize as "r,g,b" bytes (settings file format).
    pub fn to_cfg_string(self) -> String {
        let [r, g, b] = self.to_rgb8();
        format!("{},{},{}", r, g, b)
    }

    /// Parse "r,g,b" bytes.
    pub fn from_cfg_str(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 3 {
            return None;
        }
        let r = parts[0].trim().parse::<u8>().ok()?;
        let g = parts[1].trim().parse::<u8>().ok()?;
        let b = parts[2].trim().parse::<u8>().ok()?;
        Some(Self::from_rgb8(r, g, b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Quantize a normalized channel to a byte.
#[inline]
pub fn channel_to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_accepts_optional_hash() {
        assert_eq!(Color::from_hex("#ff0000"), Some(Color::RED));
        assert_eq!(Color::from_hex("00ff00"), Some(Color::GREEN));
        assert_eq!(Color::from_hex("fff"), None);
        assert_eq!(Color::from_hex("zz0000"), None);
    }

    #[test]
    fn cfg_string_is_lossless_for_bytes() {
        let c = Color::from_rgb8(12, 200, 7);
        assert_eq!(Color::from_cfg_str(&c.to_cfg_string()), Some(c));
        assert_eq!(Color::from_cfg_str("1,2"), None);
    }

    #[test]
    fn channels_are_clamped_when_quantized() {
        assert_eq!(Color::rgb(-1.0, 0.5, 2.0).to_rgb8(), [0, 128, 255]);
    }
}
