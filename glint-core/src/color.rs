//! Packed `0xRRGGBB` colors and their float conversions.

pub const WHITE: u32 = 0xFF_FF_FF;
pub const BLACK: u32 = 0x00_00_00;

pub fn red(rgb: u32) -> u8 {
    ((rgb >> 16) & 0xFF) as u8
}

pub fn green(rgb: u32) -> u8 {
    ((rgb >> 8) & 0xFF) as u8
}

pub fn blue(rgb: u32) -> u8 {
    (rgb & 0xFF) as u8
}

/// Straight (non-premultiplied) RGBA, each channel in [0.0, 1.0].
pub fn to_rgba(rgb: u32, alpha: f32) -> [f32; 4] {
    [
        red(rgb) as f32 / 255.0,
        green(rgb) as f32 / 255.0,
        blue(rgb) as f32 / 255.0,
        alpha,
    ]
}

/// Premultiply the color channels of a straight RGBA color.
pub fn premultiply(rgba: [f32; 4]) -> [f32; 4] {
    [rgba[0] * rgba[3], rgba[1] * rgba[3], rgba[2] * rgba[3], rgba[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels() {
        assert_eq!(red(0x12_34_56), 0x12);
        assert_eq!(green(0x12_34_56), 0x34);
        assert_eq!(blue(0x12_34_56), 0x56);
    }

    #[test]
    fn test_to_rgba_and_premultiply() {
        let c = to_rgba(WHITE, 0.5);
        assert_eq!(c, [1.0, 1.0, 1.0, 0.5]);
        assert_eq!(premultiply(c), [0.5, 0.5, 0.5, 0.5]);
        assert_eq!(to_rgba(BLACK, 1.0), [0.0, 0.0, 0.0, 1.0]);
    }
}
