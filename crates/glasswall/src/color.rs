use bytemuck::{Pod, Zeroable};

/// Display-encoded 8-bit sRGB color, the form hosts hand to
/// [`GlassWall::add_triangle`](crate::GlassWall::add_triangle).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb8 {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Converts to the packed vertex-stream representation: linear light,
    /// 16 bits per channel, opaque alpha lane.
    pub fn to_linear(self) -> LinearRgba16 {
        LinearRgba16 {
            channels: [
                quantize16(srgb_to_linear(self.r)),
                quantize16(srgb_to_linear(self.g)),
                quantize16(srgb_to_linear(self.b)),
                u16::MAX,
            ],
        }
    }
}

/// One packed per-triangle color: linear fixed-point, 16 bits per channel.
///
/// Blending has to happen in linear light, so the conversion is applied once
/// at pack time rather than per fragment. The fourth lane exists because
/// vertex formats only come in 2- and 4-channel 16-bit flavors; it is packed
/// fully opaque and the shaders never read it.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct LinearRgba16 {
    pub channels: [u16; 4],
}

/// sRGB electro-optical transfer function for one 8-bit channel.
fn srgb_to_linear(channel: u8) -> f32 {
    let c = f32::from(channel) / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn quantize16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearization_preserves_black_and_white() {
        assert_eq!(Rgb8::new(0, 0, 0).to_linear().channels, [0, 0, 0, u16::MAX]);
        assert_eq!(
            Rgb8::new(255, 255, 255).to_linear().channels,
            [u16::MAX; 4]
        );
    }

    #[test]
    fn linearization_is_monotonic() {
        let mut previous = 0u16;
        for value in 0..=255u8 {
            let linear = Rgb8::new(value, 0, 0).to_linear().channels[0];
            assert!(linear >= previous, "sRGB {value} regressed");
            previous = linear;
        }
    }

    #[test]
    fn mid_gray_lands_near_linear_half() {
        // 188/255 display-encoded is the classic "linear 0.5" checkpoint.
        let linear = f32::from(Rgb8::new(188, 188, 188).to_linear().channels[0])
            / f32::from(u16::MAX);
        assert!((linear - 0.5).abs() < 0.01, "got {linear}");
    }

    #[test]
    fn quantization_hits_the_extremes_exactly() {
        assert_eq!(quantize16(0.0), 0);
        assert_eq!(quantize16(1.0), u16::MAX);
        assert_eq!(quantize16(1.5), u16::MAX);
        assert_eq!(quantize16(-0.25), 0);
    }
}
