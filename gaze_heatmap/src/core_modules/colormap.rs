// Jet palette: dark blue -> blue -> cyan -> yellow -> red -> dark red as the
// 8-bit intensity goes from 0 to 255. Each channel is a clamped triangle
// ramp over t = v / 255:
//   red   = clamp(1.5 - |4t - 3|)
//   green = clamp(1.5 - |4t - 2|)
//   blue  = clamp(1.5 - |4t - 1|)
// The 256 entries are computed once into a `OnceLock` table so the per-pixel
// cost is a lookup.

use image::{GrayImage, Rgb, RgbImage};
use std::sync::OnceLock;

static JET_LUT: OnceLock<[Rgb<u8>; 256]> = OnceLock::new();

fn jet_lut() -> &'static [Rgb<u8>; 256] {
    JET_LUT.get_or_init(|| {
        let mut lut = [Rgb([0u8; 3]); 256];
        for (v, entry) in lut.iter_mut().enumerate() {
            let t = v as f32 / 255.0;
            *entry = Rgb([ramp(t, 3.0), ramp(t, 2.0), ramp(t, 1.0)]);
        }
        lut
    })
}

fn ramp(t: f32, offset: f32) -> u8 {
    let level = (1.5 - (4.0 * t - offset).abs()).clamp(0.0, 1.0);
    (level * 255.0).round() as u8
}

/// Palette color for one 8-bit intensity.
pub fn jet(value: u8) -> Rgb<u8> {
    jet_lut()[value as usize]
}

/// Maps a grayscale heatmap through the jet palette.
pub fn apply_jet(gray: &GrayImage) -> RgbImage {
    let lut = jet_lut();
    RgbImage::from_fn(gray.width(), gray.height(), |x, y| lut[gray.get_pixel(x, y).0[0] as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_blue_and_red() {
        let Rgb([r, g, b]) = jet(0);
        assert_eq!((r, g), (0, 0));
        assert!(b >= 127);

        let Rgb([r, g, b]) = jet(255);
        assert!(r >= 127);
        assert_eq!((g, b), (0, 0));
    }

    #[test]
    fn ramp_passes_through_green_and_yellow() {
        let Rgb([_, g, _]) = jet(128);
        assert_eq!(g, 255);
        let Rgb([r, g, b]) = jet(159);
        assert!(r > 200 && g > 200 && b < 60, "expected yellow, got {r},{g},{b}");
    }

    #[test]
    fn dominant_channel_moves_from_blue_to_red() {
        let dominant = |v: u8| {
            let Rgb([r, g, b]) = jet(v);
            if b > g && b > r {
                'b'
            } else if g > r && g > b {
                'g'
            } else {
                'r'
            }
        };
        assert!((0..=80).all(|v| dominant(v) == 'b'));
        assert!((100..=150).all(|v| dominant(v) == 'g'));
        assert!((200..=255).all(|v| dominant(v) == 'r'));
    }

    #[test]
    fn apply_maps_every_pixel() {
        let gray = GrayImage::from_fn(4, 2, |x, _| image::Luma([(x * 80) as u8]));
        let color = apply_jet(&gray);
        assert_eq!(color.dimensions(), (4, 2));
        for (x, y, px) in color.enumerate_pixels() {
            assert_eq!(*px, jet(gray.get_pixel(x, y).0[0]));
        }
    }
}
