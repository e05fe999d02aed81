// THEORY:
// Compositing happens in two stages.
//
// 1.  **Hard mask**: every pixel whose grayscale heat is at or below `threshold`
//     is "cold" and keeps the untouched source pixel; every other pixel takes
//     the full-strength palette color.
//
//         merged = original * mask + colorized * (1 - mask)
//
// 2.  **Soft blend**: the merged image is laid over the original with a uniform
//     weight, so hot regions read as a translucent tint.
//
//         final = original * (1 - alpha) + merged * alpha
//
// Cold pixels come out of both stages identical to the source, so negligible
// attention never tints the image.

use crate::core_modules::colormap::apply_jet;
use crate::core_modules::density_map::DensityField;
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};

/// Resizes the grayscale heatmap to `width x height` (bilinear) when its
/// dimensions differ; otherwise returns it unchanged.
pub fn fit_to_canvas(gray: GrayImage, width: u32, height: u32) -> GrayImage {
    if gray.dimensions() == (width, height) {
        gray
    } else {
        imageops::resize(&gray, width, height, FilterType::Triangle)
    }
}

/// True where the heat value marks a cold, low-attention pixel.
pub fn is_cold(heat: u8, threshold: u8) -> bool {
    heat <= threshold
}

/// Runs the mask-then-blend composite. All three images must share dimensions.
pub fn mask_and_blend(original: &RgbImage, gray: &GrayImage, colorized: &RgbImage, threshold: u8, alpha: f32) -> RgbImage {
    debug_assert_eq!(original.dimensions(), gray.dimensions());
    debug_assert_eq!(original.dimensions(), colorized.dimensions());

    RgbImage::from_fn(original.width(), original.height(), |x, y| {
        let source = original.get_pixel(x, y);
        let merged = if is_cold(gray.get_pixel(x, y).0[0], threshold) {
            source
        } else {
            colorized.get_pixel(x, y)
        };
        weighted(source, merged, alpha)
    })
}

fn weighted(source: &Rgb<u8>, overlay: &Rgb<u8>, alpha: f32) -> Rgb<u8> {
    let mix = |a: u8, b: u8| (f32::from(a) * (1.0 - alpha) + f32::from(b) * alpha).round().clamp(0.0, 255.0) as u8;
    Rgb([
        mix(source.0[0], overlay.0[0]),
        mix(source.0[1], overlay.0[1]),
        mix(source.0[2], overlay.0[2]),
    ])
}

/// Turns an accumulated field into the final picture.
///
/// With a canvas the heatmap is fitted to it, colorized and composited; without
/// one the bare colorized heatmap is returned.
pub fn render_overlay(field: &DensityField, canvas: Option<&RgbImage>, threshold: u8, alpha: f32) -> RgbImage {
    let gray = field.to_gray();
    match canvas {
        Some(original) => {
            let gray = fit_to_canvas(gray, original.width(), original.height());
            let colorized = apply_jet(&gray);
            mask_and_blend(original, &gray, &colorized, threshold, alpha)
        }
        None => apply_jet(&gray),
    }
}
