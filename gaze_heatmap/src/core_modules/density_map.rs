// THEORY:
// The `DensityField` is the accumulation buffer for a single request. It owns an
// `H x W` grid of `f32` cells, one per canvas pixel, into which every fixation
// adds its Gaussian blob. Addition is commutative, so the order in which
// fixations arrive does not change the result beyond float rounding.
//
// Once every fixation is in, the field is normalized so the hottest cell maps to
// 255 regardless of how many fixations were recorded, and quantized to 8 bits
// with truncation (`as u8`), never rounding. An all-zero field stays all zero.

use crate::core_modules::fixation_table::FixationPoint;
use crate::core_modules::gaussian_mask::{accumulate_gaussian, check_dimensions, check_peak, check_sigma};
use crate::error::Result;
use image::GrayImage;
use log::debug;
use ndarray::Array2;

#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    grid: Array2<f32>,
}

impl DensityField {
    /// An all-zero field for a `width x height` canvas.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(Self { grid: Array2::zeros((height as usize, width as usize)) })
    }

    /// Accumulates one Gaussian per fixation. Points must already be in
    /// canvas pixel space.
    pub fn from_fixations(width: u32, height: u32, points: &[FixationPoint], sigma: f64, peak: f64) -> Result<Self> {
        check_sigma(sigma)?;
        check_peak(peak)?;
        let mut field = Self::new(width, height)?;
        let mut contributed = 0usize;
        for (n, point) in points.iter().enumerate() {
            if field.add_fixation(*point, sigma, peak) {
                contributed += 1;
            }
            if (n + 1) % 100 == 0 {
                debug!("accumulated {}/{} fixations", n + 1, points.len());
            }
        }
        debug!("density field {width}x{height}: {contributed} of {} fixations contributed", points.len());
        Ok(field)
    }

    /// Adds a single fixation. NaN fixations are skipped and return `false`.
    pub fn add_fixation(&mut self, point: FixationPoint, sigma: f64, peak: f64) -> bool {
        accumulate_gaussian(&mut self.grid, sigma, (point.x, point.y), peak)
    }

    pub fn width(&self) -> u32 {
        self.grid.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.grid.nrows() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.grid[(y as usize, x as usize)]
    }

    pub fn grid(&self) -> &Array2<f32> {
        &self.grid
    }

    pub fn max(&self) -> f32 {
        self.grid.iter().copied().fold(0.0, f32::max)
    }

    /// Normalizes to `[0, 255]` and truncates to 8 bits.
    pub fn to_gray(&self) -> GrayImage {
        let max = self.max();
        let mut gray = GrayImage::new(self.width(), self.height());
        for ((y, x), &value) in self.grid.indexed_iter() {
            let scaled = if max != 0.0 { value / max * 255.0 } else { value };
            gray.put_pixel(x as u32, y as u32, image::Luma([scaled as u8]));
        }
        gray
    }
}
