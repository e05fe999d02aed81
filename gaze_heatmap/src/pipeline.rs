// THEORY:
// The `pipeline` module is the top-level API for per-user heatmap generation.
// It takes a validated user identifier and produces one artifact,
// `heatmap_user_<id>.png`, in the configured output directory.
//
// Stages, in order:
// 1.  **Select**: pick the user's rows out of the fixation source. No rows is
//     an expected outcome, reported as `HeatmapReport::NoData`.
// 2.  **Load**: decode the stimulus image. A missing or corrupt image is
//     reported as `HeatmapReport::ImageLoad`, before any fixation is touched.
// 3.  **Normalize**: stretch raw tracker coordinates over the canvas.
// 4.  **Accumulate**: one Gaussian per fixation into a `DensityField`.
// 5.  **Composite**: quantize, colorize and mask-and-blend over the image.
// 6.  **Persist**: atomically replace the user's artifact.
//
// Every path the pipeline touches is resolved against an injected `root`, so
// nothing depends on the process working directory.

use crate::core_modules::compositor::render_overlay;
use crate::core_modules::density_map::DensityField;
use crate::core_modules::fixation_table::{FixationSource, FixationTable};
use crate::core_modules::gaussian_mask::{check_peak, check_sigma, DEFAULT_PEAK, FIXATION_SIGMA};
use crate::core_modules::utils::image_helper::{ensure_dir, load_canvas, save_png_atomic};
use crate::error::{HeatmapError, Result};
use image::RgbImage;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Tunables for turning fixations into a composited heatmap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderParams {
    /// Full width at half maximum of each fixation's Gaussian, in pixels.
    pub sigma: f64,
    /// Amplitude each fixation contributes at its center.
    pub peak: f64,
    /// Heat values at or below this keep the untouched source pixel.
    pub threshold: u8,
    /// Weight of the merged overlay in the final blend.
    pub alpha: f32,
}

impl RenderParams {
    /// Settings for the per-user dashboard artifact.
    pub fn dashboard() -> Self {
        Self { sigma: FIXATION_SIGMA, peak: DEFAULT_PEAK, threshold: 5, alpha: 0.7 }
    }

    /// Settings for heatmaps made from an uploaded CSV/image pair.
    pub fn upload() -> Self {
        Self { sigma: FIXATION_SIGMA, peak: DEFAULT_PEAK, threshold: 10, alpha: 0.5 }
    }

    pub fn validate(&self) -> Result<()> {
        check_sigma(self.sigma)?;
        check_peak(self.peak)?;
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(HeatmapError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }
}

impl Default for RenderParams {
    fn default() -> Self {
        Self::dashboard()
    }
}

/// Where the pipeline finds its inputs and puts its outputs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Filesystem root every relative path below is resolved against.
    pub root: PathBuf,
    /// CSV export with `username`, `gaze_x` and `gaze_y` columns.
    pub fixation_csv: PathBuf,
    /// The stimulus image the fixations were recorded on.
    pub stimulus_image: PathBuf,
    /// Directory receiving `heatmap_user_<id>.png` artifacts.
    pub output_dir: PathBuf,
    pub render: RenderParams,
}

impl PipelineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fixation_csv: PathBuf::from("gazedataeye.csv"),
            stimulus_image: PathBuf::from("newspp.jpg"),
            output_dir: PathBuf::from("static/heatmaps"),
            render: RenderParams::dashboard(),
        }
    }

    /// Joins `path` onto the root unless it is already absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    pub fn fixation_csv_path(&self) -> PathBuf {
        self.resolve(&self.fixation_csv)
    }

    pub fn stimulus_image_path(&self) -> PathBuf {
        self.resolve(&self.stimulus_image)
    }

    pub fn output_dir_path(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    /// The artifact path for `user_id` under this configuration.
    pub fn output_path_for(&self, user_id: &str) -> PathBuf {
        self.output_dir_path().join(heatmap_filename(user_id))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// The outcome of a heatmap request that did not fail outright.
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapReport {
    /// The artifact was written to this path.
    Saved(PathBuf),
    /// No fixation rows belong to the user.
    NoData { user_id: String },
    /// The stimulus image could not be decoded.
    ImageLoad { path: PathBuf, reason: String },
}

impl HeatmapReport {
    pub fn path(&self) -> Option<&Path> {
        match self {
            HeatmapReport::Saved(path) => Some(path),
            _ => None,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, HeatmapReport::Saved(_))
    }
}

/// The artifact file name for `user_id`. Web collaborators build URLs from
/// this pattern, so it must not change.
pub fn heatmap_filename(user_id: &str) -> String {
    format!("heatmap_user_{user_id}.png")
}

pub(crate) fn check_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() || user_id.contains(['/', '\\']) || user_id == "." || user_id == ".." {
        return Err(HeatmapError::InvalidUserId(user_id.to_string()));
    }
    Ok(())
}

/// Generates the heatmap for one user from explicit inputs.
///
/// `NoData` and `ImageLoad` come back as reports; only invalid parameters and
/// write failures are errors.
pub fn generate_heatmap(
    user_id: &str,
    image_path: &Path,
    fixations: &FixationSource,
    output_dir: &Path,
    params: &RenderParams,
) -> Result<HeatmapReport> {
    check_user_id(user_id)?;
    params.validate()?;

    let Some(table) = fixations.select_user(user_id) else {
        warn!("no gaze data for user {user_id}");
        return Ok(HeatmapReport::NoData { user_id: user_id.to_string() });
    };

    let canvas = match load_canvas(image_path) {
        Ok(canvas) => canvas,
        Err(e) => {
            warn!("stimulus image {} could not be loaded: {e}", image_path.display());
            return Ok(HeatmapReport::ImageLoad { path: image_path.to_path_buf(), reason: e.to_string() });
        }
    };

    let heatmap = render_table(&table, &canvas, params)?;
    let path = persist(output_dir, user_id, &heatmap)?;
    Ok(HeatmapReport::Saved(path))
}

/// Normalizes, accumulates and composites one user's fixations over `canvas`.
pub fn render_table(table: &FixationTable, canvas: &RgbImage, params: &RenderParams) -> Result<RgbImage> {
    let (width, height) = canvas.dimensions();
    let points = table.normalized(width, height);
    let field = DensityField::from_fixations(width, height, &points, params.sigma, params.peak)?;
    Ok(render_overlay(&field, Some(canvas), params.threshold, params.alpha))
}

pub(crate) fn persist(output_dir: &Path, user_id: &str, heatmap: &RgbImage) -> Result<PathBuf> {
    ensure_dir(output_dir)?;
    let path = output_dir.join(heatmap_filename(user_id));
    save_png_atomic(&path, heatmap)?;
    info!("heatmap saved at {}", path.display());
    Ok(path)
}

/// Per-user heatmap generation bound to a `PipelineConfig`.
pub struct HeatmapPipeline {
    config: PipelineConfig,
}

impl HeatmapPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.render.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Regenerates `heatmap_user_<user_id>.png` from the configured CSV and
    /// stimulus image. An unreadable CSV is an error.
    pub fn generate_heatmap(&self, user_id: &str) -> Result<HeatmapReport> {
        let fixations = FixationSource::from_path(&self.config.fixation_csv_path())?;
        self.generate_heatmap_from(user_id, &fixations)
    }

    /// Same as [`Self::generate_heatmap`] with an already loaded fixation source.
    pub fn generate_heatmap_from(&self, user_id: &str, fixations: &FixationSource) -> Result<HeatmapReport> {
        generate_heatmap(
            user_id,
            &self.config.stimulus_image_path(),
            fixations,
            &self.config.output_dir_path(),
            &self.config.render,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::fixation_table::FixationPoint;
    use image::Rgb;

    #[test]
    fn filename_follows_contract() {
        assert_eq!(heatmap_filename("11224498"), "heatmap_user_11224498.png");
        assert_eq!(heatmap_filename("Admin"), "heatmap_user_Admin.png");
    }

    #[test]
    fn config_resolves_against_root() {
        let config = PipelineConfig::new("/srv/gaze");
        assert_eq!(config.fixation_csv_path(), PathBuf::from("/srv/gaze/gazedataeye.csv"));
        assert_eq!(
            config.output_path_for("7"),
            PathBuf::from("/srv/gaze/static/heatmaps/heatmap_user_7.png")
        );
    }

    #[test]
    fn presets_match_entry_points() {
        assert_eq!(RenderParams::dashboard().threshold, 5);
        assert_eq!(RenderParams::dashboard().alpha, 0.7);
        assert_eq!(RenderParams::upload().threshold, 10);
        assert_eq!(RenderParams::upload().sigma, 25.0);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let mut params = RenderParams::dashboard();
        params.alpha = 1.5;
        assert!(matches!(params.validate(), Err(HeatmapError::InvalidAlpha(_))));
        params.alpha = 0.7;
        params.sigma = 0.0;
        assert!(matches!(params.validate(), Err(HeatmapError::InvalidSigma(_))));
        params.sigma = 25.0;
        for peak in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            params.peak = peak;
            assert!(matches!(params.validate(), Err(HeatmapError::InvalidPeak(_))), "{peak}");
        }

        let mut config = PipelineConfig::default();
        config.render.alpha = -0.1;
        assert!(HeatmapPipeline::new(config).is_err());
    }

    #[test]
    fn path_like_user_ids_are_rejected() {
        for id in ["", "../etc", "a/b", "a\\b", ".."] {
            assert!(matches!(check_user_id(id), Err(HeatmapError::InvalidUserId(_))), "{id:?}");
        }
        assert!(check_user_id("11224498").is_ok());
    }

    #[test]
    fn render_table_fills_canvas() {
        let table = FixationTable::new(
            "u",
            vec![FixationPoint::new(0.0, 0.0), FixationPoint::new(1.0, 1.0)],
        );
        let canvas = RgbImage::from_pixel(24, 16, Rgb([10, 20, 30]));
        let out = render_table(&table, &canvas, &RenderParams::dashboard()).unwrap();
        assert_eq!(out.dimensions(), (24, 16));
    }
}
