use crate::error::{HeatmapError, Result};
use image::{ImageEncoder, RgbImage};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Decodes any raster format the `image` crate understands into 3-channel RGB.
pub fn load_canvas(path: &Path) -> std::result::Result<RgbImage, image::ImageError> {
    Ok(image::open(path)?.to_rgb8())
}

/// Creates `dir` and its parents if they are missing.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| HeatmapError::Io { path: dir.to_path_buf(), source })
}

/// Encodes `image` as PNG next to `path` and renames it into place, so readers
/// never observe a partially written file. An existing file is replaced.
pub fn save_png_atomic(path: &Path, image: &RgbImage) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_err = |source| HeatmapError::Io { path: path.to_path_buf(), source };

    let mut staged = tempfile::Builder::new()
        .prefix(".heatmap-")
        .suffix(".png.tmp")
        .tempfile_in(dir)
        .map_err(io_err)?;
    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        let encoder = image::codecs::png::PngEncoder::new(&mut writer);
        encoder
            .write_image(image.as_raw(), image.width(), image.height(), image::ExtendedColorType::Rgb8)
            .map_err(|source| HeatmapError::Encode { path: path.to_path_buf(), source })?;
        writer.flush().map_err(io_err)?;
    }
    staged.as_file().sync_all().map_err(io_err)?;
    staged.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
