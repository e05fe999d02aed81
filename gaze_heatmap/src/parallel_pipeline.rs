// THEORY:
// The upload flow takes an arbitrary CSV/image pair that is not tied to a stored
// user record and produces one heatmap per distinct user found in the CSV.
// Users are independent: each one reads the shared, immutable canvas and
// writes only its own `heatmap_user_<id>.png`, so the work fans out across a
// pool of blocking workers with no cross-user synchronization. A semaphore
// sized from the CPU count bounds how many renders run at once.

use crate::core_modules::fixation_table::{FixationSource, FixationTable};
use crate::core_modules::utils::image_helper::{ensure_dir, load_canvas};
use crate::error::{HeatmapError, Result};
use crate::pipeline::{check_user_id, persist, render_table, HeatmapReport, RenderParams};
use image::RgbImage;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct BatchPipeline {
    params: RenderParams,
    max_workers: usize,
}

impl BatchPipeline {
    pub fn new(params: RenderParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params, max_workers: num_cpus::get().max(1) })
    }

    /// Caps the number of users rendered concurrently.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    /// Renders one heatmap per user in `csv_path` over `image_path`.
    ///
    /// Reports come back in the order users first appear in the CSV. An
    /// undecodable image yields a single `ImageLoad` report; rows whose
    /// username cannot be used as a file name are skipped.
    pub async fn process_upload(&self, csv_path: &Path, image_path: &Path, output_dir: &Path) -> Result<Vec<HeatmapReport>> {
        let (csv, image) = (csv_path.to_path_buf(), image_path.to_path_buf());
        let (fixations, canvas) = tokio::task::spawn_blocking(move || (FixationSource::from_path(&csv), load_canvas(&image)))
            .await
            .map_err(|e| HeatmapError::Worker(e.to_string()))?;
        let fixations = fixations?;

        let canvas = match canvas {
            Ok(canvas) => Arc::new(canvas),
            Err(e) => {
                warn!("uploaded image {} could not be loaded: {e}", image_path.display());
                return Ok(vec![HeatmapReport::ImageLoad { path: image_path.to_path_buf(), reason: e.to_string() }]);
            }
        };

        let tables: Vec<FixationTable> = fixations
            .partition_by_user()
            .into_iter()
            .filter(|table| match check_user_id(table.user_id()) {
                Ok(()) => true,
                Err(e) => {
                    warn!("skipping {} upload rows: {e}", table.len());
                    false
                }
            })
            .collect();
        if tables.is_empty() {
            info!("upload {} has no usable fixation rows", csv_path.display());
            return Ok(Vec::new());
        }

        ensure_dir(output_dir)?;
        debug!("rendering {} users with up to {} workers", tables.len(), self.max_workers);

        let permits = Arc::new(Semaphore::new(self.max_workers));
        let jobs = tables.into_iter().map(|table| {
            let permits = Arc::clone(&permits);
            let canvas = Arc::clone(&canvas);
            let output_dir = output_dir.to_path_buf();
            let params = self.params;
            async move {
                let _permit = permits.acquire_owned().await.map_err(|e| HeatmapError::Worker(e.to_string()))?;
                tokio::task::spawn_blocking(move || render_user(&table, &canvas, &output_dir, &params))
                    .await
                    .map_err(|e| HeatmapError::Worker(e.to_string()))?
            }
        });

        let reports = futures::future::join_all(jobs).await.into_iter().collect::<Result<Vec<_>>>()?;
        info!("created {} heatmaps from upload {}", reports.len(), csv_path.display());
        Ok(reports)
    }
}

fn render_user(table: &FixationTable, canvas: &RgbImage, output_dir: &Path, params: &RenderParams) -> Result<HeatmapReport> {
    let heatmap = render_table(table, canvas, params)?;
    let path = persist(output_dir, table.user_id(), &heatmap)?;
    Ok(HeatmapReport::Saved(path))
}
