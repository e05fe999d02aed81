// Example runner: regenerates the sample user's heatmap from the files in the
// given directory (default: the current one).

use gaze_heatmap::{HeatmapPipeline, HeatmapReport, PipelineConfig};
use log::{error, info};
use std::process::ExitCode;

const SAMPLE_USER: &str = "11224498";

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let pipeline = match HeatmapPipeline::new(PipelineConfig::new(root)) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match pipeline.generate_heatmap(SAMPLE_USER) {
        Ok(HeatmapReport::Saved(path)) => {
            info!("heatmap generated: {}", path.display());
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!("could not generate heatmap: {report:?}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("could not generate heatmap: {e}");
            ExitCode::FAILURE
        }
    }
}
