// THEORY:
// This file is the entry point for the `gaze_heatmap` library crate. It exposes
// two operations as the public surface:
//
// - `pipeline`: the per-user path. A validated user id goes in, one
//   `heatmap_user_<id>.png` (or a typed "no data" / "bad image" report) comes
//   out.
// - `parallel_pipeline`: the upload path. An arbitrary CSV/image pair goes in,
//   one heatmap per user in the CSV comes out.
//
// The building blocks in `core_modules` (Gaussian fields, fixation tables,
// density accumulation, palette, compositing) are public for callers that
// need a single stage on its own.

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::HeatmapError;
pub use parallel_pipeline::BatchPipeline;
pub use pipeline::{generate_heatmap, heatmap_filename, HeatmapPipeline, HeatmapReport, PipelineConfig, RenderParams};
