use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use gaze_heatmap::{BatchPipeline, HeatmapPipeline, HeatmapReport, PipelineConfig, RenderParams};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Render gaze-fixation heatmaps over a stimulus image")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate the dashboard heatmap for one user
    User(UserArgs),
    /// Render one heatmap per user found in an uploaded CSV
    Upload(UploadArgs),
}

#[derive(Args, Debug)]
struct UserArgs {
    /// Username as stored in the fixation CSV
    user_id: String,

    /// Directory the relative paths below are resolved against
    #[arg(long, env = "GAZE_HEATMAP_ROOT", default_value = ".")]
    root: PathBuf,

    /// Fixation CSV with username, gaze_x and gaze_y columns
    #[arg(long, default_value = "gazedataeye.csv")]
    csv: PathBuf,

    /// Stimulus image the fixations were recorded on
    #[arg(long, default_value = "newspp.jpg")]
    image: PathBuf,

    /// Directory receiving heatmap_user_<id>.png
    #[arg(long, default_value = "static/heatmaps")]
    output_dir: PathBuf,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Uploaded fixation CSV
    csv: PathBuf,

    /// Uploaded stimulus image
    image: PathBuf,

    #[arg(long, default_value = "heatmap")]
    output_dir: PathBuf,

    /// Maximum number of users rendered at once (defaults to the CPU count)
    #[arg(long)]
    workers: Option<usize>,

    #[command(flatten)]
    render: RenderArgs,
}

/// Overrides for the preset render parameters.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Full width at half maximum of each fixation's blob, in pixels
    #[arg(long)]
    sigma: Option<f64>,

    /// Heat at or below this keeps the original pixel (0-255)
    #[arg(long)]
    threshold: Option<u8>,

    /// Overlay weight in the final blend (0-1)
    #[arg(long)]
    alpha: Option<f32>,
}

impl RenderArgs {
    fn apply(&self, mut params: RenderParams) -> RenderParams {
        if let Some(sigma) = self.sigma {
            params.sigma = sigma;
        }
        if let Some(threshold) = self.threshold {
            params.threshold = threshold;
        }
        if let Some(alpha) = self.alpha {
            params.alpha = alpha;
        }
        params
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::User(args) => run_user(args),
        Command::Upload(args) => run_upload(args).await,
    }
}

fn run_user(args: UserArgs) -> Result<()> {
    let config = PipelineConfig {
        fixation_csv: args.csv,
        stimulus_image: args.image,
        output_dir: args.output_dir,
        render: args.render.apply(RenderParams::dashboard()),
        ..PipelineConfig::new(args.root)
    };
    let pipeline = HeatmapPipeline::new(config).context("invalid heatmap configuration")?;

    match pipeline
        .generate_heatmap(&args.user_id)
        .with_context(|| format!("failed to generate heatmap for user {}", args.user_id))?
    {
        HeatmapReport::Saved(path) => {
            println!("{}", path.display());
            Ok(())
        }
        HeatmapReport::NoData { user_id } => bail!("no gaze data available for user {user_id}"),
        HeatmapReport::ImageLoad { path, reason } => {
            bail!("stimulus image {} could not be loaded: {reason}", path.display())
        }
    }
}

async fn run_upload(args: UploadArgs) -> Result<()> {
    let mut pipeline =
        BatchPipeline::new(args.render.apply(RenderParams::upload())).context("invalid render parameters")?;
    if let Some(workers) = args.workers {
        pipeline = pipeline.with_workers(workers);
    }

    let reports = pipeline
        .process_upload(&args.csv, &args.image, &args.output_dir)
        .await
        .with_context(|| format!("error processing {} and {}", args.csv.display(), args.image.display()))?;

    if let [HeatmapReport::ImageLoad { path, reason }] = reports.as_slice() {
        bail!("uploaded image {} could not be loaded: {reason}", path.display());
    }
    for path in reports.iter().filter_map(HeatmapReport::path) {
        println!("{}", path.display());
    }
    info!("successfully created {} heatmaps", reports.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn user_flags_override_dashboard_preset() {
        let cli = Cli::try_parse_from(["heatmap_tester", "user", "11224498", "--alpha", "0.4", "--threshold", "12"]).unwrap();
        let Command::User(args) = cli.command else { panic!("expected user subcommand") };
        let params = args.render.apply(RenderParams::dashboard());
        assert_eq!(params.alpha, 0.4);
        assert_eq!(params.threshold, 12);
        assert_eq!(params.sigma, 25.0);
        assert_eq!(args.output_dir, PathBuf::from("static/heatmaps"));
    }

    #[test]
    fn upload_takes_csv_and_image() {
        let cli = Cli::try_parse_from(["heatmap_tester", "upload", "a.csv", "b.png", "--workers", "3"]).unwrap();
        let Command::Upload(args) = cli.command else { panic!("expected upload subcommand") };
        assert_eq!(args.csv, PathBuf::from("a.csv"));
        assert_eq!(args.image, PathBuf::from("b.png"));
        assert_eq!(args.workers, Some(3));
        assert_eq!(args.render.apply(RenderParams::upload()), RenderParams::upload());
    }
}
