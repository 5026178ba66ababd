use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crackscan::config::get_configuration;
use crackscan::detection::annotate::label_for;
use crackscan::{history, Classifier, Detector, Settings};

#[derive(Parser)]
#[command(name = "crackscan")]
#[command(about = "Detect and outline cracks in wall and surface photos")]
struct Cli {
    /// YAML configuration file (defaults to ./crackscan.yaml if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, outline and save annotated copies of images
    Detect(DetectArgs),
    /// Only print the crack probability of each image
    Score(ScoreArgs),
    /// List previously saved detections, newest first
    History(HistoryArgs),
}

#[derive(Args)]
struct ModelArgs {
    /// Path to the classifier model (.rten or .onnx)
    #[arg(long, value_name = "FILE")]
    model: Option<PathBuf>,

    /// Print one JSON object per line instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct DetectArgs {
    /// Input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,

    /// Probability at or above which an image counts as cracked
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Directory for annotated images
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Save intermediate masks to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,
}

#[derive(Args)]
struct ScoreArgs {
    /// Input image files
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,
}

#[derive(Args)]
struct HistoryArgs {
    /// Directory to scan (defaults to the configured output directory)
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    #[arg(long)]
    json: bool,
}

fn init_tracing(settings: &Settings, verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { settings.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("crackscan={default_level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = get_configuration(cli.config.as_deref())?;
    init_tracing(&settings, cli.verbose, cli.log_json);

    match cli.command {
        Commands::Detect(args) => run_detect(&mut settings, args),
        Commands::Score(args) => run_score(&mut settings, args),
        Commands::History(args) => run_history(&settings, args),
    }
}

fn apply_model_args(settings: &mut Settings, args: &ModelArgs) {
    if let Some(model) = &args.model {
        settings.model.path = Some(model.clone());
    }
}

fn run_detect(settings: &mut Settings, args: DetectArgs) -> anyhow::Result<()> {
    apply_model_args(settings, &args.model);
    if let Some(threshold) = args.threshold {
        settings.detection.confidence_threshold = threshold;
    }
    if let Some(dir) = args.output_dir {
        settings.storage.output_dir = dir;
    }
    if let Some(dir) = args.debug_out {
        settings.debug_dir = Some(dir);
    }
    settings.validate().map_err(anyhow::Error::msg)?;

    let detector = Detector::from_settings(settings).context("failed to set up detector")?;

    let mut failed = 0usize;
    for image in &args.images {
        match detector.detect(image) {
            Ok(analysis) => {
                if args.model.json {
                    println!("{}", serde_json::to_string(&analysis)?);
                } else {
                    let label = label_for(analysis.outcome, analysis.probability);
                    println!(
                        "{}: {} [{}] regions={} -> {}",
                        image.display(),
                        label.text,
                        analysis.severity,
                        analysis.regions.len(),
                        analysis.output_path.display()
                    );
                }
            }
            Err(e) => {
                failed += 1;
                error!(image = %image.display(), error = %e, "detection failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", args.images.len());
    }
    Ok(())
}

fn run_score(settings: &mut Settings, args: ScoreArgs) -> anyhow::Result<()> {
    apply_model_args(settings, &args.model);
    let classifier = Classifier::new(settings.model_path()?)?;
    let threshold = settings.detection.confidence_threshold;

    let mut failed = 0usize;
    for image in &args.images {
        match classifier.detect(image) {
            Ok(result) => {
                let is_crack = result.is_crack(threshold);
                if args.model.json {
                    let line = serde_json::json!({
                        "source": image,
                        "probability": result.probability,
                        "severity": result.severity(),
                        "crack": is_crack,
                    });
                    println!("{line}");
                } else {
                    println!(
                        "{}: {:.4} ({}){}",
                        image.display(),
                        result.probability,
                        result.severity(),
                        if is_crack { " crack" } else { "" }
                    );
                }
            }
            Err(e) => {
                failed += 1;
                error!(image = %image.display(), error = %e, "scoring failed");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", args.images.len());
    }
    Ok(())
}

fn run_history(settings: &Settings, args: HistoryArgs) -> anyhow::Result<()> {
    let dir = args.dir.unwrap_or_else(|| settings.storage.output_dir.clone());
    let entries = history::scan(&dir)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No detections in {}", dir.display());
        return Ok(());
    }

    for entry in &entries {
        let confidence = entry
            .confidence
            .map(|c| format!("{c:.4}"))
            .unwrap_or_else(|| "-".to_string());
        println!("{}  {}  {}", confidence, entry.severity, entry.file_name);
    }
    Ok(())
}
