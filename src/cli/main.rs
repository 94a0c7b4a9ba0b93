//! Listing canvas CLI
//!
//! Runs the HTTP service or processes local files with the same pipeline.

use super::config::CliConfigBuilder;
use crate::{
    canvas::CanvasSpec,
    config::RemovalBackendKind,
    processor::{ListingProcessor, ProcessorConfig},
    removal::build_remover,
    server,
    services::ImageIOService,
    tracing_config::{init_cli_tracing, TracingFormat},
    validation::validate_listing_image,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use instant::Instant;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Product photo to marketplace listing image service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "listing-canvas")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format (console, compact, json)
    #[arg(long, global = true, default_value = "console")]
    pub log_format: TracingFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service
    Serve(ServeArgs),
    /// Turn local product photos into listing images
    Process(ProcessArgs),
    /// Check an image against marketplace listing rules
    Validate(ValidateArgs),
}

/// Background remover overrides shared by all commands that remove backgrounds
#[derive(Args, Debug, Clone, Default)]
pub struct RemovalArgs {
    /// Removal backend (auto, remote, model, color-key, none)
    #[arg(long)]
    pub removal_backend: Option<RemovalBackendKind>,

    /// ONNX segmentation model for the model backend
    #[arg(long, value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Fail instead of falling back to the original photo
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Bind address [env: HOST]
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port [env: PORT]
    #[arg(long)]
    pub port: Option<u16>,

    #[command(flatten)]
    pub removal: RemovalArgs,
}

#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProcessArgs {
    /// Image files or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Output directory [default: next to each input]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Background preset or hex color
    #[arg(long)]
    pub bg_color: Option<String>,

    /// Draw a soft drop shadow
    #[arg(long)]
    pub shadow: bool,

    /// Product category (sets the fill ratio)
    #[arg(long)]
    pub category: Option<String>,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Filename pattern for directory inputs (e.g. "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Write small preview images instead of full-size canvases
    #[arg(long)]
    pub preview: bool,

    #[command(flatten)]
    pub removal: RemovalArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Image file to check
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_cli_tracing(cli.verbose, cli.log_format).context("Failed to initialize tracing")?;

    match cli.command {
        Command::Serve(args) => {
            let config = CliConfigBuilder::for_serve(&args)?;
            server::serve(config).await.context("Server failed")
        },
        Command::Process(args) => {
            let start = Instant::now();
            let (processed, failed) = process_inputs(&args).await?;
            info!(
                processed,
                failed,
                elapsed_s = %format!("{:.2}", start.elapsed().as_secs_f64()),
                "processing finished"
            );
            if failed > 0 {
                anyhow::bail!("{failed} file(s) failed");
            }
            Ok(())
        },
        Command::Validate(args) => validate_file(&args.input),
    }
}

async fn process_inputs(args: &ProcessArgs) -> Result<(usize, usize)> {
    let config = CliConfigBuilder::for_process(args)?;
    let spec = CliConfigBuilder::canvas_spec(args, &config)?;
    let remover = build_remover(&config).context("Failed to create background remover")?;
    let processor = ListingProcessor::new(remover, ProcessorConfig::from(&config));

    let files = collect_inputs(&args.input, args.recursive, args.pattern.as_deref())?;
    if files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok((0, 0));
    }
    info!(count = files.len(), backend = processor.remover_name(), "found images");

    if let Some(dir) = &args.output {
        if dir.is_file() {
            anyhow::bail!("Output path is a file, not a directory: {}", dir.display());
        }
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    }

    let progress = (files.len() > 1).then(|| {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let mut processed = 0;
    let mut failed = 0;
    for (path, output) in plan_outputs(&files, args.output.as_deref(), args.preview) {
        if let Some(pb) = &progress {
            pb.set_message(path.display().to_string());
        }

        match process_file(&processor, &path, &output, &spec, args.preview).await {
            Ok(()) => processed += 1,
            Err(e) => {
                failed += 1;
                warn!(path = %path.display(), error = %format!("{e:#}"), "failed to process image");
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message("done");
    }
    Ok((processed, failed))
}

async fn process_file(
    processor: &ListingProcessor,
    input: &Path,
    output: &Path,
    spec: &CanvasSpec,
    preview: bool,
) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let result = if preview {
        processor.preview(bytes, spec).await?
    } else {
        processor.process(bytes, spec).await?
    };

    tokio::fs::write(output, &result.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    debug!(
        input = %input.display(),
        output = %output.display(),
        outcome = %result.outcome.header_value(),
        timings = %result.timings.summary(),
        "wrote listing image"
    );
    Ok(())
}

fn validate_file(path: &Path) -> Result<()> {
    let (bytes, image, format) = ImageIOService::load_image_file(path, usize::MAX)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let report = validate_listing_image(&bytes, &image, format);

    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.passed {
        anyhow::bail!("{} does not meet listing requirements", path.display());
    }
    Ok(())
}

/// Expand files and directories into a sorted list of image paths
fn collect_inputs(inputs: &[PathBuf], recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_file() {
            if ImageIOService::is_supported_extension(input) {
                files.push(input.clone());
            } else {
                warn!(path = %input.display(), "Skipping unsupported file");
            }
        } else if input.is_dir() {
            files.extend(find_image_files(input, recursive, pattern)?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                input.display()
            );
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = pattern
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid --pattern")?;
    let max_depth = if recursive { usize::MAX } else { 1 };

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let matches = match (&pattern, path.file_name().and_then(|n| n.to_str())) {
            (Some(pattern), Some(name)) => pattern.matches(name),
            (Some(_), None) => false,
            (None, _) => true,
        };
        if is_generated_output(path) {
            debug!(path = %path.display(), "Skipping previously generated output");
            continue;
        }
        if matches && ImageIOService::is_supported_extension(path) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

const OUTPUT_SUFFIXES: [&str; 2] = ["_listing.jpg", "_preview.jpg"];

/// Files written by `process` itself, which directory walks skip
fn is_generated_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|name| OUTPUT_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

/// `<stem>_listing.jpg` (or `_preview.jpg`) in `output_dir` or next to the input
fn output_path(input: &Path, output_dir: Option<&Path>, preview: bool) -> PathBuf {
    numbered_output_path(input, output_dir, preview, None)
}

fn numbered_output_path(
    input: &Path,
    output_dir: Option<&Path>,
    preview: bool,
    number: Option<usize>,
) -> PathBuf {
    let name = input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let stem = ImageIOService::sanitize_stem(name);
    let suffix = if preview { "preview" } else { "listing" };
    let filename = match number {
        Some(n) => format!("{stem}_{n}_{suffix}.jpg"),
        None => format!("{stem}_{suffix}.jpg"),
    };

    let dir = output_dir
        .or_else(|| input.parent())
        .unwrap_or_else(|| Path::new("."));
    dir.join(filename)
}

/// Pair every input with a distinct output path
///
/// Inputs that would land on the same file (`shoe.jpg` and `shoe.png`, or
/// same-named files from different folders written to one `-o`) get a
/// numbered name instead of overwriting each other.
fn plan_outputs(
    files: &[PathBuf],
    output_dir: Option<&Path>,
    preview: bool,
) -> Vec<(PathBuf, PathBuf)> {
    let mut taken = HashSet::with_capacity(files.len());
    files
        .iter()
        .map(|input| {
            let mut output = output_path(input, output_dir, preview);
            let mut number = 2;
            while !taken.insert(output.clone()) {
                output = numbered_output_path(input, output_dir, preview, Some(number));
                number += 1;
            }
            if number > 2 {
                warn!(
                    input = %input.display(),
                    output = %output.display(),
                    "Output name already used in this run, writing to a numbered file"
                );
            }
            (input.clone(), output)
        })
        .collect()
}
