//! Thumbnails command - render page previews to PNG files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use pagecraft_core::thumbnail::ThumbnailResponse;
use pagecraft_core::{BackendKind, ThumbnailService};

use super::{load_config, read_pdf, stem, write_file};

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    ImageLayer,
    Pdfium,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::ImageLayer => BackendKind::ImageLayer,
            BackendArg::Pdfium => BackendKind::Pdfium,
        }
    }
}

/// Arguments for the thumbnails command.
#[derive(Args)]
pub struct ThumbnailsArgs {
    /// Input PDF file
    input: PathBuf,

    /// First page to render
    #[arg(long, default_value = "1")]
    start: u32,

    /// Last page to render (default: last page)
    #[arg(long)]
    end: Option<u32>,

    /// Maximum thumbnail width (overrides config)
    #[arg(long)]
    width: Option<u32>,

    /// Maximum thumbnail height (overrides config)
    #[arg(long)]
    height: Option<u32>,

    /// Rasterization backend (overrides config)
    #[arg(long, value_enum)]
    backend: Option<BackendArg>,

    /// Output directory
    #[arg(short, long, default_value = "thumbnails")]
    output_dir: PathBuf,
}

pub async fn run(args: ThumbnailsArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?.thumbnails;
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(backend) = args.backend {
        config.backend = backend.into();
    }

    let data: Arc<[u8]> = read_pdf(&args.input)?.into();
    let name = stem(&args.input, "document");
    let mut service = ThumbnailService::new(&config).context("Failed to start thumbnail worker")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("rendering {}", args.input.display()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let end = args.end.unwrap_or(u32::MAX);
    if !service.generate_batch(&name, data, args.start, end, config.target()) {
        anyhow::bail!("Thumbnail worker is not running");
    }
    let response = service.recv();
    spinner.finish_and_clear();
    service.shutdown();

    let Some(ThumbnailResponse::BatchReady { results, .. }) = response else {
        anyhow::bail!("Thumbnail worker stopped without a result");
    };

    let mut written = 0;
    let mut failed = 0;
    for result in results {
        match result.outcome {
            Ok(bitmap) => {
                let path = args.output_dir.join(format!("{}_page{}.png", name, result.page));
                write_file(&path, &bitmap.to_png()?)?;
                println!(
                    "{} {} ({}x{})",
                    style("✓").green(),
                    path.display(),
                    bitmap.width(),
                    bitmap.height()
                );
                written += 1;
            }
            Err(e) => {
                warn!("Page {} failed: {}", result.page, e);
                println!("{} page {}: {}", style("✗").red(), result.page, e);
                failed += 1;
            }
        }
    }

    println!();
    println!(
        "{} {} thumbnails, {} failed, in {:?}",
        style("ℹ").blue(),
        written,
        failed,
        start.elapsed()
    );

    if written == 0 && failed > 0 {
        anyhow::bail!("No thumbnails could be rendered");
    }
    Ok(())
}
