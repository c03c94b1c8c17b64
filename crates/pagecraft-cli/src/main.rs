//! CLI application for PDF page operations.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{config, info, merge, pages, split, thumbnails, watermark};

/// pagecraft - Merge, split, reorder, watermark and preview PDF pages
#[derive(Parser)]
#[command(name = "pagecraft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge several PDF files into one
    Merge(merge::MergeArgs),

    /// Keep only the selected pages
    Extract(pages::ExtractArgs),

    /// Rearrange pages into a new order
    Reorder(pages::ReorderArgs),

    /// Remove the selected pages
    Delete(pages::DeleteArgs),

    /// Rotate pages by a multiple of 90 degrees
    Rotate(pages::RotateArgs),

    /// Split a PDF into several files
    Split(split::SplitArgs),

    /// Stamp a text watermark across every page
    Watermark(watermark::WatermarkArgs),

    /// Render page thumbnails to PNG
    Thumbnails(thumbnails::ThumbnailsArgs),

    /// Show page count and page sizes
    Info(info::InfoArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Merge(args) => merge::run(args, config_path).await,
        Commands::Extract(args) => pages::extract(args, config_path).await,
        Commands::Reorder(args) => pages::reorder(args, config_path).await,
        Commands::Delete(args) => pages::delete(args, config_path).await,
        Commands::Rotate(args) => pages::rotate(args, config_path).await,
        Commands::Split(args) => split::run(args, config_path).await,
        Commands::Watermark(args) => watermark::run(args, config_path).await,
        Commands::Thumbnails(args) => thumbnails::run(args, config_path).await,
        Commands::Info(args) => info::run(args).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
