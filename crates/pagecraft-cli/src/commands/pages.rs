//! Single-document page commands: extract, reorder, delete, rotate.

use std::path::{Path, PathBuf};

use clap::Args;
use console::style;
use tracing::info;

use pagecraft_core::ops::{self, parse_page_list, parse_page_range};

use super::{
    default_output, dispatcher_with_progress, load_config, percent_bar, print_written, read_pdf,
    write_file,
};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input PDF file
    input: PathBuf,

    /// Pages to keep, e.g. "1-3,5,8-10"
    #[arg(short, long)]
    pages: String,

    /// Output file (default: <input>_extracted.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Arguments for the reorder command.
#[derive(Args)]
pub struct ReorderArgs {
    /// Input PDF file
    input: PathBuf,

    /// New page order, e.g. "3,1,2" or "4-1"
    #[arg(long)]
    order: String,

    /// Output file (default: <input>_reordered.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Arguments for the delete command.
#[derive(Args)]
pub struct DeleteArgs {
    /// Input PDF file
    input: PathBuf,

    /// Pages to delete, e.g. "2,4-6"
    #[arg(short, long)]
    pages: String,

    /// Output file (default: <input>_deleted.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Arguments for the rotate command.
#[derive(Args)]
pub struct RotateArgs {
    /// Input PDF file
    input: PathBuf,

    /// Rotation in degrees, a multiple of 90 (negative is counter-clockwise)
    #[arg(short, long, allow_hyphen_values = true)]
    degrees: i32,

    /// Pages to rotate (default: all pages)
    #[arg(short, long)]
    pages: Option<String>,

    /// Output file (default: <input>_rotated.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

/// Read `input` and return its bytes with the page count.
fn load(input: &Path) -> anyhow::Result<(Vec<u8>, u32)> {
    let data = read_pdf(input)?;
    let count = ops::page_count(&data)?;
    info!("{} has {} pages", input.display(), count);
    Ok((data, u32::try_from(count)?))
}

/// Resolve a page selection, failing when nothing in it is a real page.
fn select(text: &str, page_count: u32) -> anyhow::Result<Vec<u32>> {
    let pages = parse_page_range(text, page_count);
    if pages.is_empty() {
        anyhow::bail!(
            "No valid pages in \"{}\" (document has {} pages)",
            text,
            page_count
        );
    }
    Ok(pages)
}

fn finish(output: &Path, data: &[u8]) -> anyhow::Result<()> {
    write_file(output, data)?;
    print_written(output, ops::page_count(data).unwrap_or(0), data.len());
    Ok(())
}

pub async fn extract(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (data, count) = load(&args.input)?;
    let pages = select(&args.pages, count)?;

    let bar = percent_bar("extracting");
    let result = dispatcher_with_progress(&config, &bar).extract(data, pages).await;
    bar.finish_and_clear();

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, "extracted"));
    finish(&output, &result?)
}

pub async fn reorder(args: ReorderArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (data, _) = load(&args.input)?;
    let order = parse_page_list(&args.order)?;

    let bar = percent_bar("reordering");
    let result = dispatcher_with_progress(&config, &bar).reorder(data, order).await;
    bar.finish_and_clear();

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, "reordered"));
    finish(&output, &result?)
}

pub async fn delete(args: DeleteArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (data, count) = load(&args.input)?;
    let pages = select(&args.pages, count)?;
    if pages.len() == count as usize {
        println!(
            "{} Deleting every page leaves an empty document",
            style("⚠").yellow()
        );
    }

    let bar = percent_bar("deleting");
    let result = dispatcher_with_progress(&config, &bar).delete(data, pages).await;
    bar.finish_and_clear();

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, "deleted"));
    finish(&output, &result?)
}

pub async fn rotate(args: RotateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let (data, count) = load(&args.input)?;
    let pages = match &args.pages {
        Some(text) => select(text, count)?,
        None => (1..=count).collect(),
    };

    let bar = percent_bar("rotating");
    let result = dispatcher_with_progress(&config, &bar)
        .rotate(data, pages, args.degrees)
        .await;
    bar.finish_and_clear();

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, "rotated"));
    finish(&output, &result?)
}
