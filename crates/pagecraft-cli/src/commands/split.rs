//! Split command - cut a document into parts.

use std::path::PathBuf;

use clap::Args;
use console::style;

use pagecraft_core::ops::{self, parse_page_list};
use pagecraft_core::SplitMode;

use super::{
    dispatcher_with_progress, load_config, percent_bar, print_written, read_pdf, stem, write_file,
};

/// Arguments for the split command.
#[derive(Args)]
pub struct SplitArgs {
    /// Input PDF file
    input: PathBuf,

    /// Pages after which a new part starts, e.g. "2,5"
    #[arg(long, conflicts_with = "every", required_unless_present = "every")]
    after: Option<String>,

    /// Start a new part every N pages
    #[arg(long)]
    every: Option<u32>,

    /// Output directory (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

impl SplitArgs {
    fn mode(&self) -> anyhow::Result<SplitMode> {
        match (&self.after, self.every) {
            (Some(points), _) => Ok(SplitMode::AfterPages(parse_page_list(points)?)),
            (None, Some(n)) => Ok(SplitMode::Every(n)),
            (None, None) => anyhow::bail!("Either --after or --every is required"),
        }
    }
}

pub async fn run(args: SplitArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let mode = args.mode()?;
    let data = read_pdf(&args.input)?;

    let bar = percent_bar("splitting");
    let parts = dispatcher_with_progress(&config, &bar).split(data, mode).await;
    bar.finish_and_clear();
    let parts = parts?;

    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => args
            .input
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let name = stem(&args.input, "document");

    for (i, part) in parts.iter().enumerate() {
        let path = output_dir.join(format!("{}_part{}.pdf", name, i + 1));
        write_file(&path, part)?;
        print_written(&path, ops::page_count(part).unwrap_or(0), part.len());
    }

    println!("{} Split into {} parts", style("✓").green(), parts.len());
    Ok(())
}
