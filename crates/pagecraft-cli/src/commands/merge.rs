//! Merge command - concatenate PDF files.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;

use pagecraft_core::ops;

use super::{dispatcher_with_progress, load_config, percent_bar, print_written, read_pdf, write_file};

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// Input files or glob patterns, merged in the given order
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file
    #[arg(short, long, default_value = "merged.pdf")]
    output: PathBuf,
}

/// Expand glob patterns; plain paths pass through unchanged.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.contains(['*', '?', '[']) {
            let matched: Vec<PathBuf> = glob(input)?
                .filter_map(|r| r.ok())
                .filter(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
                })
                .collect();
            if matched.is_empty() {
                anyhow::bail!("No matching files found for pattern: {}", input);
            }
            files.extend(matched);
        } else {
            files.push(PathBuf::from(input));
        }
    }
    Ok(files)
}

pub async fn run(args: MergeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let files = expand_inputs(&args.inputs)?;
    if files.len() < 2 {
        anyhow::bail!("Merge needs at least two input files, got {}", files.len());
    }
    println!("{} Merging {} files", style("ℹ").blue(), files.len());

    let documents = files
        .iter()
        .map(|path| read_pdf(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let bar = percent_bar("merging");
    let dispatcher = dispatcher_with_progress(&config, &bar);
    let merged = dispatcher.merge(documents).await;
    bar.finish_and_clear();
    let merged = merged?;

    write_file(&args.output, &merged)?;
    print_written(&args.output, ops::page_count(&merged).unwrap_or(0), merged.len());
    println!("{} Done in {:?}", style("✓").green(), start.elapsed());
    Ok(())
}
