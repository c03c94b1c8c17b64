//! Info command - page count and page geometry.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use console::style;
use serde::Serialize;

use pagecraft_core::PagedDocument;

use super::read_pdf;

/// Arguments for the info command.
#[derive(Args)]
pub struct InfoArgs {
    /// Input PDF file
    input: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: InfoFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum InfoFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct PageInfo {
    page: usize,
    width: f32,
    height: f32,
    rotation: i32,
}

#[derive(Serialize)]
struct DocumentInfo {
    file: String,
    bytes: usize,
    page_count: usize,
    pages: Vec<PageInfo>,
}

fn describe(input: &Path, data: &[u8]) -> anyhow::Result<DocumentInfo> {
    let document = PagedDocument::load(data)?;
    let pages = (0..document.page_count())
        .map(|index| {
            let (width, height) = document.page_size(index)?;
            Ok(PageInfo {
                page: index + 1,
                width,
                height,
                rotation: document.rotation(index)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(DocumentInfo {
        file: input.display().to_string(),
        bytes: data.len(),
        page_count: pages.len(),
        pages,
    })
}

pub async fn run(args: InfoArgs) -> anyhow::Result<()> {
    let data = read_pdf(&args.input)?;
    let info = describe(&args.input, &data)?;

    match args.format {
        InfoFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
        InfoFormat::Text => {
            println!("{}", style(&info.file).bold());
            println!("  Size:  {} bytes", info.bytes);
            println!("  Pages: {}", info.page_count);
            for page in &info.pages {
                let rotation = if page.rotation == 0 {
                    String::new()
                } else {
                    format!(", rotated {}°", page.rotation)
                };
                println!(
                    "  {:>4}. {:.0} x {:.0} pt{}",
                    page.page, page.width, page.height, rotation
                );
            }
        }
    }

    Ok(())
}
