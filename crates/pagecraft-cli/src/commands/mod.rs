//! Subcommands and the helpers they share.

pub mod config;
pub mod info;
pub mod merge;
pub mod pages;
pub mod split;
pub mod thumbnails;
pub mod watermark;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use pagecraft_core::{Dispatcher, PagecraftConfig};

/// Load the configuration: an explicit `--config` path, else the default
/// config file when it exists, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<PagecraftConfig> {
    let default_path = config::default_config_path();
    let config = if let Some(path) = config_path {
        PagecraftConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config {}", path))?
    } else if default_path.exists() {
        debug!("Using config {}", default_path.display());
        PagecraftConfig::from_file(&default_path)?
    } else {
        PagecraftConfig::default()
    };
    config.validate()?;
    Ok(config)
}

pub fn read_pdf(path: &Path) -> anyhow::Result<Vec<u8>> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

pub fn write_file(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

/// File stem of `path`, or `fallback` when it has none.
pub fn stem(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(fallback)
        .to_string()
}

/// `<input stem>_<suffix>.pdf` next to the input.
pub fn default_output(input: &Path, suffix: &str) -> PathBuf {
    input.with_file_name(format!("{}_{}.pdf", stem(input, "document"), suffix))
}

/// Dispatcher configured from `config` with a progress bar attached.
pub fn dispatcher_with_progress(config: &PagecraftConfig, bar: &ProgressBar) -> Dispatcher {
    let bar = bar.clone();
    Dispatcher::new(config.worker.clone()).with_progress(move |event| {
        bar.set_position(event.percent.round() as u64);
    })
}

pub fn percent_bar(message: &str) -> ProgressBar {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    bar.set_message(message.to_string());
    bar
}

pub fn print_written(path: &Path, pages: usize, bytes: usize) {
    println!(
        "{} Wrote {} ({} pages, {} bytes)",
        style("✓").green(),
        path.display(),
        pages,
        bytes
    );
}
