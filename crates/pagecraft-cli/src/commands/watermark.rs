//! Watermark command - stamp text across every page.

use std::path::PathBuf;

use clap::Args;

use pagecraft_core::ops::{self, WatermarkOptions};

use super::{
    default_output, dispatcher_with_progress, load_config, percent_bar, print_written, read_pdf,
    write_file,
};

/// Arguments for the watermark command.
#[derive(Args)]
pub struct WatermarkArgs {
    /// Input PDF file
    input: PathBuf,

    /// Watermark text
    #[arg(short, long)]
    text: String,

    /// Opacity between 0 and 1
    #[arg(long, default_value_t = 0.3)]
    opacity: f32,

    /// Counter-clockwise rotation in degrees
    #[arg(short, long, default_value_t = -45.0, allow_hyphen_values = true)]
    rotation: f32,

    /// Font size in points
    #[arg(long, default_value_t = 60.0)]
    font_size: f32,

    /// Text colour, "R,G,B" (0-255 each) or "#rrggbb"
    #[arg(long, default_value = "200,200,200", value_parser = parse_color)]
    color: [u8; 3],

    /// Output file (default: <input>_watermarked.pdf)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn parse_color(text: &str) -> Result<[u8; 3], String> {
    let invalid = || format!("invalid colour '{}', expected \"R,G,B\" or \"#rrggbb\"", text);

    if let Some(hex) = text.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        return Ok([channel(0)?, channel(2)?, channel(4)?]);
    }

    let channels = text
        .split(',')
        .map(|part| part.trim().parse::<u8>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    <[u8; 3]>::try_from(channels).map_err(|_| invalid())
}

pub async fn run(args: WatermarkArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let options = WatermarkOptions {
        text: args.text,
        opacity: args.opacity,
        rotation: args.rotation,
        font_size: args.font_size,
        color: args.color,
    };
    options.validate()?;

    let data = read_pdf(&args.input)?;
    let bar = percent_bar("watermarking");
    let result = dispatcher_with_progress(&config, &bar)
        .watermark(data, options)
        .await;
    bar.finish_and_clear();
    let result = result?;

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, "watermarked"));
    write_file(&output, &result)?;
    print_written(&output, ops::page_count(&result).unwrap_or(0), result.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("200, 10,0").unwrap(), [200, 10, 0]);
        assert_eq!(parse_color("#FF8000").unwrap(), [255, 128, 0]);
    }

    #[test]
    fn test_parse_color_rejects_garbage() {
        for text in ["1,2", "1,2,3,4", "256,0,0", "#12345", "#gg0000", "red"] {
            assert!(parse_color(text).is_err(), "{}", text);
        }
    }
}
