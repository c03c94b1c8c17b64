//! Text watermark stamped across every page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object};
use pagecraft_render::PageBox;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{finish, SaveOptions};
use crate::document::{PagedDocument, Result};
use crate::error::DocumentError;

/// Average Helvetica glyph advance, in em.
const AVERAGE_GLYPH_WIDTH: f32 = 0.5;
/// Helvetica cap height, in em.
const CAP_HEIGHT: f32 = 0.72;

/// How the watermark text is drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkOptions {
    pub text: String,
    /// Fill opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Counter-clockwise rotation in degrees.
    pub rotation: f32,
    /// Font size in points.
    pub font_size: f32,
    /// Fill colour as 8-bit RGB.
    pub color: [u8; 3],
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            text: String::new(),
            opacity: 0.3,
            rotation: -45.0,
            font_size: 60.0,
            color: [200, 200, 200],
        }
    }
}

impl WatermarkOptions {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(DocumentError::InvalidWatermark(reason.to_string()));
        if self.text.trim().is_empty() {
            return invalid("text is empty");
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return invalid("opacity must be between 0 and 1");
        }
        if !self.font_size.is_finite() || self.font_size <= 0.0 {
            return invalid("font size must be positive");
        }
        if !self.rotation.is_finite() {
            return invalid("rotation must be a finite angle");
        }
        Ok(())
    }

    /// The text as WinAnsi bytes; characters outside Latin-1 become `?`.
    fn encoded_text(&self) -> Vec<u8> {
        self.text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect()
    }

    fn resources(&self) -> Dictionary {
        dictionary! {
            "Font" => dictionary! {
                "F0" => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                },
            },
            "ExtGState" => dictionary! {
                "G0" => dictionary! {
                    "Type" => "ExtGState",
                    "ca" => self.opacity,
                    "CA" => self.opacity,
                },
            },
        }
    }

    /// Drawing operations centring the text on `media`.
    fn operations(&self, text: &[u8], media: &PageBox) -> Vec<Operation> {
        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let half_width = text.len() as f32 * self.font_size * AVERAGE_GLYPH_WIDTH / 2.0;
        let half_height = self.font_size * CAP_HEIGHT / 2.0;

        let center_x = media.x0 + media.width() / 2.0;
        let center_y = media.y0 + media.height() / 2.0;
        let x = center_x - half_width * cos + half_height * sin;
        let y = center_y - half_width * sin - half_height * cos;

        let [r, g, b] = self.color.map(|c| f32::from(c) / 255.0);
        vec![
            Operation::new("gs", vec!["G0".into()]),
            Operation::new("rg", vec![r.into(), g.into(), b.into()]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F0".into(), self.font_size.into()]),
            Operation::new(
                "Tm",
                vec![cos.into(), sin.into(), (-sin).into(), cos.into(), x.into(), y.into()],
            ),
            Operation::new("Tj", vec![Object::string_literal(text.to_vec())]),
            Operation::new("ET", vec![]),
        ]
    }
}

/// Stamp `options.text` over the centre of every page.
pub fn watermark(document: &[u8], options: &WatermarkOptions, save: SaveOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let mut doc = PagedDocument::load(document)?;
    let text = options.encoded_text();

    for index in 0..doc.page_count() {
        let media = doc.media_box(index)?;
        let content = Content {
            operations: options.operations(&text, &media),
        }
        .encode()
        .map_err(|e| DocumentError::Save(e.to_string()))?;
        doc.overlay(index, content, options.resources())?;
    }

    debug!("Watermarked {} pages with {:?}", doc.page_count(), options.text);
    finish(doc, save)
}
