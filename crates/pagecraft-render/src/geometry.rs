//! Page boxes and fit-to-target scaling.

use serde::{Deserialize, Serialize};

/// A rectangle in PDF user space (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PageBox {
    /// US Letter, used when a page carries no usable media box.
    pub const LETTER: PageBox = PageBox {
        x0: 0.0,
        y0: 0.0,
        x1: 612.0,
        y1: 792.0,
    };

    /// Build a box from two corners in any order.
    pub fn from_corners(ax: f32, ay: f32, bx: f32, by: f32) -> Self {
        Self {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Width and height as displayed after applying a page rotation.
    pub fn displayed_size(&self, rotation: i64) -> (f32, f32) {
        if rotation.rem_euclid(180) == 90 {
            (self.height(), self.width())
        } else {
            (self.width(), self.height())
        }
    }
}

/// Bounding box a thumbnail must fit into, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Output pixel size for a page of the given displayed size.
    pub fn fit(&self, page_width: f32, page_height: f32) -> (u32, u32, f32) {
        let scale = fit_scale(page_width, page_height, self.width, self.height);
        let width = ((page_width * scale).round() as u32).max(1);
        let height = ((page_height * scale).round() as u32).max(1);
        (width, height, scale)
    }
}

impl Default for TargetSize {
    fn default() -> Self {
        Self::new(200, 280)
    }
}

/// Uniform scale that fits a page into the target without upscaling.
pub fn fit_scale(page_width: f32, page_height: f32, target_width: u32, target_height: u32) -> f32 {
    if page_width <= 0.0 || page_height <= 0.0 {
        return 1.0;
    }
    let scale_x = target_width as f32 / page_width;
    let scale_y = target_height as f32 / page_height;
    scale_x.min(scale_y).min(1.0)
}
