//! Pure Rust backend that paints the image layer of a page.
//!
//! Scanned documents carry each page as one or more image XObjects placed
//! by the content stream. This backend follows `q`/`Q`/`cm`/`Do` through
//! the page and its form XObjects and draws every decodable image into its
//! transformed bounding box on a white canvas. Text and vector paths are
//! not painted.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageBuffer, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

use super::RasterBackend;
use crate::geometry::{PageBox, TargetSize};
use crate::pdf::{number, page_box, page_resources, page_rotation};
use crate::{Bitmap, RenderError, Result};

const MAX_FORM_DEPTH: usize = 8;
const MAX_IMAGE_PIXELS: u64 = 64 * 1024 * 1024;

/// Backend painting image XObjects with `lopdf` and `image`.
pub struct ImageLayerBackend {
    max_form_depth: usize,
}

impl ImageLayerBackend {
    /// Create a new backend.
    pub fn new() -> Self {
        Self {
            max_form_depth: MAX_FORM_DEPTH,
        }
    }

    fn load(data: &[u8]) -> Result<Document> {
        let mut doc = Document::load_mem(data).map_err(|e| RenderError::Parse(e.to_string()))?;
        if doc.is_encrypted() && doc.decrypt("").is_err() {
            return Err(RenderError::Parse("document is encrypted".to_string()));
        }
        Ok(doc)
    }

    fn page_id(doc: &Document, page: u32) -> Result<ObjectId> {
        let pages = doc.get_pages();
        pages.get(&page).copied().ok_or(RenderError::PageOutOfRange {
            page,
            page_count: pages.len() as u32,
        })
    }
}

impl Default for ImageLayerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RasterBackend for ImageLayerBackend {
    fn name(&self) -> &'static str {
        "image-layer"
    }

    fn page_count(&self, data: &[u8]) -> Result<u32> {
        Ok(Self::load(data)?.get_pages().len() as u32)
    }

    fn render(&self, data: &[u8], page: u32, target: TargetSize) -> Result<Bitmap> {
        let doc = Self::load(data)?;
        let page_id = Self::page_id(&doc, page)?;

        let media = page_box(&doc, page_id);
        let rotation = page_rotation(&doc, page_id);
        let (shown_width, shown_height) = media.displayed_size(rotation);
        let (width, height, scale) = target.fit(shown_width, shown_height);

        // Paint unrotated, then turn the finished canvas.
        let (canvas_width, canvas_height) = if rotation % 180 == 90 {
            (height, width)
        } else {
            (width, height)
        };
        debug!(
            "Rendering page {} at {}x{} (scale {:.3}, rotate {})",
            page, width, height, scale, rotation
        );

        let content = doc.get_page_content(page_id).unwrap_or_else(|e| {
            debug!("Page {} has no readable content: {}", page, e);
            Vec::new()
        });
        let content = Content::decode(&content).map_err(|e| RenderError::Backend(e.to_string()))?;

        let mut painter = Painter {
            doc: &doc,
            media,
            scale,
            canvas: RgbaImage::from_pixel(canvas_width, canvas_height, Rgba([255, 255, 255, 255])),
            max_depth: self.max_form_depth,
        };
        painter.run(&content.operations, page_resources(&doc, page_id), Matrix::IDENTITY, 0);

        let canvas = match rotation {
            90 => imageops::rotate90(&painter.canvas),
            180 => imageops::rotate180(&painter.canvas),
            270 => imageops::rotate270(&painter.canvas),
            _ => painter.canvas,
        };
        Ok(Bitmap::from(canvas))
    }
}

/// PDF affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_operands(doc: &Document, operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut v = [0.0f32; 6];
        for (slot, operand) in v.iter_mut().zip(operands) {
            *slot = number(doc, operand)?;
        }
        Some(Self {
            a: v[0],
            b: v[1],
            c: v[2],
            d: v[3],
            e: v[4],
            f: v[5],
        })
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }
}

struct Painter<'a> {
    doc: &'a Document,
    media: PageBox,
    scale: f32,
    canvas: RgbaImage,
    max_depth: usize,
}

impl<'a> Painter<'a> {
    fn run(
        &mut self,
        operations: &[Operation],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) {
        let mut ctm = base;
        let mut saved = Vec::new();

        for operation in operations {
            match operation.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => {
                    if let Some(previous) = saved.pop() {
                        ctm = previous;
                    }
                }
                "cm" => {
                    if let Some(matrix) = Matrix::from_operands(self.doc, &operation.operands) {
                        ctm = matrix.then(&ctm);
                    }
                }
                "Do" => {
                    let name = operation.operands.first().and_then(|o| o.as_name().ok());
                    if let (Some(name), Some(resources)) = (name, resources) {
                        self.draw_xobject(name, resources, ctm, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn draw_xobject(&mut self, name: &[u8], resources: &'a Dictionary, ctm: Matrix, depth: usize) {
        let doc = self.doc;
        let Some(stream) = resources
            .get(b"XObject")
            .ok()
            .and_then(|x| doc.dereference(x).ok())
            .and_then(|(_, x)| x.as_dict().ok())
            .and_then(|xobjects| xobjects.get(name).ok())
            .and_then(|entry| doc.dereference(entry).ok())
            .and_then(|(_, entry)| entry.as_stream().ok())
        else {
            trace!("XObject {} not found", String::from_utf8_lossy(name));
            return;
        };

        match stream.dict.get(b"Subtype").and_then(Object::as_name) {
            Ok(b"Image") => match decode_image(doc, stream) {
                Some(image) => self.place_image(&image, ctm),
                None => trace!("Skipping undecodable image {}", String::from_utf8_lossy(name)),
            },
            Ok(b"Form") if depth < self.max_depth => {
                let form_matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| m.as_array().ok())
                    .and_then(|m| Matrix::from_operands(doc, m))
                    .unwrap_or(Matrix::IDENTITY);
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| doc.dereference(r).ok())
                    .and_then(|(_, r)| r.as_dict().ok())
                    .or(Some(resources));
                let data = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                if let Ok(content) = Content::decode(&data) {
                    self.run(&content.operations, form_resources, form_matrix.then(&ctm), depth + 1);
                }
            }
            _ => {}
        }
    }

    fn place_image(&mut self, image: &DynamicImage, ctm: Matrix) {
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(x, y)| {
            let (ux, uy) = ctm.apply(x, y);
            (
                (ux - self.media.x0) * self.scale,
                (self.media.y1 - uy) * self.scale,
            )
        });
        let left = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let right = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let top = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let bottom = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

        let width = (right - left).round().max(1.0) as u32;
        let height = (bottom - top).round().max(1.0) as u32;
        if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
            debug!("Skipping oversized image placement {}x{}", width, height);
            return;
        }

        let mut placed = image.resize_exact(width, height, FilterType::Triangle).into_rgba8();
        if ctm.a < 0.0 {
            placed = imageops::flip_horizontal(&placed);
        }
        if ctm.d < 0.0 {
            placed = imageops::flip_vertical(&placed);
        }
        imageops::overlay(&mut self.canvas, &placed, left.round() as i64, top.round() as i64);
    }
}

fn first_filter(dict: &Dictionary) -> Option<&[u8]> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.as_slice()),
        Object::Array(filters) => filters.first().and_then(|f| f.as_name().ok()),
        _ => None,
    }
}

fn color_components(doc: &Document, dict: &Dictionary) -> Option<u32> {
    let color_space = match dict.get(b"ColorSpace") {
        Ok(object) => doc.dereference(object).ok()?.1,
        Err(_) => return Some(3),
    };
    let (family, params) = match color_space {
        Object::Name(name) => (name.as_slice(), None),
        Object::Array(items) => (items.first()?.as_name().ok()?, items.get(1)),
        _ => return None,
    };
    match family {
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Some(3),
        b"DeviceGray" | b"CalGray" | b"G" => Some(1),
        b"DeviceCMYK" | b"CMYK" => Some(4),
        b"ICCBased" => {
            let (_, profile) = doc.dereference(params?).ok()?;
            profile.as_stream().ok()?.dict.get(b"N").ok()?.as_i64().ok().map(|n| n as u32)
        }
        _ => None,
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> Option<DynamicImage> {
    let dict = &stream.dict;
    let width = dict.get(b"Width").ok().and_then(|w| number(doc, w))? as u32;
    let height = dict.get(b"Height").ok().and_then(|h| number(doc, h))? as u32;
    if width == 0 || height == 0 {
        return None;
    }
    let pixels = u64::from(width) * u64::from(height);
    if pixels > MAX_IMAGE_PIXELS {
        trace!("Skipping oversized image {}x{}", width, height);
        return None;
    }
    let pixels = usize::try_from(pixels).ok()?;

    match first_filter(dict) {
        Some(b"DCTDecode") => {
            trace!("Decoding JPEG image {}x{}", width, height);
            return image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg).ok();
        }
        Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
            trace!("Unsupported image filter");
            return None;
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|b| b.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let components = color_components(doc, dict).filter(|c| matches!(c, 1 | 3 | 4))?;
    let expected = pixels.checked_mul(components as usize)?;
    if data.len() < expected {
        trace!(
            "Image data too short: {} bytes for {}x{}x{}",
            data.len(),
            width,
            height,
            components
        );
        return None;
    }

    let mut rgba = Vec::with_capacity(pixels.checked_mul(4)?);
    for chunk in data.chunks_exact(components as usize).take(pixels) {
        let [r, g, b] = match components {
            1 => [chunk[0]; 3],
            3 => [chunk[0], chunk[1], chunk[2]],
            4 => {
                let k = 255 - u16::from(chunk[3]);
                let channel = |v: u8| ((255 - u16::from(v)) * k / 255) as u8;
                [channel(chunk[0]), channel(chunk[1]), channel(chunk[2])]
            }
            _ => return None,
        };
        rgba.extend_from_slice(&[r, g, b, 255]);
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}
