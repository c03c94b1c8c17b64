//! Page-tree helpers shared by the backends and the document model.

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::geometry::PageBox;

/// Page attributes a page may inherit from its ancestors in the page tree.
pub const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

const MAX_TREE_DEPTH: usize = 64;

/// Look up a page attribute, walking up `Parent` links when the page
/// itself does not define it. References are resolved.
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node_id = page_id;
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(node_id).ok()?;
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, object)| object);
        }
        node_id = node.get(b"Parent").and_then(Object::as_reference).ok()?;
    }
    None
}

/// Resolve a numeric object (integer or real).
pub fn number(doc: &Document, object: &Object) -> Option<f32> {
    let (_, object) = doc.dereference(object).ok()?;
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Effective media box of a page, falling back to US Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    inherited(doc, page_id, b"MediaBox")
        .and_then(|object| rect(doc, object))
        .filter(|b| b.width() > 0.0 && b.height() > 0.0)
        .unwrap_or(PageBox::LETTER)
}

/// Parse a four-number rectangle array.
pub fn rect(doc: &Document, object: &Object) -> Option<PageBox> {
    let values = object.as_array().ok()?;
    if values.len() != 4 {
        return None;
    }
    let mut coords = [0.0f32; 4];
    for (slot, value) in coords.iter_mut().zip(values) {
        *slot = number(doc, value)?;
    }
    Some(PageBox::from_corners(coords[0], coords[1], coords[2], coords[3]))
}

/// Effective `/Rotate` of a page, normalised to `0..360`.
pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    inherited(doc, page_id, b"Rotate")
        .and_then(|object| object.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// Effective resource dictionary of a page.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    match inherited(doc, page_id, b"Resources")? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}
