//! In-memory document model.
//!
//! `PagedDocument` wraps a `lopdf::Document` and exposes the page-level
//! primitives the operations are built from. A document is owned by one
//! execution context; moving it elsewhere means `save` and `load`.

mod import;

pub use import::CopiedPage;

use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use pagecraft_render::pdf::{page_box, page_resources, page_rotation};
use pagecraft_render::PageBox;
use tracing::{debug, trace};

use crate::error::DocumentError;

/// Result type for document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;

const PDF_VERSION: &str = "1.7";
const MAX_TREE_DEPTH: usize = 64;

/// A PDF with an ordered list of pages.
#[derive(Debug, Clone)]
pub struct PagedDocument {
    inner: Document,
    pages_id: ObjectId,
    compress: bool,
}

impl PagedDocument {
    /// Create an empty document with a flat page tree.
    pub fn new() -> Self {
        let mut inner = Document::with_version(PDF_VERSION);
        let pages_id = inner.new_object_id();
        inner.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => Vec::<Object>::new(),
                "Count" => 0,
            }),
        );
        let catalog_id = inner.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        inner.trailer.set("Root", catalog_id);

        Self {
            inner,
            pages_id,
            compress: false,
        }
    }

    /// Load a document from bytes.
    ///
    /// Encrypted documents are opened with the empty password. Documents
    /// with zero pages load fine.
    pub fn load(data: &[u8]) -> Result<Self> {
        let mut inner = Document::load_mem(data).map_err(|e| DocumentError::Parse(e.to_string()))?;

        if inner.is_encrypted() {
            if inner.decrypt("").is_err() {
                return Err(DocumentError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");
        }

        let pages_id = inner
            .catalog()
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| DocumentError::Parse(format!("missing page tree: {}", e)))?;

        let doc = Self {
            inner,
            pages_id,
            compress: false,
        };
        debug!("Loaded PDF with {} pages", doc.page_count());
        Ok(doc)
    }

    /// Compress content streams when saving.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Serialize to bytes. Unreferenced objects are dropped first.
    pub fn save(&mut self) -> Result<Vec<u8>> {
        let pruned = self.inner.prune_objects();
        if !pruned.is_empty() {
            trace!("Pruned {} unreferenced objects", pruned.len());
        }
        if self.compress {
            self.inner.compress();
        }

        let mut data = Vec::new();
        self.inner
            .save_to(&mut data)
            .map_err(|e| DocumentError::Save(e.to_string()))?;
        debug!("Saved PDF: {} pages, {} bytes", self.page_count(), data.len());
        Ok(data)
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.inner.get_pages().len()
    }

    fn page_ids(&self) -> Vec<ObjectId> {
        self.inner.get_pages().into_values().collect()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        let ids = self.page_ids();
        ids.get(index).copied().ok_or(DocumentError::Index {
            page: index + 1,
            page_count: ids.len(),
        })
    }

    /// Copy pages of `source` (0-based indices, in the given order) into
    /// this document. The copies are not part of the page order until
    /// passed to [`add_page`](Self::add_page).
    pub fn copy_pages(&mut self, source: &PagedDocument, indices: &[usize]) -> Result<Vec<CopiedPage>> {
        import::copy_pages(&mut self.inner, &source.inner, indices)
    }

    /// Append a copied page to the end of the page order.
    pub fn add_page(&mut self, page: CopiedPage) -> Result<()> {
        let page_id = page.id();
        let page_dict = self
            .inner
            .get_dictionary_mut(page_id)
            .map_err(|e| DocumentError::Save(format!("copied page {:?} is missing: {}", page_id, e)))?;
        page_dict.set("Parent", self.pages_id);

        let root = self
            .inner
            .get_dictionary_mut(self.pages_id)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        let mut kids = root
            .get(b"Kids")
            .and_then(Object::as_array)
            .cloned()
            .unwrap_or_default();
        kids.push(Object::Reference(page_id));
        root.set("Kids", kids);
        let count = root.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
        root.set("Count", count + 1);
        Ok(())
    }

    /// Remove the page at `index`, updating `Count` up the page tree.
    pub fn remove_page(&mut self, index: usize) -> Result<()> {
        let page_id = self.page_id(index)?;
        let parent_id = self
            .inner
            .get_dictionary(page_id)
            .and_then(|page| page.get(b"Parent"))
            .and_then(Object::as_reference)
            .map_err(|e| DocumentError::Parse(format!("page without parent: {}", e)))?;

        let parent = self
            .inner
            .get_dictionary_mut(parent_id)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        if let Ok(Object::Array(kids)) = parent.get_mut(b"Kids") {
            kids.retain(|kid| kid.as_reference().ok() != Some(page_id));
        }

        let mut node_id = Some(parent_id);
        for _ in 0..MAX_TREE_DEPTH {
            let Some(id) = node_id else { break };
            let Ok(node) = self.inner.get_dictionary_mut(id) else { break };
            let count = node.get(b"Count").and_then(Object::as_i64).unwrap_or(1);
            node.set("Count", (count - 1).max(0));
            node_id = node.get(b"Parent").and_then(Object::as_reference).ok();
        }

        self.inner.objects.remove(&page_id);
        trace!("Removed page {} ({:?})", index + 1, page_id);
        Ok(())
    }

    /// Effective rotation of the page at `index`, in `0..360`.
    pub fn rotation(&self, index: usize) -> Result<i32> {
        let page_id = self.page_id(index)?;
        Ok(page_rotation(&self.inner, page_id) as i32)
    }

    /// Set the rotation of the page at `index`.
    pub fn set_rotation(&mut self, index: usize, degrees: i32) -> Result<()> {
        if degrees % 90 != 0 {
            return Err(DocumentError::InvalidRotation(degrees));
        }
        let page_id = self.page_id(index)?;
        let page = self
            .inner
            .get_dictionary_mut(page_id)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        page.set("Rotate", i64::from(degrees.rem_euclid(360)));
        Ok(())
    }

    /// Effective media box size of the page at `index`, in points.
    pub fn page_size(&self, index: usize) -> Result<(f32, f32)> {
        let media = self.media_box(index)?;
        Ok((media.width(), media.height()))
    }

    /// Effective media box of the page at `index`.
    pub fn media_box(&self, index: usize) -> Result<PageBox> {
        let page_id = self.page_id(index)?;
        Ok(page_box(&self.inner, page_id))
    }

    /// Paint `content` over the page at `index`.
    ///
    /// The content becomes a form XObject with its own `resources`, clipped
    /// to the media box. The existing content is wrapped in `q`/`Q` so the
    /// overlay starts from the default graphics state. Inherited resources
    /// are copied onto the page before the form is registered.
    pub fn overlay(&mut self, index: usize, content: Vec<u8>, resources: Dictionary) -> Result<()> {
        let page_id = self.page_id(index)?;
        let media = page_box(&self.inner, page_id);
        let form_id = self.inner.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![media.x0.into(), media.y0.into(), media.x1.into(), media.y1.into()],
                "Resources" => resources,
            },
            content,
        ));

        let mut own_resources = page_resources(&self.inner, page_id).cloned().unwrap_or_default();
        let mut xobjects = match own_resources.get(b"XObject").map(|object| self.inner.dereference(object)) {
            Ok(Ok((_, Object::Dictionary(dict)))) => dict.clone(),
            _ => Dictionary::new(),
        };
        let name = (0..)
            .map(|n| format!("Overlay{}", n))
            .find(|name| !xobjects.has(name.as_bytes()))
            .unwrap_or_default();
        xobjects.set(name.clone(), form_id);
        own_resources.set("XObject", xobjects);

        let existing = match self.inner.get_dictionary(page_id).and_then(|page| page.get(b"Contents")) {
            Ok(Object::Reference(id)) => match self.inner.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        };
        let save_id = self.inner.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
        let draw_id = self.inner.add_object(Stream::new(
            Dictionary::new(),
            format!("\nQ\nq /{} Do Q\n", name).into_bytes(),
        ));
        let mut contents: Vec<Object> = Vec::with_capacity(existing.len() + 2);
        contents.push(save_id.into());
        contents.extend(existing);
        contents.push(draw_id.into());

        let page = self
            .inner
            .get_dictionary_mut(page_id)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;
        page.set("Resources", own_resources);
        page.set("Contents", contents);
        trace!("Overlaid page {} with /{}", index + 1, name);
        Ok(())
    }
}

impl Default for PagedDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{page_labels, sample_pdf};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_document_round_trips_empty() {
        let mut doc = PagedDocument::new();
        assert_eq!(doc.page_count(), 0);
        let data = doc.save().unwrap();
        assert_eq!(PagedDocument::load(&data).unwrap().page_count(), 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = PagedDocument::load(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, DocumentError::Parse(_)));
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let data = sample_pdf("a", 3);
        let mut doc = PagedDocument::load(&data).unwrap();
        let saved = doc.save().unwrap();
        assert_eq!(page_labels(&saved), vec!["a p1", "a p2", "a p3"]);
    }

    #[test]
    fn test_copy_and_add_pages() {
        let source = PagedDocument::load(&sample_pdf("src", 3)).unwrap();
        let mut target = PagedDocument::new();
        for page in target.copy_pages(&source, &[2, 0, 2]).unwrap() {
            target.add_page(page).unwrap();
        }
        assert_eq!(target.page_count(), 3);

        let data = target.save().unwrap();
        assert_eq!(page_labels(&data), vec!["src p3", "src p1", "src p3"]);

        // inherited media box is materialised on each copy
        let reloaded = PagedDocument::load(&data).unwrap();
        assert_eq!(reloaded.page_size(0).unwrap(), (300.0, 400.0));
    }

    #[test]
    fn test_copy_pages_rejects_bad_index() {
        let source = PagedDocument::load(&sample_pdf("src", 2)).unwrap();
        let mut target = PagedDocument::new();
        let err = target.copy_pages(&source, &[0, 2]).unwrap_err();
        assert!(matches!(err, DocumentError::Index { page: 3, page_count: 2 }));
    }

    #[test]
    fn test_remove_page_updates_count() {
        let mut doc = PagedDocument::load(&sample_pdf("d", 4)).unwrap();
        doc.remove_page(3).unwrap();
        doc.remove_page(1).unwrap();
        assert_eq!(doc.page_count(), 2);

        let data = doc.save().unwrap();
        assert_eq!(page_labels(&data), vec!["d p1", "d p3"]);
        assert!(matches!(
            doc.remove_page(2),
            Err(DocumentError::Index { page: 3, page_count: 2 })
        ));
    }

    #[test]
    fn test_rotation() {
        let mut doc = PagedDocument::load(&sample_pdf("r", 1)).unwrap();
        assert_eq!(doc.rotation(0).unwrap(), 0);
        doc.set_rotation(0, -90).unwrap();
        assert_eq!(doc.rotation(0).unwrap(), 270);
        assert!(matches!(
            doc.set_rotation(0, 45),
            Err(DocumentError::InvalidRotation(45))
        ));
    }

    #[test]
    fn test_overlay_keeps_inherited_resources() {
        let mut doc = PagedDocument::load(&sample_pdf("o", 2)).unwrap();
        doc.overlay(1, b"0 0 1 rg".to_vec(), Dictionary::new()).unwrap();
        doc.overlay(1, b"1 0 0 rg".to_vec(), Dictionary::new()).unwrap();
        let data = doc.save().unwrap();

        assert_eq!(page_labels(&data), vec!["o p1", "o p2"]);

        let saved = Document::load_mem(&data).unwrap();
        let pages: Vec<ObjectId> = saved.get_pages().into_values().collect();
        let resources = page_resources(&saved, pages[1]).unwrap();
        assert!(resources.get(b"Font").unwrap().as_dict().unwrap().has(b"F1"));

        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(xobjects.has(b"Overlay0"));
        assert!(xobjects.has(b"Overlay1"));

        let content = String::from_utf8(saved.get_page_content(pages[1]).unwrap()).unwrap();
        assert!(content.starts_with("q"));
        assert!(content.trim_end().ends_with("/Overlay1 Do Q"));

        // the untouched page still inherits from the tree
        assert!(!saved.get_dictionary(pages[0]).unwrap().has(b"Resources"));
    }
}
