//! Copying pages between documents.

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};
use pagecraft_render::pdf::{inherited, INHERITABLE_KEYS};
use tracing::debug;

use super::Result;
use crate::error::DocumentError;

/// A page imported into a document but not yet placed in its page order.
#[derive(Debug)]
pub struct CopiedPage {
    id: ObjectId,
}

impl CopiedPage {
    pub(crate) fn id(&self) -> ObjectId {
        self.id
    }
}

/// Deep-copies objects from `source` into `target`, remapping object ids.
///
/// Objects reached twice are imported once. Page-tree nodes are never
/// followed, except for the pages being copied, which are registered up
/// front.
struct Importer<'a> {
    source: &'a Document,
    target: &'a mut Document,
    remap: HashMap<ObjectId, ObjectId>,
    tree_nodes: HashSet<ObjectId>,
}

impl<'a> Importer<'a> {
    fn new(source: &'a Document, target: &'a mut Document) -> Self {
        let tree_nodes = source
            .objects
            .iter()
            .filter(|(_, object)| {
                matches!(
                    object.as_dict().and_then(|d| d.get(b"Type")).and_then(Object::as_name),
                    Ok(b"Page") | Ok(b"Pages")
                )
            })
            .map(|(id, _)| *id)
            .collect();

        Self {
            source,
            target,
            remap: HashMap::new(),
            tree_nodes,
        }
    }

    fn import_reference(&mut self, id: ObjectId) -> Object {
        if let Some(new_id) = self.remap.get(&id) {
            return Object::Reference(*new_id);
        }
        if self.tree_nodes.contains(&id) {
            return Object::Null;
        }
        let source = self.source;
        let Ok(object) = source.get_object(id) else {
            return Object::Null;
        };

        let new_id = self.target.new_object_id();
        self.remap.insert(id, new_id);
        let copied = self.import_object(object);
        self.target.objects.insert(new_id, copied);
        Object::Reference(new_id)
    }

    fn import_object(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self.import_reference(*id),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.import_object(item)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(dict)),
            Object::Stream(stream) => {
                let mut copied = stream.clone();
                copied.dict = self.import_dictionary(&stream.dict);
                Object::Stream(copied)
            }
            other => other.clone(),
        }
    }

    fn import_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.import_object(value));
        }
        copied
    }

    fn copy_page(&mut self, source_id: ObjectId, new_id: ObjectId) -> Result<()> {
        let source = self.source;
        let page = source
            .get_dictionary(source_id)
            .map_err(|e| DocumentError::Parse(e.to_string()))?;

        let mut copied = Dictionary::new();
        for (key, value) in page.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copied.set(key.clone(), self.import_object(value));
        }
        for key in INHERITABLE_KEYS {
            if copied.has(key) {
                continue;
            }
            if let Some(value) = inherited(source, source_id, key) {
                copied.set(key.to_vec(), self.import_object(value));
            }
        }

        self.target.objects.insert(new_id, Object::Dictionary(copied));
        Ok(())
    }
}

pub(super) fn copy_pages(target: &mut Document, source: &Document, indices: &[usize]) -> Result<Vec<CopiedPage>> {
    let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
    let selected = indices
        .iter()
        .map(|&index| {
            source_pages.get(index).copied().ok_or(DocumentError::Index {
                page: index + 1,
                page_count: source_pages.len(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut importer = Importer::new(source, target);

    // Register every selected page first so references between copied
    // pages (link annotations and the like) stay intact.
    for &source_id in &selected {
        if !importer.remap.contains_key(&source_id) {
            let new_id = importer.target.new_object_id();
            importer.remap.insert(source_id, new_id);
        }
    }

    let mut placed = HashSet::new();
    let mut copies = Vec::with_capacity(selected.len());
    for source_id in selected {
        let new_id = if placed.insert(source_id) {
            importer.remap[&source_id]
        } else {
            importer.target.new_object_id()
        };
        importer.copy_page(source_id, new_id)?;
        copies.push(CopiedPage { id: new_id });
    }

    debug!(
        "Copied {} pages ({} objects imported)",
        copies.len(),
        importer.remap.len()
    );
    Ok(copies)
}
