//! Page-level PDF assembly.
//!
//! [`PageAssembler`] builds a new document out of pages taken from any number
//! of sources. Each source is imported once: its objects are renumbered past
//! everything already in the output and copied over, except the document
//! structure (catalog, page tree, outlines) which is rebuilt on
//! [`PageAssembler::finish`].
//!
//! Pages are stored as flattened templates. Attributes a page may inherit from
//! its page-tree ancestors are copied onto the page itself, since the old tree
//! is discarded. Every appended page becomes its own page object, so selecting
//! the same page twice yields two pages.

use std::ops::Range;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pdf::SourceDocument;

/// Page attributes that may live on a `Pages` ancestor instead of the page.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// A source whose objects have been copied into an assembler.
#[derive(Debug)]
pub struct ImportedSource {
    /// Flattened page dictionaries, index 0 = page 1
    pages: Vec<Dictionary>,
}

impl ImportedSource {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Builds an output PDF page by page.
pub struct PageAssembler {
    output: Document,
    pages: Vec<Dictionary>,
}

impl Default for PageAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PageAssembler {
    /// Start an empty output document.
    pub fn new() -> Self {
        Self {
            output: Document::with_version("1.5"),
            pages: Vec::new(),
        }
    }

    /// Copy a source's objects into the output and return its page templates.
    pub fn import(&mut self, source: SourceDocument) -> Result<ImportedSource> {
        let mut doc = source.into_document();
        doc.renumber_objects_with(self.output.max_id + 1);

        let pages = doc
            .get_pages()
            .into_values()
            .map(|page_id| flatten_page(&doc, page_id))
            .collect::<Result<Vec<_>>>()?;

        let max_id = doc
            .objects
            .keys()
            .map(|&(id, _)| id)
            .max()
            .unwrap_or(0)
            .max(doc.max_id);
        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.output.objects.insert(object_id, object);
                }
            }
        }
        self.output.max_id = self.output.max_id.max(max_id);

        debug!("Imported source with {} pages", pages.len());
        Ok(ImportedSource { pages })
    }

    /// Append pages `range` (zero-indexed, half-open) of an imported source.
    pub fn append(&mut self, source: &ImportedSource, range: Range<usize>) -> Result<()> {
        let templates = source.pages.get(range.clone()).ok_or_else(|| {
            Error::PdfSave(format!(
                "page slice {}..{} outside source of {} pages",
                range.start,
                range.end,
                source.pages.len()
            ))
        })?;
        self.pages.extend_from_slice(templates);
        Ok(())
    }

    /// Pages appended so far
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Build the page tree and catalog, then serialize.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let pages_id = self.output.new_object_id();

        let templates = std::mem::take(&mut self.pages);
        let mut kids = Vec::with_capacity(templates.len());
        for mut page in templates {
            page.set("Parent", Object::Reference(pages_id));
            kids.push(Object::Reference(self.output.add_object(page)));
        }

        let count = i64::try_from(kids.len())
            .map_err(|_| Error::PdfSave("too many pages".to_string()))?;
        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ]);
        self.output.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.output.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        self.output.trailer.set("Root", Object::Reference(catalog_id));

        // Drops content of pages that were imported but never selected.
        let pruned = self.output.prune_objects();
        debug!("Pruned {} unreferenced objects", pruned.len());
        self.output.compress();

        let mut bytes = Vec::new();
        self.output
            .save_to(&mut bytes)
            .map_err(|e| Error::PdfSave(format!("Failed to save composed PDF: {e}")))?;
        Ok(bytes)
    }
}

/// Clone a page dictionary with inherited attributes made explicit.
fn flatten_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut page = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::PdfOpen(format!("Failed to read page object {page_id:?}: {e}")))?
        .clone();

    for key in INHERITABLE {
        if !page.has(key)
            && let Some(value) = inherited_attribute(doc, &page, key)
        {
            page.set(key.to_vec(), value.clone());
        }
    }
    page.remove(b"Parent");

    Ok(page)
}

fn inherited_attribute<'a>(doc: &'a Document, page: &Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();

    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::pdf::fixtures::{page_labels, test_pdf};

    fn import(assembler: &mut PageAssembler, label: &str, pages: u32) -> ImportedSource {
        let source = SourceDocument::from_bytes(&test_pdf(label, pages)).unwrap();
        assembler.import(source).unwrap()
    }

    #[test]
    fn test_selected_pages_in_append_order() {
        let mut assembler = PageAssembler::new();
        let a = import(&mut assembler, "A", 4);
        let b = import(&mut assembler, "B", 3);

        assembler.append(&b, 2..3).unwrap();
        assembler.append(&a, 0..2).unwrap();
        assert_eq!(assembler.page_count(), 3);

        let bytes = assembler.finish().unwrap();
        assert_eq!(page_labels(&bytes), vec!["B3", "A1", "A2"]);
    }

    #[test]
    fn test_duplicate_pages_are_distinct_objects() {
        let mut assembler = PageAssembler::new();
        let a = import(&mut assembler, "A", 2);

        assembler.append(&a, 1..2).unwrap();
        assembler.append(&a, 1..2).unwrap();

        let bytes = assembler.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(page_labels(&bytes), vec!["A2", "A2"]);
    }

    #[test]
    fn test_inherited_attributes_are_flattened() {
        let mut assembler = PageAssembler::new();
        // Fixture pages inherit MediaBox and Resources from the page tree.
        let a = import(&mut assembler, "A", 1);
        assembler.append(&a, 0..1).unwrap();

        let bytes = assembler.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let page_id = doc.get_pages()[&1];
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn test_append_outside_source_fails() {
        let mut assembler = PageAssembler::new();
        let a = import(&mut assembler, "A", 2);
        assert!(assembler.append(&a, 1..3).is_err());
    }

    #[test]
    fn test_unselected_pages_are_pruned() {
        let mut assembler = PageAssembler::new();
        let a = import(&mut assembler, "A", 5);
        assembler.append(&a, 0..1).unwrap();

        let bytes = assembler.finish().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        // Cross-reference and object streams are written by the serializer.
        let content_streams = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| {
                !matches!(
                    s.dict.get(b"Type").and_then(Object::as_name),
                    Ok(b"XRef" | b"ObjStm")
                )
            })
            .count();
        assert_eq!(content_streams, 1);
        assert_eq!(page_labels(&bytes), vec!["A1"]);
    }
}
