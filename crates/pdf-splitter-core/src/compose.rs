//! Composition of new documents from page ranges of stored ones.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::pdf::{ImportedSource, PageAssembler, SourceDocument};
use crate::range::{self, PageRange};
use crate::store::{DocumentId, DocumentStore, write_atomically};

/// One entry of a split request: which document, which pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSpec {
    pub document_id: String,
    /// Free-text range expression, e.g. `"1-3, 7"`
    pub split: String,
}

impl RangeSpec {
    pub fn new(document_id: impl Into<String>, split: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            split: split.into(),
        }
    }
}

/// Summary of a written composition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Composition {
    pub page_count: usize,
    pub size: u64,
}

/// Merges page ranges of documents under a source directory into one PDF.
#[derive(Debug, Clone)]
pub struct Compositor {
    source_dir: PathBuf,
}

impl Compositor {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// Compositor reading from a store's uploaded documents.
    pub fn for_store(store: &DocumentStore) -> Self {
        Self::new(store.inputs_dir())
    }

    /// Compose `specs` in order and write the result to `output_path`.
    ///
    /// Pages appear in spec order, and within a spec in the order its ranges
    /// are written. Ranges must satisfy `1 <= start <= end <= page count`.
    /// Nothing is written unless every spec resolves.
    ///
    /// Blocking: call from a blocking context.
    pub fn compose(&self, specs: &[RangeSpec], output_path: &Path) -> Result<Composition> {
        let mut assembler = PageAssembler::new();
        let mut sources: HashMap<DocumentId, ImportedSource> = HashMap::new();

        for spec in specs {
            let id = DocumentId::parse(&spec.document_id)
                .ok_or_else(|| Error::document_not_found(&spec.document_id))?;

            let source = match sources.entry(id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let document = self.open(id)?;
                    entry.insert(assembler.import(document)?)
                }
            };

            for page_range in range::parse(&spec.split) {
                let slice = resolve(page_range, source.page_count()).ok_or_else(|| {
                    Error::InvalidPageRange {
                        id: id.to_string(),
                        range: page_range.to_string(),
                        page_count: source.page_count(),
                    }
                })?;
                debug!("Appending {} of {} (pages {:?})", page_range, id, slice);
                assembler.append(source, slice)?;
            }
        }

        let page_count = assembler.page_count();
        if page_count == 0 {
            return Err(Error::EmptySelection);
        }

        let bytes = assembler.finish()?;
        write_atomically(output_path, &bytes)?;

        info!(
            "Composed {} pages from {} documents into {}",
            page_count,
            sources.len(),
            output_path.display()
        );
        Ok(Composition {
            page_count,
            size: bytes.len() as u64,
        })
    }

    fn open(&self, id: DocumentId) -> Result<SourceDocument> {
        let path = self.source_dir.join(id.file_name());
        SourceDocument::open(&path).map_err(|e| {
            debug!("Cannot open {}: {}", path.display(), e);
            Error::document_not_found(id.to_string())
        })
    }
}

/// Zero-indexed slice for a range, if it lies within `page_count` pages.
fn resolve(page_range: PageRange, page_count: usize) -> Option<std::ops::Range<usize>> {
    page_range
        .to_zero_based()
        .filter(|slice| slice.end <= page_count)
}
