use std::path::Path;

use lopdf::Document;

use crate::error::{Error, Result};

/// A parsed source PDF, read once and never written back.
pub struct SourceDocument {
    doc: Document,
    page_count: usize,
}

impl SourceDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes)
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;
        Ok(Self::from_document(doc))
    }

    /// Open a PDF from a file path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    fn from_document(doc: Document) -> Self {
        let page_count = doc.get_pages().len();
        Self { doc, page_count }
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    pub(crate) fn into_document(self) -> Document {
        self.doc
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("page_count", &self.page_count)
            .field("objects", &self.doc.objects.len())
            .finish()
    }
}
