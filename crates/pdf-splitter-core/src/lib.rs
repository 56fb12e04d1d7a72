//! PDF Splitter Core Library
//!
//! This library provides the core functionality for splitting PDF documents:
//! - Streaming, validating upload ingest with atomic commit
//! - Page range expressions (`"1-3, 7"`)
//! - Composition of a new PDF from ranges of stored documents
//! - Age-based retention of stored files

pub mod compose;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pdf;
pub mod range;
pub mod retention;
pub mod store;
pub mod util;

pub use compose::{Composition, Compositor, RangeSpec};
pub use config::{AppConfig, IngestConfig, RetentionConfig, ServerConfig};
pub use error::{Error, ErrorKind, Result};
pub use ingest::Ingestor;
pub use pdf::SourceDocument;
pub use range::PageRange;
pub use retention::{RetentionSweeper, SweepReport};
pub use store::{DocumentId, DocumentStore};

use std::fmt::Display;
use std::path::{Path, PathBuf};

use futures::Stream;
use tokio::io::AsyncRead;
use tracing::{info, warn};

/// A committed upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadedDocument {
    pub id: DocumentId,
    pub pages: usize,
    pub size: u64,
}

/// A composed document written under the store's outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
    pub size: u64,
}

/// High-level entry point that wires ingest, composition and retention to one
/// storage root.
#[derive(Debug, Clone)]
pub struct PdfSplitter {
    config: AppConfig,
    store: DocumentStore,
    ingestor: Ingestor,
    compositor: Compositor,
    sweeper: RetentionSweeper,
}

impl PdfSplitter {
    /// Create a splitter rooted at the configured data directory
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let store = DocumentStore::new(config.storage_root());
        let ingestor = Ingestor::new(config.ingest.clone());
        let compositor = Compositor::for_store(&store);
        let sweeper = RetentionSweeper::new(config.retention.clone(), store.sweep_roots());

        Ok(Self {
            config,
            store,
            ingestor,
            compositor,
            sweeper,
        })
    }

    /// Validate and store an uploaded byte stream under a fresh id.
    ///
    /// Bodies that carry the PDF signature but cannot be opened are removed
    /// again and rejected.
    pub async fn upload<S, B, E>(&self, stream: S) -> Result<UploadedDocument>
    where
        S: Stream<Item = std::result::Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        let id = DocumentId::new();
        let path = self.store.input_path(id);
        let size = self.ingestor.ingest(stream, &path).await?;
        self.inspect(id, path, size).await
    }

    /// Like [`PdfSplitter::upload`], reading from an `AsyncRead`.
    pub async fn upload_reader<R>(&self, reader: R) -> Result<UploadedDocument>
    where
        R: AsyncRead,
    {
        let id = DocumentId::new();
        let path = self.store.input_path(id);
        let size = self.ingestor.ingest_reader(reader, &path).await?;
        self.inspect(id, path, size).await
    }

    async fn inspect(&self, id: DocumentId, path: PathBuf, size: u64) -> Result<UploadedDocument> {
        let opened = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || SourceDocument::open(&path))
                .await
                .map_err(|e| Error::Task(e.to_string()))?
        };

        match opened {
            Ok(document) => {
                info!(
                    "Uploaded document {} ({} pages, {} bytes)",
                    id,
                    document.page_count(),
                    size
                );
                Ok(UploadedDocument {
                    id,
                    pages: document.page_count(),
                    size,
                })
            }
            Err(e) => {
                warn!("Rejecting upload {}: {}", id, e);
                store::remove_if_exists(&path);
                Err(e)
            }
        }
    }

    /// Compose `specs` into a new document under the outputs directory.
    pub async fn split(&self, specs: Vec<RangeSpec>) -> Result<OutputArtifact> {
        let id = DocumentId::new();
        let path = self.store.output_path(id);
        let composition = self.split_to(specs, &path).await?;

        Ok(OutputArtifact {
            id,
            path,
            page_count: composition.page_count,
            size: composition.size,
        })
    }

    /// Compose `specs` into `output_path`.
    pub async fn split_to(&self, specs: Vec<RangeSpec>, output_path: &Path) -> Result<Composition> {
        let compositor = self.compositor.clone();
        let output_path = output_path.to_path_buf();

        tokio::task::spawn_blocking(move || compositor.compose(&specs, &output_path))
            .await
            .map_err(|e| Error::Task(e.to_string()))?
    }

    /// Run one retention sweep over inputs and outputs.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let sweeper = self.sweeper.clone();
        tokio::task::spawn_blocking(move || sweeper.sweep())
            .await
            .map_err(|e| Error::Task(e.to_string()))
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub const fn store(&self) -> &DocumentStore {
        &self.store
    }
}
