//! On-disk layout for uploaded and composed documents.
//!
//! ```text
//! <root>/inputs/{uuid}.pdf        committed uploads
//! <root>/outputs/{uuid}.pdf       composed artifacts
//! <root>/*/{uuid}.pdf.part        in-flight writes
//! ```
//!
//! Final names are only ever created by renaming a fully written staging
//! file, so anything named `*.pdf` is complete.

use std::ffi::OsStr;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Extension of committed documents
pub const DOCUMENT_EXTENSION: &str = "pdf";
/// Suffix appended to a final name while it is being written
pub const STAGING_SUFFIX: &str = "part";

const INPUTS_DIR: &str = "inputs";
const OUTPUTS_DIR: &str = "outputs";

/// Opaque document identifier, generated at upload or composition time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied id. Anything that is not a UUID cannot name a
    /// stored document, which also keeps ids from escaping the storage root.
    pub fn parse(id: &str) -> Option<Self> {
        Uuid::parse_str(id.trim()).ok().map(Self)
    }

    pub(crate) fn file_name(self) -> String {
        format!("{}.{DOCUMENT_EXTENSION}", self.0)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| Error::document_not_found(s))
    }
}

/// Maps document ids to paths under a storage root.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inputs_dir(&self) -> PathBuf {
        self.root.join(INPUTS_DIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join(OUTPUTS_DIR)
    }

    pub fn input_path(&self, id: DocumentId) -> PathBuf {
        self.inputs_dir().join(id.file_name())
    }

    pub fn output_path(&self, id: DocumentId) -> PathBuf {
        self.outputs_dir().join(id.file_name())
    }

    /// Directories watched by the retention sweep.
    pub fn sweep_roots(&self) -> Vec<PathBuf> {
        vec![self.inputs_dir(), self.outputs_dir()]
    }

    /// Create `inputs/` and `outputs/` if missing.
    pub async fn ensure_layout(&self) -> Result<()> {
        for dir in self.sweep_roots() {
            tokio::fs::create_dir_all(&dir).await?;
        }
        debug!("Document store ready at {}", self.root.display());
        Ok(())
    }
}

/// Staging name for a final path: `x.pdf` → `x.pdf.part`.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

/// `*.pdf`
pub fn is_document_file(name: &OsStr) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == DOCUMENT_EXTENSION)
}

/// `*.pdf.part`
pub fn is_staging_file(name: &OsStr) -> bool {
    let path = Path::new(name);
    path.extension().is_some_and(|ext| ext == STAGING_SUFFIX)
        && path.file_stem().is_some_and(is_document_file)
}

/// Write `bytes` to `path` through a staging file and a rename.
///
/// Creates the parent directory. On failure the staging file is removed and
/// `path` is left untouched.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let staging = staging_path(path);
    let result = (|| -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&staging)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        std::fs::rename(&staging, path)
    })();

    if let Err(e) = result {
        remove_if_exists(&staging);
        return Err(e.into());
    }
    Ok(())
}

/// Best-effort removal; a file that is already gone is fine.
pub(crate) fn remove_if_exists(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
    }
}
