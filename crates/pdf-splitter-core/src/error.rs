use thiserror::Error;

/// Unified error type for pdf-splitter-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Upload validation (signature, size ceiling, empty body, interrupted stream)
/// - Composition (unknown documents, invalid page ranges)
/// - PDF operations (opening, saving)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Upload Errors
    // ==========================================================================
    /// Content does not begin with the `%PDF-` signature
    #[error("upload is not a PDF document")]
    InvalidFormat,

    /// Upload exceeded the configured size ceiling
    #[error("PDF exceeds the {limit} byte upload limit")]
    PayloadTooLarge { limit: u64 },

    /// Upload body contained no bytes
    #[error("empty upload")]
    EmptyUpload,

    /// The incoming byte stream failed before reaching its end
    #[error("upload interrupted: {0}")]
    UploadInterrupted(String),

    // ==========================================================================
    // Composition Errors
    // ==========================================================================
    /// A referenced document id is unknown, absent or unreadable
    #[error("document not found: {id}")]
    DocumentNotFound { id: String },

    /// A page range does not fit the source document
    #[error("invalid page range {range} for document {id} ({page_count} pages)")]
    InvalidPageRange {
        id: String,
        range: String,
        page_count: usize,
    },

    /// The request selected no pages at all
    #[error("no pages selected")]
    EmptySelection,

    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking task failed to complete
    #[error("background task failed: {0}")]
    Task(String),
}

/// Machine-distinguishable error categories surfaced to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFormat,
    PayloadTooLarge,
    EmptyUpload,
    DocumentNotFound,
    InvalidPageRange,
    EmptySelection,
    IoFailure,
    Config,
}

impl ErrorKind {
    /// Stable wire code for this kind.
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::EmptyUpload => "EMPTY_UPLOAD",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::InvalidPageRange => "INVALID_PAGE_RANGE",
            Self::EmptySelection => "EMPTY_SELECTION",
            Self::IoFailure => "IO_FAILURE",
            Self::Config => "CONFIG",
        }
    }
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            // A body that passes the signature check but cannot be parsed is
            // still not a usable PDF.
            Self::InvalidFormat | Self::PdfOpen(_) => ErrorKind::InvalidFormat,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::EmptyUpload => ErrorKind::EmptyUpload,
            Self::DocumentNotFound { .. } => ErrorKind::DocumentNotFound,
            Self::InvalidPageRange { .. } => ErrorKind::InvalidPageRange,
            Self::EmptySelection => ErrorKind::EmptySelection,
            Self::UploadInterrupted(_) | Self::PdfSave(_) | Self::Io(_) | Self::Task(_) => {
                ErrorKind::IoFailure
            }
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => ErrorKind::Config,
        }
    }

    pub(crate) fn document_not_found(id: impl Into<String>) -> Self {
        Self::DocumentNotFound { id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_are_distinguishable() {
        assert_eq!(Error::InvalidFormat.kind(), ErrorKind::InvalidFormat);
        assert_eq!(
            Error::PayloadTooLarge { limit: 1 }.kind(),
            ErrorKind::PayloadTooLarge
        );
        assert_eq!(Error::EmptyUpload.kind(), ErrorKind::EmptyUpload);
        assert_eq!(
            Error::document_not_found("x").kind(),
            ErrorKind::DocumentNotFound
        );
        assert_eq!(
            Error::UploadInterrupted("reset".into()).kind(),
            ErrorKind::IoFailure
        );
    }

    #[test]
    fn test_unparsable_pdf_is_invalid_format() {
        assert_eq!(
            Error::PdfOpen("bad xref".into()).kind(),
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn test_codes() {
        assert_eq!(ErrorKind::PayloadTooLarge.code(), "PAYLOAD_TOO_LARGE");
        assert_eq!(ErrorKind::DocumentNotFound.code(), "DOCUMENT_NOT_FOUND");
    }
}
