//! Error and warning types for pdfblocks.

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pdfblocks operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while extracting, transforming or querying.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The source is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted.
    #[error("Document is encrypted")]
    Encrypted,

    /// The PDF structure is corrupted or malformed.
    #[error("Corrupted PDF structure: {0}")]
    Corrupted(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Invalid page range.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// No block with the requested identifier exists in the document.
    #[error("No block with id {0}")]
    BlockNotFound(u32),

    /// Two blocks in the structured data share an identifier.
    #[error("Duplicate block id {0}")]
    DuplicateBlockId(u32),

    /// Structured data does not conform to the block schema.
    #[error("Schema error: {0}")]
    Schema(String),

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error during rendering.
    #[error("Rendering error: {0}")]
    Render(String),
}

impl Error {
    /// Whether this error means the PDF source itself could not be opened or parsed.
    ///
    /// These are fatal for the whole document; everything per-page or per-image
    /// degrades to a [`Warning`] instead.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::UnknownFormat
                | Error::UnsupportedVersion(_)
                | Error::PdfParse(_)
                | Error::Encrypted
                | Error::Corrupted(_)
        )
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

/// A non-fatal condition recorded during extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A page could not be extracted and contributes no primitives.
    PageSkipped {
        /// 1-indexed page number
        page: u32,
        /// Why extraction failed
        reason: String,
    },

    /// The OCR collaborator failed on one image; its text is empty.
    OcrFailed {
        /// 1-indexed page number
        page: u32,
        /// Image reference
        image_ref: String,
        /// Failure reported by the engine
        reason: String,
    },

    /// The document OCR deadline passed before this image was recognized.
    OcrTimedOut {
        /// 1-indexed page number
        page: u32,
        /// Image reference
        image_ref: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::PageSkipped { page, reason } => {
                write!(f, "page {} skipped: {}", page, reason)
            }
            Warning::OcrFailed {
                page,
                image_ref,
                reason,
            } => write!(f, "OCR failed for {} on page {}: {}", image_ref, page, reason),
            Warning::OcrTimedOut { page, image_ref } => {
                write!(f, "OCR timed out for {} on page {}", image_ref, page)
            }
        }
    }
}
