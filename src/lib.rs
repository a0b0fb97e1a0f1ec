//! # pdfblocks
//!
//! Turn PDF documents into a flat, ordered list of typed content blocks.
//!
//! The pipeline has three stages:
//!
//! 1. **Extract** page primitives (positioned text runs, table cells, image
//!    regions with OCR text) from a PDF source.
//! 2. **Transform** them into blocks: classify each primitive, resolve
//!    reading order, merge fragments into headings, paragraphs, captions,
//!    tables and images with ids assigned in reading order.
//! 3. **Query** the result through a [`Document`] index.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfblocks::{extract_file, transform, Document};
//!
//! fn main() -> pdfblocks::Result<()> {
//!     let raw = extract_file("report.pdf")?;
//!     let doc = Document::new(transform(&raw))?;
//!
//!     for (id, title, kind) in doc.blocks() {
//!         println!("{:>4} {:<9} {}", id, kind, title);
//!     }
//!     let first = doc.get_data(0)?;
//!     println!("{:?}", first);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Reading order**: column-aware ordering of multi-column pages
//! - **Tables**: aligned text grouped into gap-free cell grids
//! - **OCR**: pluggable engines run on a bounded worker pool
//! - **CJK support**: no spurious spaces between Chinese or Japanese characters
//! - **Parallel batches**: several documents transformed at once with Rayon

pub mod detect;
pub mod error;
pub mod extract;
pub mod index;
pub mod model;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use detect::{is_pdf_bytes, sniff_bytes, sniff_path, PdfHeader};
pub use error::{Error, Result, Warning};
pub use extract::{
    ErrorMode, ExtractOptions, Extractor, OcrEngine, OcrError, OcrProvider, PageSelection,
    PdfBackend, SharedOcrEngine,
};
pub use index::{Blocks, Document};
pub use model::{
    BBox, Block, EntityType, FontWeight, GridCell, ImagePayload, ImageRegion, KeyValue, PageBox,
    PageSize, Payload, Primitive, RawDocument, RawPage, SourceMetadata, StructuredDocument,
    TableCell, TableGrid, TextPayload, TextRun,
};
pub use pipeline::{transform, transform_batch, transform_with_options, TransformOptions};
pub use render::JsonFormat;

use std::io::Read;
use std::path::Path;

/// Extract page primitives from a PDF file.
///
/// # Example
///
/// ```no_run
/// use pdfblocks::extract_file;
///
/// let raw = extract_file("document.pdf").unwrap();
/// println!("Pages: {}", raw.total_pages);
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<RawDocument> {
    Extractor::open(path)?.extract()
}

/// Extract page primitives from a PDF file with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfblocks::{extract_file_with_options, ExtractOptions, PageSelection};
///
/// let options = ExtractOptions::new()
///     .strict()
///     .with_pages(PageSelection::Range(1..=3));
/// let raw = extract_file_with_options("document.pdf", options).unwrap();
/// ```
pub fn extract_file_with_options<P: AsRef<Path>>(
    path: P,
    options: ExtractOptions,
) -> Result<RawDocument> {
    Extractor::open_with_options(path, options)?.extract()
}

/// Extract page primitives from PDF bytes.
pub fn extract_bytes(data: &[u8]) -> Result<RawDocument> {
    Extractor::from_bytes(data)?.extract()
}

/// Extract page primitives from PDF bytes with custom options.
pub fn extract_bytes_with_options(data: &[u8], options: ExtractOptions) -> Result<RawDocument> {
    Extractor::from_bytes_with_options(data, options)?.extract()
}

/// Extract page primitives from a reader.
///
/// # Example
///
/// ```no_run
/// use pdfblocks::extract_reader;
/// use std::fs::File;
///
/// let file = File::open("document.pdf").unwrap();
/// let raw = extract_reader(file).unwrap();
/// ```
pub fn extract_reader<R: Read>(reader: R) -> Result<RawDocument> {
    Extractor::from_reader(reader)?.extract()
}

/// Extract page primitives from a reader with custom options.
pub fn extract_reader_with_options<R: Read>(
    reader: R,
    options: ExtractOptions,
) -> Result<RawDocument> {
    Extractor::from_reader_with_options(reader, options)?.extract()
}

/// Builder running the whole pipeline, from a PDF source to a [`Document`].
///
/// # Example
///
/// ```no_run
/// use pdfblocks::{OcrError, OcrProvider, Pdfblocks};
///
/// let doc = Pdfblocks::new()
///     .strict()
///     .with_ocr(OcrProvider::shared(|_image: &[u8]| {
///         Ok::<_, OcrError>(String::new())
///     }))
///     .open("document.pdf")?;
/// println!("{} blocks", doc.len());
/// # Ok::<(), pdfblocks::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Pdfblocks {
    extract_options: ExtractOptions,
    transform_options: TransformOptions,
    ocr: Option<OcrProvider>,
}

impl Pdfblocks {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort on the first broken page instead of skipping it.
    pub fn strict(mut self) -> Self {
        self.extract_options = self.extract_options.strict();
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.extract_options = self.extract_options.with_pages(pages);
        self
    }

    /// Replace the extraction options.
    pub fn with_extract_options(mut self, options: ExtractOptions) -> Self {
        self.extract_options = options;
        self
    }

    /// Replace the transformation options.
    pub fn with_transform_options(mut self, options: TransformOptions) -> Self {
        self.transform_options = options;
        self
    }

    /// Run OCR on image regions with this provider.
    pub fn with_ocr(mut self, provider: OcrProvider) -> Self {
        self.ocr = Some(provider);
        self
    }

    /// Run the pipeline on a PDF file.
    pub fn open<P: AsRef<Path>>(self, path: P) -> Result<Document> {
        let extractor = Extractor::open_with_options(path, self.extract_options.clone())?;
        self.run(extractor)
    }

    /// Run the pipeline on PDF bytes.
    pub fn open_bytes(self, data: &[u8]) -> Result<Document> {
        let extractor = Extractor::from_bytes_with_options(data, self.extract_options.clone())?;
        self.run(extractor)
    }

    fn run<B: PdfBackend>(self, extractor: Extractor<B>) -> Result<Document> {
        let extractor = match self.ocr {
            Some(provider) => extractor.with_ocr(provider),
            None => extractor,
        };
        let raw = extractor.extract()?;
        Document::new(transform_with_options(&raw, &self.transform_options))
    }
}
