//! Page primitives produced by extraction.
//!
//! Primitives are the atomic geometric units of one page. They live only
//! between extraction and assembly; the pipeline consumes them by reference
//! and nothing downstream keeps them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BBox, PageSize};
use crate::error::Warning;

/// Font weight of a text run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    /// Regular weight
    #[default]
    Normal,
    /// Bold, black or heavy faces
    Bold,
}

impl FontWeight {
    /// Infer the weight from a PostScript font name such as `Helvetica-Bold`.
    pub fn from_font_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("bold") || lower.contains("black") || lower.contains("heavy") {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        }
    }
}

/// A positioned run of text sharing one font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// The text content
    pub text: String,
    /// Effective font size in points
    pub font_size: f32,
    /// Font weight
    #[serde(default)]
    pub font_weight: FontWeight,
    /// Bounding box on the page
    pub bbox: BBox,
    /// 1-indexed page number
    pub page: u32,
}

impl TextRun {
    /// Create a text run.
    pub fn new(text: impl Into<String>, font_size: f32, bbox: BBox, page: u32) -> Self {
        Self {
            text: text.into(),
            font_size,
            font_weight: FontWeight::Normal,
            bbox,
            page,
        }
    }

    /// Set the font weight and return self.
    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.font_weight = weight;
        self
    }

    /// Whether the run is set in a bold face.
    pub fn is_bold(&self) -> bool {
        self.font_weight == FontWeight::Bold
    }

    /// Number of visual lines in the run.
    pub fn line_count(&self) -> usize {
        self.text.trim().lines().count().max(1)
    }

    /// Number of characters, ignoring surrounding whitespace.
    pub fn char_count(&self) -> usize {
        self.text.trim().chars().count()
    }
}

/// One cell of a table grid detected on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    /// Grid region this cell belongs to (unique per page)
    pub table: u32,
    /// Row index within the grid region
    pub row: u32,
    /// Column index within the grid region
    pub col: u32,
    /// Rows spanned
    #[serde(default = "one")]
    pub rowspan: u32,
    /// Columns spanned
    #[serde(default = "one")]
    pub colspan: u32,
    /// Cell text
    pub text: String,
    /// Bounding box on the page
    pub bbox: BBox,
    /// 1-indexed page number
    pub page: u32,
}

fn one() -> u32 {
    1
}

impl TableCell {
    /// Create a single-span cell.
    pub fn new(table: u32, row: u32, col: u32, text: impl Into<String>, bbox: BBox, page: u32) -> Self {
        Self {
            table,
            row,
            col,
            rowspan: 1,
            colspan: 1,
            text: text.into(),
            bbox,
            page,
        }
    }

    /// Set the spans and return self.
    pub fn with_span(mut self, rowspan: u32, colspan: u32) -> Self {
        self.rowspan = rowspan.max(1);
        self.colspan = colspan.max(1);
        self
    }
}

/// An image placed on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRegion {
    /// Stable reference to the image resource (e.g. `page3_Im1`)
    pub image_ref: String,
    /// Bounding box on the page
    pub bbox: BBox,
    /// 1-indexed page number
    pub page: u32,
    /// Recognized text; empty when OCR was skipped, yielded nothing or failed
    #[serde(default)]
    pub ocr_text: String,
}

impl ImageRegion {
    /// Create an image region with no text yet.
    pub fn new(image_ref: impl Into<String>, bbox: BBox, page: u32) -> Self {
        Self {
            image_ref: image_ref.into(),
            bbox,
            page,
            ocr_text: String::new(),
        }
    }

    /// Set the recognized text and return self.
    pub fn with_ocr_text(mut self, text: impl Into<String>) -> Self {
        self.ocr_text = text.into();
        self
    }
}

/// Any page primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    /// A run of text
    TextRun(TextRun),
    /// A table grid cell
    TableCell(TableCell),
    /// An image region
    ImageRegion(ImageRegion),
}

impl Primitive {
    /// Bounding box on the page.
    pub fn bbox(&self) -> BBox {
        match self {
            Primitive::TextRun(r) => r.bbox,
            Primitive::TableCell(c) => c.bbox,
            Primitive::ImageRegion(i) => i.bbox,
        }
    }

    /// 1-indexed page number.
    pub fn page(&self) -> u32 {
        match self {
            Primitive::TextRun(r) => r.page,
            Primitive::TableCell(c) => c.page,
            Primitive::ImageRegion(i) => i.page,
        }
    }
}

impl From<TextRun> for Primitive {
    fn from(run: TextRun) -> Self {
        Primitive::TextRun(run)
    }
}

impl From<TableCell> for Primitive {
    fn from(cell: TableCell) -> Self {
        Primitive::TableCell(cell)
    }
}

impl From<ImageRegion> for Primitive {
    fn from(image: ImageRegion) -> Self {
        Primitive::ImageRegion(image)
    }
}

/// All primitives of one page, in extraction order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    /// 1-indexed page number
    pub number: u32,
    /// Page dimensions
    pub size: PageSize,
    /// Primitives in extraction order
    pub primitives: Vec<Primitive>,
}

impl RawPage {
    /// Create an empty page.
    pub fn new(number: u32, size: PageSize) -> Self {
        Self {
            number,
            size,
            primitives: Vec::new(),
        }
    }

    /// Append a primitive.
    pub fn push(&mut self, primitive: impl Into<Primitive>) {
        self.primitives.push(primitive.into());
    }

    /// Text runs on the page.
    pub fn text_runs(&self) -> impl Iterator<Item = &TextRun> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::TextRun(r) => Some(r),
            _ => None,
        })
    }

    /// Table cells on the page.
    pub fn table_cells(&self) -> impl Iterator<Item = &TableCell> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::TableCell(c) => Some(c),
            _ => None,
        })
    }

    /// Image regions on the page.
    pub fn images(&self) -> impl Iterator<Item = &ImageRegion> {
        self.primitives.iter().filter_map(|p| match p {
            Primitive::ImageRegion(i) => Some(i),
            _ => None,
        })
    }

    /// Check if the page has no primitives.
    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

/// Document-level facts read from the PDF trailer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// PDF version (e.g., "1.7")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_version: Option<String>,
    /// Document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Creation date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl SourceMetadata {
    /// Check if no field is set.
    pub fn is_empty(&self) -> bool {
        self.pdf_version.is_none()
            && self.title.is_none()
            && self.author.is_none()
            && self.created.is_none()
    }
}

/// The output of extraction: every page's primitives plus document facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Source file name, when extracted from a path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Number of pages in the source
    pub total_pages: u32,
    /// Trailer metadata
    #[serde(default, skip_serializing_if = "SourceMetadata::is_empty")]
    pub metadata: SourceMetadata,
    /// Extracted pages in source order
    pub pages: Vec<RawPage>,
    /// Non-fatal problems met during extraction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl RawDocument {
    /// Create an empty raw document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page, keeping `total_pages` at least as large as the page count.
    pub fn add_page(&mut self, page: RawPage) {
        self.total_pages = self.total_pages.max(page.number);
        self.pages.push(page);
    }

    /// Total number of primitives over all pages.
    pub fn primitive_count(&self) -> usize {
        self.pages.iter().map(|p| p.primitives.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_weight_from_name() {
        assert_eq!(FontWeight::from_font_name("Helvetica-Bold"), FontWeight::Bold);
        assert_eq!(FontWeight::from_font_name("Arial-Black"), FontWeight::Bold);
        assert_eq!(FontWeight::from_font_name("Times-Roman"), FontWeight::Normal);
    }

    #[test]
    fn test_text_run_counts() {
        let run = TextRun::new("  two\nlines ", 12.0, BBox::default(), 1);
        assert_eq!(run.line_count(), 2);
        assert_eq!(run.char_count(), 9);
    }

    #[test]
    fn test_raw_page_accessors() {
        let mut page = RawPage::new(1, PageSize::letter());
        page.push(TextRun::new("a", 12.0, BBox::default(), 1));
        page.push(TableCell::new(0, 0, 0, "A1", BBox::default(), 1));
        page.push(ImageRegion::new("page1_Im1", BBox::default(), 1));

        assert_eq!(page.text_runs().count(), 1);
        assert_eq!(page.table_cells().count(), 1);
        assert_eq!(page.images().count(), 1);
    }

    #[test]
    fn test_primitive_tagging() {
        let p: Primitive = ImageRegion::new("page1_Im1", BBox::default(), 1).into();
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"kind\":\"image_region\""));
        assert!(json.contains("\"ocr_text\":\"\""));
    }

    #[test]
    fn test_cell_span_defaults() {
        let json = r#"{"table":0,"row":1,"col":2,"text":"x","bbox":[0,0,1,1],"page":1}"#;
        let cell: TableCell = serde_json::from_str(json).unwrap();
        assert_eq!((cell.rowspan, cell.colspan), (1, 1));
    }
}
