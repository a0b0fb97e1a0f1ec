//! The persisted block schema.

use serde::{Deserialize, Serialize};

use super::{BBox, SourceMetadata};
use crate::error::Warning;

/// Semantic kind of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A section heading
    Heading,
    /// Body text
    Paragraph,
    /// A table grid
    Table,
    /// An image (with any recognized text)
    Image,
    /// A caption attached to a table or image
    Caption,
}

impl EntityType {
    /// Schema name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Heading => "heading",
            EntityType::Paragraph => "paragraph",
            EntityType::Table => "table",
            EntityType::Image => "image",
            EntityType::Caption => "caption",
        }
    }

    /// Whether blocks of this kind carry a text payload.
    pub fn is_text(&self) -> bool {
        matches!(
            self,
            EntityType::Heading | EntityType::Paragraph | EntityType::Caption
        )
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounding box tagged with its page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    /// 1-indexed page number
    pub page: u32,
    /// Box on that page
    pub bbox: BBox,
}

/// Text payload of headings, paragraphs and captions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPayload {
    /// Normalized text
    pub text: String,
    /// Heading level (1-6), headings only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

/// One cell of an assembled table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    /// 0-based row of the cell's top-left position
    pub row: u32,
    /// 0-based column of the cell's top-left position
    pub col: u32,
    /// Rows spanned
    pub rowspan: u32,
    /// Columns spanned
    pub colspan: u32,
    /// Cell text
    pub text: String,
}

impl GridCell {
    /// Whether the cell covers a grid position.
    pub fn covers(&self, row: u32, col: u32) -> bool {
        row >= self.row
            && row < self.row + self.rowspan
            && col >= self.col
            && col < self.col + self.colspan
    }
}

/// Table payload: a gap-free grid of cells in row-major order.
///
/// Every position in `[0, rows) x [0, cols)` is covered by exactly one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrid {
    /// Number of rows
    pub rows: u32,
    /// Number of columns
    pub cols: u32,
    /// Cells sorted by (row, col)
    pub cells: Vec<GridCell>,
    /// Index of the row holding totals, if one was recognized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_row: Option<u32>,
    /// Label/value pairs when the grid is a form of `Key:` cells
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_values: Vec<KeyValue>,
    /// Text just above the table describing it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One label/value pair of a key-value table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    /// Label without its trailing colon
    pub key: String,
    /// The cell to the right of the label
    pub value: String,
}

impl TableGrid {
    /// The cell covering a grid position, accounting for spans.
    pub fn cell(&self, row: u32, col: u32) -> Option<&GridCell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.cells.iter().find(|c| c.covers(row, col))
    }

    /// Text of every row, one string per column position.
    ///
    /// Spanned positions repeat the spanning cell's text only at its anchor;
    /// the other covered positions are empty strings.
    pub fn row_texts(&self) -> Vec<Vec<String>> {
        let mut rows = vec![vec![String::new(); self.cols as usize]; self.rows as usize];
        for cell in &self.cells {
            if let Some(slot) = rows
                .get_mut(cell.row as usize)
                .and_then(|r| r.get_mut(cell.col as usize))
            {
                *slot = cell.text.clone();
            }
        }
        rows
    }

    /// Check that the grid is gap-free and overlap-free.
    pub fn is_complete(&self) -> bool {
        let mut covered = vec![0u8; (self.rows * self.cols) as usize];
        for cell in &self.cells {
            for r in cell.row..cell.row + cell.rowspan {
                for c in cell.col..cell.col + cell.colspan {
                    if r >= self.rows || c >= self.cols {
                        return false;
                    }
                    covered[(r * self.cols + c) as usize] += 1;
                }
            }
        }
        covered.iter().all(|&n| n == 1)
    }
}

/// Image payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePayload {
    /// Recognized text, empty (never absent) when OCR produced nothing
    pub ocr_text: String,
    /// Reference to the image resource
    pub image_ref: String,
}

/// Kind-dependent content of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    /// Table grid
    Table(TableGrid),
    /// Image with OCR text
    Image(ImagePayload),
    /// Heading, paragraph or caption text
    Text(TextPayload),
}

impl Payload {
    /// Text of a text payload.
    pub fn text(&self) -> Option<&str> {
        match self {
            Payload::Text(t) => Some(&t.text),
            _ => None,
        }
    }

    /// Grid of a table payload.
    pub fn table(&self) -> Option<&TableGrid> {
        match self {
            Payload::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Image payload.
    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            Payload::Image(i) => Some(i),
            _ => None,
        }
    }

    /// Whether this payload shape is the one `entity_type` requires.
    pub fn matches(&self, entity_type: EntityType) -> bool {
        match self {
            Payload::Text(_) => entity_type.is_text(),
            Payload::Table(_) => entity_type == EntityType::Table,
            Payload::Image(_) => entity_type == EntityType::Image,
        }
    }
}

/// The persisted unit of output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Identifier, unique within the document and ascending in reading order
    pub block_id: u32,
    /// Semantic kind
    pub entity_type: EntityType,
    /// Short human-readable label
    pub title: String,
    /// First and last page spanned (1-indexed, inclusive)
    pub page_range: (u32, u32),
    /// One box per page spanned
    pub bounding_boxes: Vec<PageBox>,
    /// Lowest classification confidence among the merged primitives
    #[serde(default = "full_confidence")]
    pub confidence: f32,
    /// Block id of the nearest enclosing heading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<u32>,
    /// Kind-dependent content
    pub payload: Payload,
}

fn full_confidence() -> f32 {
    1.0
}

/// A document as a flat, ordered list of blocks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    /// Source file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Number of pages in the source
    #[serde(default)]
    pub total_pages: u32,
    /// Trailer metadata
    #[serde(default, skip_serializing_if = "SourceMetadata::is_empty")]
    pub metadata: SourceMetadata,
    /// Non-fatal problems met during extraction
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
    /// Blocks in reading order
    pub blocks: Vec<Block>,
}
