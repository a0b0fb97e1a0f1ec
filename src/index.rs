//! Read-only query facade over a structured document.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{Block, EntityType, Payload, SourceMetadata, StructuredDocument};

/// An assembled document, indexed by block id.
///
/// Built once from structured data and immutable afterwards. The id index
/// is derived from the block sequence and always agrees with it.
///
/// # Example
///
/// ```
/// use pdfblocks::{Document, StructuredDocument};
///
/// let doc = Document::new(StructuredDocument::default())?;
/// assert_eq!(doc.blocks().count(), 0);
/// assert!(doc.get_data(0).is_err());
/// # Ok::<(), pdfblocks::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    data: StructuredDocument,
    index: HashMap<u32, usize>,
}

impl Document {
    /// Build the index, validating the structured data.
    ///
    /// Fails when two blocks share an id or a payload does not match its
    /// block's entity type.
    pub fn new(data: StructuredDocument) -> Result<Self> {
        let mut index = HashMap::with_capacity(data.blocks.len());
        for (pos, block) in data.blocks.iter().enumerate() {
            if !block.payload.matches(block.entity_type) {
                return Err(Error::Schema(format!(
                    "block {} is a {} but carries a mismatched payload",
                    block.block_id, block.entity_type
                )));
            }
            if index.insert(block.block_id, pos).is_some() {
                return Err(Error::DuplicateBlockId(block.block_id));
            }
        }
        Ok(Self { data, index })
    }

    /// Parse structured JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Parse structured JSON from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::new(serde_json::from_reader(reader)?)
    }

    /// Load a structured JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Iterate `(block_id, title, entity_type)` in persisted order.
    ///
    /// Every call starts again from the first block.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            inner: self.data.blocks.iter(),
        }
    }

    /// The payload of a block.
    pub fn get_data(&self, block_id: u32) -> Result<&Payload> {
        self.get(block_id).map(|b| &b.payload)
    }

    /// The full block with an id.
    pub fn get(&self, block_id: u32) -> Result<&Block> {
        self.index
            .get(&block_id)
            .map(|&pos| &self.data.blocks[pos])
            .ok_or(Error::BlockNotFound(block_id))
    }

    /// Whether a block id exists.
    pub fn contains(&self, block_id: u32) -> bool {
        self.index.contains_key(&block_id)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.data.blocks.len()
    }

    /// Check if the document has no blocks.
    pub fn is_empty(&self) -> bool {
        self.data.blocks.is_empty()
    }

    /// Source file name.
    pub fn filename(&self) -> Option<&str> {
        self.data.filename.as_deref()
    }

    /// Number of pages in the source.
    pub fn total_pages(&self) -> u32 {
        self.data.total_pages
    }

    /// Source metadata.
    pub fn metadata(&self) -> &SourceMetadata {
        &self.data.metadata
    }

    /// The underlying structured data.
    pub fn structured(&self) -> &StructuredDocument {
        &self.data
    }

    /// Consume the index and return the structured data.
    pub fn into_structured(self) -> StructuredDocument {
        self.data
    }
}

impl TryFrom<StructuredDocument> for Document {
    type Error = Error;

    fn try_from(data: StructuredDocument) -> Result<Self> {
        Self::new(data)
    }
}

/// Iterator over `(block_id, title, entity_type)`.
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    inner: std::slice::Iter<'a, Block>,
}

impl<'a> Iterator for Blocks<'a> {
    type Item = (u32, &'a str, EntityType);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|b| (b.block_id, b.title.as_str(), b.entity_type))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Blocks<'_> {}

impl std::iter::FusedIterator for Blocks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, ImagePayload, PageBox, TextPayload};

    fn block(id: u32, entity_type: EntityType, payload: Payload) -> Block {
        Block {
            block_id: id,
            entity_type,
            title: format!("block {}", id),
            page_range: (1, 1),
            bounding_boxes: vec![PageBox {
                page: 1,
                bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
            }],
            confidence: 1.0,
            parent: None,
            payload,
        }
    }

    fn text(s: &str) -> Payload {
        Payload::Text(TextPayload {
            text: s.to_string(),
            level: None,
        })
    }

    fn three_blocks() -> StructuredDocument {
        StructuredDocument {
            blocks: vec![
                block(0, EntityType::Heading, text("Intro")),
                block(1, EntityType::Paragraph, text("Body")),
                block(
                    2,
                    EntityType::Image,
                    Payload::Image(ImagePayload {
                        ocr_text: String::new(),
                        image_ref: "page1_Im1".to_string(),
                    }),
                ),
            ],
            total_pages: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_blocks_restartable() {
        let doc = Document::new(three_blocks()).unwrap();
        let first: Vec<_> = doc.blocks().collect();
        let second: Vec<_> = doc.blocks().collect();
        assert_eq!(first, second);
        assert_eq!(first[0], (0, "block 0", EntityType::Heading));
        assert_eq!(doc.blocks().len(), 3);
    }

    #[test]
    fn test_get_data() {
        let doc = Document::new(three_blocks()).unwrap();
        assert_eq!(doc.get_data(1).unwrap().text(), Some("Body"));
        assert_eq!(
            doc.get_data(2).unwrap().image().map(|i| i.ocr_text.as_str()),
            Some("")
        );
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let doc = Document::new(three_blocks()).unwrap();
        assert!(matches!(doc.get_data(99), Err(Error::BlockNotFound(99))));
        assert!(!doc.contains(99));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut data = three_blocks();
        data.blocks[2].block_id = 0;
        data.blocks[2].entity_type = EntityType::Paragraph;
        data.blocks[2].payload = text("dup");
        assert!(matches!(
            Document::new(data),
            Err(Error::DuplicateBlockId(0))
        ));
    }

    #[test]
    fn test_mismatched_payload_rejected() {
        let mut data = three_blocks();
        data.blocks[1].entity_type = EntityType::Table;
        assert!(matches!(Document::new(data), Err(Error::Schema(_))));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "total_pages": 1,
            "blocks": [
                {"block_id": 0, "entity_type": "paragraph", "title": "Hi",
                 "page_range": [1, 1],
                 "bounding_boxes": [{"page": 1, "bbox": [0, 0, 10, 10]}],
                 "payload": {"text": "Hi"}}
            ]
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get(0).unwrap().confidence, 1.0);
        assert_eq!(doc.get_data(0).unwrap().text(), Some("Hi"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Document::from_json("{"), Err(Error::Json(_))));
    }
}
