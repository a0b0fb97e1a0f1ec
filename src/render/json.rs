//! JSON rendering for raw and structured documents.

use std::io::Write;

use serde::Serialize;

use crate::error::{Error, Result};

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Serialize a document (structured or raw) to a JSON string.
pub fn to_json<T: Serialize + ?Sized>(doc: &T, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc),
        JsonFormat::Compact => serde_json::to_string(doc),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Serialize a document to a writer.
pub fn to_writer<W: Write, T: Serialize + ?Sized>(
    writer: W,
    doc: &T,
    format: JsonFormat,
) -> Result<()> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_writer_pretty(writer, doc),
        JsonFormat::Compact => serde_json::to_writer(writer, doc),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        BBox, Block, EntityType, PageBox, Payload, StructuredDocument, TextPayload,
    };

    fn sample() -> StructuredDocument {
        StructuredDocument {
            filename: Some("report.pdf".to_string()),
            total_pages: 1,
            blocks: vec![Block {
                block_id: 0,
                entity_type: EntityType::Heading,
                title: "Title".to_string(),
                page_range: (1, 1),
                bounding_boxes: vec![PageBox {
                    page: 1,
                    bbox: BBox::new(72.0, 72.0, 200.0, 96.0),
                }],
                confidence: 0.9,
                parent: None,
                payload: Payload::Text(TextPayload {
                    text: "Title".to_string(),
                    level: Some(1),
                }),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_to_json_pretty() {
        let json = to_json(&sample(), JsonFormat::Pretty).unwrap();
        assert!(json.contains("\"entity_type\": \"heading\""));
        assert!(json.contains("\"page_range\": ["));
        assert!(json.contains('\n'));
        assert!(!json.contains("\"warnings\""));
        assert!(!json.contains("\"parent\""));
    }

    #[test]
    fn test_to_json_compact() {
        let json = to_json(&sample(), JsonFormat::Compact).unwrap();
        assert!(!json.contains('\n'));
        assert!(json.contains("\"bbox\":[72.0,72.0,200.0,96.0]"));
    }

    #[test]
    fn test_output_is_stable() {
        let doc = sample();
        assert_eq!(
            to_json(&doc, JsonFormat::Compact).unwrap(),
            to_json(&doc, JsonFormat::Compact).unwrap()
        );
    }

    #[test]
    fn test_to_writer() {
        let mut buf = Vec::new();
        to_writer(&mut buf, &sample(), JsonFormat::Compact).unwrap();
        let parsed: StructuredDocument = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, sample());
    }
}
