//! The transformation pipeline: classify, order, assemble.
//!
//! Each document is processed sequentially, page by page. Independent
//! documents can be transformed in parallel with [`transform_batch`].

pub mod assemble;
pub mod classify;
pub mod options;
pub mod order;
pub mod text;

pub use assemble::{Assembler, OrderedPage};
pub use classify::{classify_page, ClassifiedPrimitive, FontStatistics};
pub use options::TransformOptions;
pub use order::order_page;

use rayon::prelude::*;

use crate::model::{RawDocument, RawPage, StructuredDocument};

/// Transform raw primitives into a structured document with default options.
pub fn transform(raw: &RawDocument) -> StructuredDocument {
    transform_with_options(raw, &TransformOptions::default())
}

/// Transform raw primitives into a structured document.
///
/// The output is a pure function of the input: identical primitives and
/// options always yield identical blocks.
pub fn transform_with_options(raw: &RawDocument, options: &TransformOptions) -> StructuredDocument {
    let stats = FontStatistics::from_document(raw, options);

    let mut pages: Vec<&RawPage> = raw.pages.iter().collect();
    pages.sort_by_key(|p| p.number);

    let mut assembler = Assembler::new(options);
    for page in pages {
        let classified = classify_page(page, &stats, options);
        let items = order_page(classified, options);
        assembler.push_page(OrderedPage {
            number: page.number,
            size: page.size,
            items,
        });
    }
    let blocks = assembler.finish();

    log::debug!(
        "Transformed {} primitives into {} blocks",
        raw.primitive_count(),
        blocks.len()
    );

    StructuredDocument {
        filename: raw.filename.clone(),
        total_pages: raw.total_pages.max(raw.pages.len() as u32),
        metadata: raw.metadata.clone(),
        warnings: raw.warnings.clone(),
        blocks,
    }
}

/// Transform several documents in parallel.
///
/// Results are returned in input order.
pub fn transform_batch(docs: &[RawDocument], options: &TransformOptions) -> Vec<StructuredDocument> {
    docs.par_iter()
        .map(|doc| transform_with_options(doc, options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, EntityType, PageSize, TextRun};

    fn doc(texts: &[(&str, f32, f32)]) -> RawDocument {
        let mut page = RawPage::new(1, PageSize::letter());
        for &(text, size, y) in texts {
            let width = text.chars().count() as f32 * size * 0.5;
            page.push(TextRun::new(text, size, BBox::new(72.0, y, 72.0 + width, y + size), 1));
        }
        let mut doc = RawDocument::new();
        doc.add_page(page);
        doc
    }

    #[test]
    fn test_transform_heading_and_paragraph() {
        let raw = doc(&[("Report Title", 24.0, 72.0), ("This is body text.", 12.0, 120.0)]);
        let out = transform(&raw);

        assert_eq!(out.blocks.len(), 2);
        assert_eq!(out.blocks[0].entity_type, EntityType::Heading);
        assert_eq!(out.blocks[0].title, "Report Title");
        assert_eq!(out.blocks[1].entity_type, EntityType::Paragraph);
        assert_eq!(out.blocks[1].payload.text(), Some("This is body text."));
        assert_eq!(out.total_pages, 1);
    }

    #[test]
    fn test_pages_processed_in_order() {
        let mut raw = RawDocument::new();
        for number in [2, 1] {
            let mut page = RawPage::new(number, PageSize::letter());
            page.push(TextRun::new(
                format!("Page {} text.", number),
                12.0,
                BBox::new(72.0, 300.0, 200.0, 312.0),
                number,
            ));
            raw.add_page(page);
        }
        let out = transform(&raw);
        assert_eq!(out.blocks[0].payload.text(), Some("Page 1 text."));
        assert_eq!(out.blocks[1].payload.text(), Some("Page 2 text."));
    }

    #[test]
    fn test_batch_matches_sequential() {
        let docs = vec![
            doc(&[("One", 20.0, 72.0), ("Body one.", 12.0, 120.0)]),
            doc(&[("Two", 20.0, 72.0), ("Body two.", 12.0, 120.0)]),
        ];
        let options = TransformOptions::default();
        let batch = transform_batch(&docs, &options);
        let sequential: Vec<_> = docs
            .iter()
            .map(|d| transform_with_options(d, &options))
            .collect();
        assert_eq!(batch, sequential);
    }
}
