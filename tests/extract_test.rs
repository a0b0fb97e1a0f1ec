//! Integration tests for extraction from real PDF bytes.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Object, Stream};

use pdfblocks::{
    extract_bytes, extract_bytes_with_options, transform, Document, EntityType, Error,
    ExtractOptions, OcrError, OcrProvider, PageSelection, Pdfblocks,
};

fn text_ops(font: &str, size: i64, x: i64, y: i64, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ]
}

/// Two letter-size pages: a heading, a paragraph and a small table on the
/// first; a closing line and an image on the second.
fn create_test_pdf() -> Vec<u8> {
    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let image = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 2,
            "Height" => 2,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        vec![0, 255, 255, 0],
    ));
    let resources = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
        "XObject" => dictionary! {
            "Im1" => image,
        },
    });

    let mut first = Vec::new();
    first.extend(text_ops("F2", 24, 72, 720, "Annual Report"));
    first.extend(text_ops("F1", 12, 72, 680, "Sales rose in every region this year,"));
    first.extend(text_ops("F1", 12, 72, 666, "led by strong demand."));
    for (y, left, right) in [(600, "Item", "Qty"), (584, "Apples", "3"), (568, "Pears", "5")] {
        first.extend(text_ops("F1", 12, 72, y, left));
        first.extend(text_ops("F1", 12, 300, y, right));
    }

    let mut second = text_ops("F1", 12, 72, 720, "Closing remarks follow.");
    second.extend([
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![200.into(), 0.into(), 0.into(), 100.into(), 72.into(), 400.into()],
        ),
        Operation::new("Do", vec!["Im1".into()]),
        Operation::new("Q", vec![]),
    ]);

    let mut kids: Vec<Object> = Vec::new();
    for operations in [first, second] {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => 2,
        "Resources" => resources,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal("Annual Report"),
        "Author" => Object::string_literal("Finance Team"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

#[test]
fn test_extract_text_runs() {
    let raw = extract_bytes(&create_test_pdf()).unwrap();

    assert_eq!(raw.total_pages, 2);
    assert_eq!(raw.pages.len(), 2);
    assert!(raw.warnings.is_empty());

    let runs: Vec<_> = raw.pages[0].text_runs().collect();
    assert_eq!(runs[0].text, "Annual Report");
    assert!(runs[0].is_bold());
    assert_eq!(runs[0].font_size, 24.0);
    assert!(runs[0].bbox.y0 < runs[1].bbox.y0);
}

#[test]
fn test_extract_metadata() {
    let raw = extract_bytes(&create_test_pdf()).unwrap();
    assert_eq!(raw.metadata.pdf_version.as_deref(), Some("1.5"));
    assert_eq!(raw.metadata.title.as_deref(), Some("Annual Report"));
    assert_eq!(raw.metadata.author.as_deref(), Some("Finance Team"));
}

#[test]
fn test_extract_table_cells() {
    let raw = extract_bytes(&create_test_pdf()).unwrap();
    let cells: Vec<_> = raw.pages[0].table_cells().collect();
    assert_eq!(cells.len(), 6);
    assert!(cells.iter().any(|c| c.row == 1 && c.col == 0 && c.text == "Apples"));
}

#[test]
fn test_extract_image_without_ocr() {
    let raw = extract_bytes(&create_test_pdf()).unwrap();
    let images: Vec<_> = raw.pages[1].images().collect();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].image_ref, "page2_Im1");
    assert!(images[0].ocr_text.is_empty());
}

#[test]
fn test_full_pipeline_with_ocr() {
    let doc = Pdfblocks::new()
        .with_ocr(OcrProvider::shared(|image: &[u8]| {
            // The unfiltered gray samples arrive wrapped in a PNG.
            if image.starts_with(b"\x89PNG") {
                Ok("Chart text".to_string())
            } else {
                Err(OcrError::UnsupportedImage("raw samples".to_string()))
            }
        }))
        .open_bytes(&create_test_pdf())
        .unwrap();

    let kinds: Vec<EntityType> = doc.blocks().map(|(_, _, kind)| kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntityType::Heading,
            EntityType::Paragraph,
            EntityType::Table,
            EntityType::Paragraph,
            EntityType::Image,
        ]
    );
    assert_eq!(
        doc.get_data(1).unwrap().text(),
        Some("Sales rose in every region this year, led by strong demand.")
    );
    assert_eq!(doc.get(4).unwrap().title, "Chart text");
    assert_eq!(
        doc.get_data(4).unwrap().image().map(|i| i.ocr_text.as_str()),
        Some("Chart text")
    );
}

#[test]
fn test_page_selection() {
    let options = ExtractOptions::new().with_pages(PageSelection::Range(2..=2));
    let raw = extract_bytes_with_options(&create_test_pdf(), options).unwrap();
    assert_eq!(raw.pages.len(), 1);
    assert_eq!(raw.pages[0].number, 2);
    assert_eq!(raw.total_pages, 2);

    let doc = Document::new(transform(&raw)).unwrap();
    assert_eq!(doc.get_data(0).unwrap().text(), Some("Closing remarks follow."));
}

#[test]
fn test_strict_page_out_of_range() {
    let options = ExtractOptions::new()
        .strict()
        .with_pages(PageSelection::Range(5..=6));
    let err = extract_bytes_with_options(&create_test_pdf(), options).unwrap_err();
    assert!(matches!(err, Error::PageOutOfRange(5, 2)));
}

#[test]
fn test_not_a_pdf() {
    let err = extract_bytes(b"PK\x03\x04 this is a zip file").unwrap_err();
    assert!(matches!(err, Error::UnknownFormat));
    assert!(err.is_source_error());
}

#[test]
fn test_truncated_pdf() {
    let err = extract_bytes(b"%PDF-1.7\n1 0 obj\n<<").unwrap_err();
    assert!(err.is_source_error());
}
