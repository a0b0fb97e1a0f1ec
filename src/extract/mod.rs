//! Raw extraction: PDF source → page primitives.
//!
//! [`Extractor`] walks every selected page through a [`PdfBackend`],
//! interprets its content stream into text runs and image placements, groups
//! aligned runs into table cells, and fills image regions with OCR text.
//! Only an unreadable source is an error; a broken page or a failed OCR call
//! becomes a [`Warning`] on the returned [`RawDocument`].

pub mod backend;
pub mod content;
pub mod image;
pub mod ocr;
pub mod options;
pub mod table_detector;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::detect;
use crate::error::{Error, Result, Warning};
use crate::model::{ImageRegion, RawDocument, RawPage, TextRun};

pub use backend::{
    BackendFontInfo, ContentOp, ImageXObject, LopdfBackend, PageId, PdfBackend, PdfValue,
};
pub use content::{ContentInterpreter, PageContent, PlacedImage};
pub use ocr::{OcrEngine, OcrError, OcrJob, OcrOutcome, OcrProvider, SharedOcrEngine};
pub use options::{ErrorMode, ExtractOptions, PageSelection};
pub use table_detector::{TableDetector, TableDetectorConfig};

/// Extracts page primitives from one PDF source.
pub struct Extractor<B: PdfBackend = LopdfBackend> {
    backend: B,
    options: ExtractOptions,
    ocr: Option<OcrProvider>,
    filename: Option<String>,
}

impl Extractor<LopdfBackend> {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, ExtractOptions::default())
    }

    /// Open a PDF file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: ExtractOptions) -> Result<Self> {
        let path = path.as_ref();
        detect::sniff_path(path)?;
        let backend = LopdfBackend::load_file(path)?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());

        Ok(Self {
            filename,
            ..Self::with_backend(backend, options)
        })
    }

    /// Load a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, ExtractOptions::default())
    }

    /// Load a PDF from bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: ExtractOptions) -> Result<Self> {
        detect::sniff_bytes(data)?;
        let backend = LopdfBackend::load_bytes(data)?;
        Ok(Self::with_backend(backend, options))
    }

    /// Load a PDF from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_with_options(reader, ExtractOptions::default())
    }

    /// Load a PDF from a reader with custom options.
    pub fn from_reader_with_options<R: Read>(mut reader: R, options: ExtractOptions) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes_with_options(&data, options)
    }
}

impl<B: PdfBackend> Extractor<B> {
    /// Extract through any backend.
    pub fn with_backend(backend: B, options: ExtractOptions) -> Self {
        Self {
            backend,
            options,
            ocr: None,
            filename: None,
        }
    }

    /// Attach an OCR provider. Without one, every image gets empty text.
    pub fn with_ocr(mut self, provider: OcrProvider) -> Self {
        self.ocr = Some(provider);
        self
    }

    /// Record a source file name on the output.
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// The options in use.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Number of pages in the source.
    pub fn page_count(&self) -> u32 {
        self.backend.pages().len() as u32
    }

    /// Extract every selected page.
    pub fn extract(&self) -> Result<RawDocument> {
        let pages = self.backend.pages();
        let total = pages.len() as u32;
        self.check_selection(total)?;

        let mut doc = RawDocument {
            filename: self.filename.clone(),
            total_pages: total,
            metadata: self.backend.metadata(),
            ..Default::default()
        };

        // (page index in doc, primitive index, job)
        let mut pending: Vec<(usize, usize, OcrJob)> = Vec::new();

        for (&number, &page_id) in &pages {
            if !self.options.pages.includes(number) {
                continue;
            }

            match self.extract_page(number, page_id) {
                Ok((page, jobs)) => {
                    let page_idx = doc.pages.len();
                    pending.extend(jobs.into_iter().map(|(prim, job)| (page_idx, prim, job)));
                    doc.pages.push(page);
                }
                Err(e) if self.options.error_mode == ErrorMode::Strict => return Err(e),
                Err(e) => {
                    log::warn!("Skipping page {}: {}", number, e);
                    doc.warnings.push(Warning::PageSkipped {
                        page: number,
                        reason: e.to_string(),
                    });
                    doc.pages
                        .push(RawPage::new(number, self.backend.page_size(page_id)));
                }
            }
        }

        self.recognize_images(&mut doc, pending);

        log::debug!(
            "Extracted {} primitives from {} of {} pages",
            doc.primitive_count(),
            doc.pages.len(),
            total
        );
        Ok(doc)
    }

    fn check_selection(&self, total: u32) -> Result<()> {
        if self.options.error_mode != ErrorMode::Strict {
            return Ok(());
        }
        let out_of_range = match &self.options.pages {
            PageSelection::All => None,
            PageSelection::Range(range) => Some(*range.start()).filter(|&p| p > total),
            PageSelection::Pages(pages) => pages.iter().copied().find(|&p| p > total),
        };
        match out_of_range {
            Some(page) => Err(Error::PageOutOfRange(page, total)),
            None => Ok(()),
        }
    }

    /// Extract one page and list the images it needs recognized, keyed by
    /// primitive index.
    fn extract_page(&self, number: u32, page_id: PageId) -> Result<(RawPage, Vec<(usize, OcrJob)>)> {
        let size = self.backend.page_size(page_id);
        let fonts: HashMap<Vec<u8>, String> = self
            .backend
            .page_fonts(page_id)?
            .into_iter()
            .map(|f| (f.name, f.base_font))
            .collect();
        let ops = self.backend.page_operations(page_id)?;

        let content = ContentInterpreter::new(&self.backend, page_id, number, size, fonts).run(&ops);
        let mut page = RawPage::new(number, size);

        let native_text: Vec<(f32, f32)> = content
            .runs
            .iter()
            .map(|r| (r.bbox.center_x(), r.bbox.center_y()))
            .collect();

        let runs: Vec<TextRun> = if self.options.detect_tables {
            let detector = TableDetector::with_config(self.options.table.clone());
            let (tables, rest) = detector.detect(content.runs);
            for (table_id, table) in tables.iter().enumerate() {
                log::debug!(
                    "Page {}: table {} with {} rows x {} columns",
                    number,
                    table_id,
                    table.rows.len(),
                    table.columns.len()
                );
                for cell in detector.to_cells(table, table_id as u32, number) {
                    page.push(cell);
                }
            }
            rest
        } else {
            content.runs
        };
        for run in runs {
            page.push(run);
        }

        let mut jobs = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let min_size = self.options.min_image_size;

        for placed in content.images {
            if placed.bbox.width() < min_size || placed.bbox.height() < min_size {
                continue;
            }

            let count = seen.entry(placed.name.clone()).or_insert(0);
            *count += 1;
            let image_ref = if *count == 1 {
                format!("page{}_{}", number, placed.name)
            } else {
                format!("page{}_{}_{}", number, placed.name, count)
            };

            let has_native_text = self.options.skip_ocr_with_native_text
                && native_text
                    .iter()
                    .any(|&(x, y)| placed.bbox.contains_point(x, y));

            if self.ocr.is_some() && !has_native_text {
                jobs.push((
                    page.primitives.len(),
                    OcrJob {
                        page: number,
                        image_ref: image_ref.clone(),
                        image: placed.xobject,
                    },
                ));
            }
            page.push(ImageRegion::new(image_ref, placed.bbox, number));
        }

        Ok((page, jobs))
    }

    /// Run OCR over every pending image and write the text back in place.
    fn recognize_images(&self, doc: &mut RawDocument, pending: Vec<(usize, usize, OcrJob)>) {
        let Some(provider) = &self.ocr else { return };
        if pending.is_empty() {
            return;
        }

        let (slots, jobs): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .map(|(page, prim, job)| ((page, prim, job.page, job.image_ref.clone()), job))
            .unzip();

        let outcomes = ocr::run_ocr(
            provider,
            jobs,
            self.options.ocr_workers,
            self.options.ocr_timeout,
        );

        for ((page_idx, prim_idx, page, image_ref), outcome) in slots.into_iter().zip(outcomes) {
            let text = match outcome {
                OcrOutcome::Text(text) => text.trim().to_string(),
                OcrOutcome::Failed(reason) => {
                    log::warn!("OCR failed for {} on page {}: {}", image_ref, page, reason);
                    doc.warnings.push(Warning::OcrFailed {
                        page,
                        image_ref,
                        reason,
                    });
                    continue;
                }
                OcrOutcome::TimedOut => {
                    doc.warnings.push(Warning::OcrTimedOut { page, image_ref });
                    continue;
                }
            };

            if let Some(crate::model::Primitive::ImageRegion(region)) = doc
                .pages
                .get_mut(page_idx)
                .and_then(|p| p.primitives.get_mut(prim_idx))
            {
                region.ocr_text = text;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::model::{PageSize, Primitive};

    /// In-memory backend: each page is a list of operations.
    struct MockBackend {
        pages: Vec<Option<Vec<ContentOp>>>,
    }

    impl PdfBackend for MockBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            (1..=self.pages.len() as u32).map(|n| (n, (n, 0))).collect()
        }
        fn page_size(&self, _page: PageId) -> PageSize {
            PageSize::letter()
        }
        fn page_fonts(&self, _page: PageId) -> Result<Vec<BackendFontInfo>> {
            Ok(vec![BackendFontInfo {
                name: b"F1".to_vec(),
                base_font: "Helvetica".to_string(),
            }])
        }
        fn page_content(&self, _page: PageId) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn decode_content(&self, _data: &[u8]) -> Result<Vec<ContentOp>> {
            Ok(Vec::new())
        }
        fn page_operations(&self, page: PageId) -> Result<Vec<ContentOp>> {
            self.pages[page.0 as usize - 1]
                .clone()
                .ok_or_else(|| Error::Corrupted("bad content stream".to_string()))
        }
        fn decode_text(&self, _page: PageId, _font: &[u8], bytes: &[u8]) -> String {
            backend::decode_text_simple(bytes)
        }
        fn image_xobject(&self, _page: PageId, name: &[u8]) -> Option<ImageXObject> {
            // "Raw*" images are unfiltered 2x2 grayscale samples.
            if name.starts_with(b"Raw") {
                return Some(ImageXObject {
                    width: 2,
                    height: 2,
                    filter: String::new(),
                    color_space: "DeviceGray".to_string(),
                    components: 1,
                    bits_per_component: 8,
                    data: vec![0, 255, 255, 0],
                });
            }
            Some(ImageXObject {
                width: 100,
                height: 100,
                filter: "DCTDecode".to_string(),
                color_space: "DeviceRGB".to_string(),
                components: 3,
                bits_per_component: 8,
                data: name.to_vec(),
            })
        }
    }

    fn text_page(text: &str) -> Vec<ContentOp> {
        vec![
            ContentOp::new("BT", vec![]),
            ContentOp::new("Tf", vec![PdfValue::Name(b"F1".to_vec()), PdfValue::Real(12.0)]),
            ContentOp::new("Td", vec![PdfValue::Real(72.0), PdfValue::Real(700.0)]),
            ContentOp::new("Tj", vec![PdfValue::Str(text.as_bytes().to_vec())]),
            ContentOp::new("ET", vec![]),
        ]
    }

    fn image_page(names: &[&str]) -> Vec<ContentOp> {
        let mut ops = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let y = 100.0 + i as f32 * 200.0;
            ops.push(ContentOp::new("q", vec![]));
            ops.push(ContentOp::new(
                "cm",
                [150.0, 0.0, 0.0, 100.0, 72.0, y]
                    .into_iter()
                    .map(PdfValue::Real)
                    .collect(),
            ));
            ops.push(ContentOp::new("Do", vec![PdfValue::Name(name.as_bytes().to_vec())]));
            ops.push(ContentOp::new("Q", vec![]));
        }
        ops
    }

    fn extractor(pages: Vec<Option<Vec<ContentOp>>>) -> Extractor<MockBackend> {
        Extractor::with_backend(MockBackend { pages }, ExtractOptions::default())
    }

    #[test]
    fn test_malformed_page_is_skipped() {
        let doc = extractor(vec![Some(text_page("first")), None, Some(text_page("third"))])
            .extract()
            .unwrap();

        assert_eq!(doc.total_pages, 3);
        assert_eq!(doc.pages.len(), 3);
        assert!(doc.pages[1].is_empty());
        assert_eq!(doc.pages[2].text_runs().next().unwrap().text, "third");
        assert!(matches!(
            doc.warnings.as_slice(),
            [Warning::PageSkipped { page: 2, .. }]
        ));
    }

    #[test]
    fn test_strict_mode_fails_on_bad_page() {
        let ex = Extractor::with_backend(
            MockBackend {
                pages: vec![Some(text_page("ok")), None],
            },
            ExtractOptions::new().strict(),
        );
        assert!(matches!(ex.extract(), Err(Error::Corrupted(_))));
    }

    #[test]
    fn test_page_selection() {
        let ex = Extractor::with_backend(
            MockBackend {
                pages: vec![Some(text_page("a")), Some(text_page("b"))],
            },
            ExtractOptions::new().with_pages(PageSelection::Pages(vec![2])),
        );
        let doc = ex.extract().unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].number, 2);
        assert_eq!(doc.total_pages, 2);
    }

    #[test]
    fn test_strict_selection_out_of_range() {
        let ex = Extractor::with_backend(
            MockBackend {
                pages: vec![Some(text_page("a"))],
            },
            ExtractOptions::new()
                .strict()
                .with_pages(PageSelection::Pages(vec![4])),
        );
        assert!(matches!(ex.extract(), Err(Error::PageOutOfRange(4, 1))));
    }

    #[test]
    fn test_images_without_ocr_have_empty_text() {
        let doc = extractor(vec![Some(image_page(&["Im1", "Im1"]))])
            .extract()
            .unwrap();

        let images: Vec<_> = doc.pages[0].images().collect();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].image_ref, "page1_Im1");
        assert_eq!(images[1].image_ref, "page1_Im1_2");
        assert!(images.iter().all(|i| i.ocr_text.is_empty()));
    }

    #[test]
    fn test_small_images_are_ignored() {
        let mut ops = image_page(&["Im1"]);
        ops[1] = ContentOp::new(
            "cm",
            [20.0, 0.0, 0.0, 20.0, 72.0, 100.0]
                .into_iter()
                .map(PdfValue::Real)
                .collect(),
        );
        let doc = extractor(vec![Some(ops)]).extract().unwrap();
        assert_eq!(doc.pages[0].images().count(), 0);
    }

    #[test]
    fn test_ocr_text_written_back() {
        let provider = OcrProvider::shared(|image: &[u8]| {
            Ok::<_, OcrError>(format!("  text of {}\n", String::from_utf8_lossy(image)))
        });
        let doc = extractor(vec![Some(image_page(&["Im1", "Im2"]))])
            .with_ocr(provider)
            .extract()
            .unwrap();

        let texts: Vec<&str> = doc.pages[0].images().map(|i| i.ocr_text.as_str()).collect();
        assert_eq!(texts, vec!["text of Im1", "text of Im2"]);
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_ocr_failure_degrades_to_warning() {
        let provider = OcrProvider::shared_arc(Arc::new(|image: &[u8]| {
            if image == b"Im2" {
                Err(OcrError::Engine("unreadable".to_string()))
            } else {
                Ok("fine".to_string())
            }
        }));
        let doc = extractor(vec![Some(image_page(&["Im1", "Im2"]))])
            .with_ocr(provider)
            .extract()
            .unwrap();

        let images: Vec<_> = doc.pages[0].images().collect();
        assert_eq!(images[0].ocr_text, "fine");
        assert_eq!(images[1].ocr_text, "");
        assert!(matches!(
            doc.warnings.as_slice(),
            [Warning::OcrFailed { page: 1, image_ref, .. }] if image_ref == "page1_Im2"
        ));
    }

    #[test]
    fn test_unfiltered_image_reaches_engine_as_png() {
        let provider = OcrProvider::shared(|image: &[u8]| {
            if image.starts_with(b"\x89PNG\r\n\x1a\n") {
                Ok("scanned".to_string())
            } else {
                Err(OcrError::UnsupportedImage("not an image file".to_string()))
            }
        });
        let doc = extractor(vec![Some(image_page(&["Raw1"]))])
            .with_ocr(provider)
            .extract()
            .unwrap();

        assert_eq!(doc.pages[0].images().next().unwrap().ocr_text, "scanned");
        assert!(doc.warnings.is_empty());
    }

    #[test]
    fn test_native_text_skips_ocr() {
        let mut ops = image_page(&["Im1"]);
        // Text drawn inside the image area: y=150 in PDF space.
        ops.extend([
            ContentOp::new("BT", vec![]),
            ContentOp::new("Tf", vec![PdfValue::Name(b"F1".to_vec()), PdfValue::Real(10.0)]),
            ContentOp::new("Td", vec![PdfValue::Real(80.0), PdfValue::Real(150.0)]),
            ContentOp::new("Tj", vec![PdfValue::Str(b"label".to_vec())]),
            ContentOp::new("ET", vec![]),
        ]);

        let provider = OcrProvider::shared(|_: &[u8]| -> std::result::Result<String, OcrError> {
            panic!("OCR should not run")
        });
        let doc = extractor(vec![Some(ops)]).with_ocr(provider).extract().unwrap();

        let image = doc.pages[0].images().next().unwrap();
        assert_eq!(image.ocr_text, "");
        assert!(doc.warnings.is_empty());
        assert!(doc.pages[0]
            .primitives
            .iter()
            .any(|p| matches!(p, Primitive::TextRun(r) if r.text == "label")));
    }
}
