//! Content stream interpretation.
//!
//! Walks a page's decoded operations, tracking the graphics and text state,
//! and emits positioned text runs and image placements. Coordinates are
//! converted from PDF user space (bottom-left origin) to the top-left page
//! space used by [`BBox`].

use std::collections::HashMap;

use crate::model::{BBox, FontWeight, PageSize, TextRun};

use super::backend::{ContentOp, ImageXObject, PageId, PdfBackend, PdfValue};

/// Ascender share of the font size above the baseline.
const ASCENT: f32 = 0.8;
/// Descender share of the font size below the baseline.
const DESCENT: f32 = 0.2;
/// Average glyph advance as a share of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;
/// TJ adjustment (thousandths of an em) treated as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

/// An image XObject drawn on the page.
#[derive(Debug, Clone)]
pub struct PlacedImage {
    /// Resource name (e.g. "Im1")
    pub name: String,
    /// Placement on the page
    pub bbox: BBox,
    /// The resolved image
    pub xobject: ImageXObject,
}

/// Everything drawn on one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Text runs in content stream order
    pub runs: Vec<TextRun>,
    /// Image placements in content stream order
    pub images: Vec<PlacedImage>,
}

/// A 2D affine transform `[a b c d e f]` as PDF writes it.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    fn from_op(op: &ContentOp) -> Option<Self> {
        Some(Self {
            a: op.number(0)?,
            b: op.number(1)?,
            c: op.number(2)?,
            d: op.number(3)?,
            e: op.number(4)?,
            f: op.number(5)?,
        })
    }

    fn translation(tx: f32, ty: f32) -> Self {
        Self {
            e: tx,
            f: ty,
            ..Self::IDENTITY
        }
    }

    /// `self × other`: apply `self` first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }

    fn horizontal_scale(&self) -> f32 {
        (self.a * self.a + self.b * self.b).sqrt()
    }
}

#[derive(Debug, Clone)]
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
    font: Vec<u8>,
    font_size: f32,
    leading: Option<f32>,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font: Vec::new(),
            font_size: 12.0,
            leading: None,
        }
    }
}

impl TextState {
    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translation(tx, ty).then(&self.line_matrix);
        self.matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.leading.unwrap_or(self.font_size * 1.2);
        self.move_line(0.0, -leading);
    }

    fn advance(&mut self, tx: f32) {
        self.matrix = Matrix::translation(tx, 0.0).then(&self.matrix);
    }
}

/// Interprets one page's content stream.
pub struct ContentInterpreter<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
    page_id: PageId,
    page_number: u32,
    size: PageSize,
    fonts: HashMap<Vec<u8>, String>,
    ctm: Matrix,
    ctm_stack: Vec<Matrix>,
    text: TextState,
    in_text: bool,
    content: PageContent,
}

impl<'a, B: PdfBackend + ?Sized> ContentInterpreter<'a, B> {
    /// Create an interpreter for a page. `fonts` maps resource names to base
    /// font names.
    pub fn new(
        backend: &'a B,
        page_id: PageId,
        page_number: u32,
        size: PageSize,
        fonts: HashMap<Vec<u8>, String>,
    ) -> Self {
        Self {
            backend,
            page_id,
            page_number,
            size,
            fonts,
            ctm: Matrix::IDENTITY,
            ctm_stack: Vec::new(),
            text: TextState::default(),
            in_text: false,
            content: PageContent::default(),
        }
    }

    /// Run every operation and return what was drawn.
    pub fn run(mut self, ops: &[ContentOp]) -> PageContent {
        for op in ops {
            self.apply(op);
        }
        self.content
    }

    fn apply(&mut self, op: &ContentOp) {
        match op.operator.as_str() {
            "q" => self.ctm_stack.push(self.ctm),
            "Q" => {
                if let Some(m) = self.ctm_stack.pop() {
                    self.ctm = m;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_op(op) {
                    self.ctm = m.then(&self.ctm);
                }
            }
            "BT" => {
                self.in_text = true;
                self.text.matrix = Matrix::IDENTITY;
                self.text.line_matrix = Matrix::IDENTITY;
            }
            "ET" => self.in_text = false,
            "Tf" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    self.text.font = name.clone();
                }
                if let Some(size) = op.number(1) {
                    self.text.font_size = size;
                }
            }
            "TL" => self.text.leading = op.number(0),
            "Td" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    self.text.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (op.number(0), op.number(1)) {
                    self.text.leading = Some(-ty);
                    self.text.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_op(op) {
                    self.text.matrix = m;
                    self.text.line_matrix = m;
                }
            }
            "T*" => self.text.next_line(),
            "Tj" => {
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    self.show_array(items);
                }
            }
            "'" => {
                self.text.next_line();
                if let Some(PdfValue::Str(bytes)) = op.operands.first() {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "\"" => {
                self.text.next_line();
                if let Some(PdfValue::Str(bytes)) = op.operands.get(2) {
                    let text = self.decode(bytes);
                    self.show(text);
                }
            }
            "Do" => {
                if let Some(PdfValue::Name(name)) = op.operands.first() {
                    self.place_image(name);
                }
            }
            _ => {}
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        self.backend.decode_text(self.page_id, &self.text.font, bytes)
    }

    fn show_array(&mut self, items: &[PdfValue]) {
        let mut combined = String::new();
        let mut adjustment = 0.0;
        for item in items {
            match item {
                PdfValue::Str(bytes) => combined.push_str(&self.decode(bytes)),
                other => {
                    let Some(n) = other.as_number() else { continue };
                    adjustment += n;
                    if -n > TJ_SPACE_THRESHOLD
                        && !combined.is_empty()
                        && !combined.ends_with(' ')
                        && !combined.ends_with('\u{00A0}')
                    {
                        let last = combined.chars().last();
                        if !last.is_some_and(crate::pipeline::text::is_spaceless_script_char) {
                            combined.push(' ');
                        }
                    }
                }
            }
        }
        self.show(combined);
        // Kerning moves the pen against the number's sign.
        self.text.advance(-adjustment / 1000.0 * self.text.font_size);
    }

    fn show(&mut self, text: String) {
        let chars = text.chars().count() as f32;
        let advance = chars * self.text.font_size * AVG_CHAR_WIDTH;

        if self.in_text && !text.trim().is_empty() {
            let trm = self.text.matrix.then(&self.ctm);
            let (x, y) = trm.apply(0.0, 0.0);
            let size = self.text.font_size * trm.vertical_scale();
            let width = advance * trm.horizontal_scale();

            let top = self.size.height - (y + ASCENT * size);
            let bottom = self.size.height - (y - DESCENT * size);
            let bbox = BBox::new(x, top, x + width, bottom);

            let weight = self
                .fonts
                .get(&self.text.font)
                .map(|name| FontWeight::from_font_name(name))
                .unwrap_or_default();

            self.content.runs.push(
                TextRun::new(text.trim_end_matches(['\r', '\n']), size, bbox, self.page_number)
                    .with_weight(weight),
            );
        }

        self.text.advance(advance);
    }

    fn place_image(&mut self, name: &[u8]) {
        let Some(xobject) = self.backend.image_xobject(self.page_id, name) else {
            return;
        };

        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)].map(|(u, v)| self.ctm.apply(u, v));
        let xs = corners.iter().map(|p| p.0);
        let ys = corners.iter().map(|p| p.1);
        let x0 = xs.clone().fold(f32::INFINITY, f32::min);
        let x1 = xs.fold(f32::NEG_INFINITY, f32::max);
        let y0 = ys.clone().fold(f32::INFINITY, f32::min);
        let y1 = ys.fold(f32::NEG_INFINITY, f32::max);

        let bbox = BBox::new(x0, self.size.height - y1, x1, self.size.height - y0);
        self.content.images.push(PlacedImage {
            name: String::from_utf8_lossy(name).to_string(),
            bbox,
            xobject,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::error::Result;
    use crate::extract::backend::{decode_text_simple, BackendFontInfo};

    struct StubBackend;

    impl PdfBackend for StubBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            BTreeMap::from([(1, (1, 0))])
        }
        fn page_size(&self, _page: PageId) -> PageSize {
            PageSize::letter()
        }
        fn page_fonts(&self, _page: PageId) -> Result<Vec<BackendFontInfo>> {
            Ok(Vec::new())
        }
        fn page_content(&self, _page: PageId) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
        fn decode_content(&self, _data: &[u8]) -> Result<Vec<ContentOp>> {
            Ok(Vec::new())
        }
        fn decode_text(&self, _page: PageId, _font: &[u8], bytes: &[u8]) -> String {
            decode_text_simple(bytes)
        }
        fn image_xobject(&self, _page: PageId, name: &[u8]) -> Option<ImageXObject> {
            (name == b"Im1").then(|| ImageXObject {
                width: 10,
                height: 10,
                filter: "DCTDecode".to_string(),
                color_space: "DeviceRGB".to_string(),
                components: 3,
                bits_per_component: 8,
                data: vec![0xFF, 0xD8],
            })
        }
    }

    fn num(v: f32) -> PdfValue {
        PdfValue::Real(v)
    }

    fn name(n: &str) -> PdfValue {
        PdfValue::Name(n.as_bytes().to_vec())
    }

    fn string(s: &str) -> PdfValue {
        PdfValue::Str(s.as_bytes().to_vec())
    }

    fn run(ops: Vec<ContentOp>) -> PageContent {
        let fonts = HashMap::from([
            (b"F1".to_vec(), "Helvetica".to_string()),
            (b"F2".to_vec(), "Helvetica-Bold".to_string()),
        ]);
        ContentInterpreter::new(&StubBackend, (1, 0), 1, PageSize::letter(), fonts).run(&ops)
    }

    #[test]
    fn test_text_position_is_top_left() {
        let content = run(vec![
            ContentOp::new("BT", vec![]),
            ContentOp::new("Tf", vec![name("F2"), num(20.0)]),
            ContentOp::new("Td", vec![num(72.0), num(700.0)]),
            ContentOp::new("Tj", vec![string("Title")]),
            ContentOp::new("ET", vec![]),
        ]);

        assert_eq!(content.runs.len(), 1);
        let r = &content.runs[0];
        assert_eq!(r.text, "Title");
        assert!(r.is_bold());
        assert_eq!(r.font_size, 20.0);
        assert!((r.bbox.x0 - 72.0).abs() < 0.01);
        assert!((r.bbox.y0 - (792.0 - 716.0)).abs() < 0.01);
        assert!((r.bbox.y1 - (792.0 - 696.0)).abs() < 0.01);
        assert!((r.bbox.width() - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_next_line_uses_leading() {
        let content = run(vec![
            ContentOp::new("BT", vec![]),
            ContentOp::new("Tf", vec![name("F1"), num(10.0)]),
            ContentOp::new("TL", vec![num(14.0)]),
            ContentOp::new("Td", vec![num(72.0), num(700.0)]),
            ContentOp::new("Tj", vec![string("one")]),
            ContentOp::new("T*", vec![]),
            ContentOp::new("Tj", vec![string("two")]),
            ContentOp::new("ET", vec![]),
        ]);

        assert_eq!(content.runs.len(), 2);
        let dy = content.runs[1].bbox.y0 - content.runs[0].bbox.y0;
        assert!((dy - 14.0).abs() < 0.01);
        assert!((content.runs[1].bbox.x0 - 72.0).abs() < 0.01);
    }

    #[test]
    fn test_tj_array_spacing() {
        let content = run(vec![
            ContentOp::new("BT", vec![]),
            ContentOp::new("Tf", vec![name("F1"), num(12.0)]),
            ContentOp::new(
                "TJ",
                vec![PdfValue::Array(vec![
                    string("Hello"),
                    PdfValue::Integer(-300),
                    string("World"),
                    PdfValue::Integer(-20),
                    string("!"),
                ])],
            ),
            ContentOp::new("ET", vec![]),
        ]);
        assert_eq!(content.runs[0].text, "Hello World!");
    }

    #[test]
    fn test_text_outside_bt_is_ignored() {
        let content = run(vec![ContentOp::new("Tj", vec![string("stray")])]);
        assert!(content.runs.is_empty());
    }

    #[test]
    fn test_ctm_scales_text() {
        let content = run(vec![
            ContentOp::new("q", vec![]),
            ContentOp::new("cm", vec![num(2.0), num(0.0), num(0.0), num(2.0), num(0.0), num(0.0)]),
            ContentOp::new("BT", vec![]),
            ContentOp::new("Tf", vec![name("F1"), num(10.0)]),
            ContentOp::new("Td", vec![num(10.0), num(100.0)]),
            ContentOp::new("Tj", vec![string("big")]),
            ContentOp::new("ET", vec![]),
            ContentOp::new("Q", vec![]),
        ]);
        let r = &content.runs[0];
        assert_eq!(r.font_size, 20.0);
        assert!((r.bbox.x0 - 20.0).abs() < 0.01);
    }

    #[test]
    fn test_image_placement_from_ctm() {
        let content = run(vec![
            ContentOp::new("q", vec![]),
            ContentOp::new(
                "cm",
                vec![num(200.0), num(0.0), num(0.0), num(100.0), num(72.0), num(500.0)],
            ),
            ContentOp::new("Do", vec![name("Im1")]),
            ContentOp::new("Q", vec![]),
            ContentOp::new("Do", vec![name("Fm1")]),
        ]);

        assert_eq!(content.images.len(), 1);
        let img = &content.images[0];
        assert_eq!(img.name, "Im1");
        assert_eq!(img.bbox, BBox::new(72.0, 192.0, 272.0, 292.0));
    }
}
