//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for PDF operations, isolating
//! the concrete PDF library (lopdf) from content interpretation.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::error::{Error, Result};
use crate::model::{PageSize, SourceMetadata};

/// Page identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// Font information returned by the backend.
#[derive(Debug, Clone)]
pub struct BackendFontInfo {
    /// Font resource name (key in the page's font dictionary).
    pub name: Vec<u8>,
    /// Base font name (e.g., "Helvetica-Bold").
    pub base_font: String,
}

/// An image XObject resolved from a page's resources.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    /// Stream filter name ("DCTDecode", "FlateDecode", ...), empty when unfiltered
    pub filter: String,
    /// Colour space family ("DeviceRGB", "ICCBased", ...), empty for masks
    pub color_space: String,
    /// Colour components per sample; 0 when the colour space is not supported
    pub components: u8,
    /// Bits per colour component
    pub bits_per_component: u8,
    /// Encoded bytes for DCT/JPX streams, decompressed samples otherwise
    pub data: Vec<u8>,
}

/// Colour components of a device or calibrated colour space family.
pub fn color_space_components(family: &str) -> u8 {
    match family {
        "DeviceGray" | "CalGray" | "G" => 1,
        "DeviceRGB" | "CalRGB" | "RGB" => 3,
        "DeviceCMYK" | "CMYK" => 4,
        _ => 0,
    }
}

/// A value from a PDF content stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

impl PdfValue {
    /// Numeric value of an integer or real operand.
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PdfValue::Integer(i) => Some(*i as f32),
            PdfValue::Real(r) => Some(*r),
            _ => None,
        }
    }
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    /// Create an operation.
    pub fn new(operator: impl Into<String>, operands: Vec<PdfValue>) -> Self {
        Self {
            operator: operator.into(),
            operands,
        }
    }

    /// Numeric operand at `idx`.
    pub fn number(&self, idx: usize) -> Option<f32> {
        self.operands.get(idx).and_then(PdfValue::as_number)
    }
}

/// Abstract interface for PDF document access.
///
/// Implementations provide page enumeration, font info, content stream
/// decoding, text decoding and image lookup, without exposing any concrete
/// PDF library types.
pub trait PdfBackend {
    /// Return all pages as (page_number → PageId).
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Page dimensions; Letter when the page declares none.
    fn page_size(&self, page: PageId) -> PageSize;

    /// Return font info for a given page.
    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>>;

    /// Return the raw (decompressed) content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>>;

    /// Parse raw content stream bytes into a sequence of operations.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>>;

    /// Decoded operations of a page's content stream.
    fn page_operations(&self, page: PageId) -> Result<Vec<ContentOp>> {
        let content = self.page_content(page)?;
        self.decode_content(&content)
    }

    /// Decode a text byte sequence using the font's encoding on the given page.
    /// Falls back to simple decoding if the font or encoding is unavailable.
    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String;

    /// Resolve an image XObject by resource name. `None` for form XObjects
    /// and unknown names.
    fn image_xobject(&self, page: PageId, name: &[u8]) -> Option<ImageXObject>;

    /// Document metadata from the trailer.
    fn metadata(&self) -> SourceMetadata {
        SourceMetadata::default()
    }
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// LopdfBackend: concrete implementation backed by lopdf
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
}

impl LopdfBackend {
    /// Load from a file path.
    pub fn load_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let doc = LopdfDocument::load(path)?;
        Self::checked(doc)
    }

    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data)?;
        Self::checked(doc)
    }

    /// Load from a reader.
    pub fn load_reader<R: std::io::Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::load_bytes(&data)
    }

    fn checked(doc: LopdfDocument) -> Result<Self> {
        if doc.is_encrypted() {
            return Err(Error::Encrypted);
        }
        if doc.get_pages().is_empty() && doc.objects.is_empty() {
            return Err(Error::Corrupted("no objects".to_string()));
        }
        Ok(Self { doc })
    }

    /// Get PDF version string.
    pub fn version(&self) -> String {
        self.doc.version.to_string()
    }

    /// Look up a dictionary entry that may be an inline dictionary or a reference.
    fn resolve_dict<'a>(&'a self, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
        match dict.get(key).ok()? {
            Object::Reference(r) => self.doc.get_dictionary(*r).ok(),
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Page resources, walking up the page tree for inherited ones.
    fn page_resources(&self, page: PageId) -> Option<&Dictionary> {
        let mut dict = self.doc.get_dictionary(page).ok()?;
        // Bounded walk; malformed trees can loop.
        for _ in 0..32 {
            if let Some(res) = self.resolve_dict(dict, b"Resources") {
                return Some(res);
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// Family name and component count of an image colour space.
    ///
    /// ICC-based spaces report the profile's `/N`; indexed and other
    /// special spaces report 0 components.
    fn color_space(&self, value: &Object) -> (String, u8) {
        let value = match value {
            Object::Reference(r) => match self.doc.get_object(*r) {
                Ok(obj) => obj,
                Err(_) => return (String::new(), 0),
            },
            other => other,
        };

        match value {
            Object::Name(name) => {
                let family = String::from_utf8_lossy(name).to_string();
                let components = color_space_components(&family);
                (family, components)
            }
            Object::Array(arr) => {
                let family = arr
                    .first()
                    .and_then(|o| o.as_name_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let components = if family == "ICCBased" {
                    arr.get(1)
                        .and_then(|o| o.as_reference().ok())
                        .and_then(|r| self.doc.get_object(r).ok())
                        .and_then(|o| o.as_stream().ok())
                        .and_then(|stream| stream.dict.get(b"N").ok())
                        .and_then(|n| n.as_i64().ok())
                        .map(|n| n.clamp(0, 4) as u8)
                        .unwrap_or(0)
                } else {
                    color_space_components(&family)
                };
                (family, components)
            }
            _ => (String::new(), 0),
        }
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_size(&self, page: PageId) -> PageSize {
        let mut dict = match self.doc.get_dictionary(page) {
            Ok(d) => d,
            Err(_) => return PageSize::letter(),
        };
        for _ in 0..32 {
            if let Ok(media_box) = dict.get(b"MediaBox").and_then(Object::as_array) {
                let v: Vec<f32> = media_box.iter().filter_map(object_number).collect();
                if v.len() >= 4 {
                    return PageSize::new((v[2] - v[0]).abs(), (v[3] - v[1]).abs());
                }
            }
            match dict
                .get(b"Parent")
                .and_then(Object::as_reference)
                .and_then(|r| self.doc.get_dictionary(r))
            {
                Ok(parent) => dict = parent,
                Err(_) => break,
            }
        }
        PageSize::letter()
    }

    fn page_fonts(&self, page: PageId) -> Result<Vec<BackendFontInfo>> {
        let lopdf_fonts = self
            .doc
            .get_page_fonts(page)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let mut result = Vec::with_capacity(lopdf_fonts.len());
        for (name, font_dict) in &lopdf_fonts {
            let base_font = font_dict
                .get(b"BaseFont")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            result.push(BackendFontInfo {
                name: name.clone(),
                base_font,
            });
        }
        Ok(result)
    }

    fn page_content(&self, page_id: PageId) -> Result<Vec<u8>> {
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        let contents = match page_dict.get(b"Contents") {
            Ok(c) => c,
            // A page without a content stream is blank, not broken.
            Err(_) => return Ok(Vec::new()),
        };

        match contents {
            Object::Reference(r) => match self.doc.get_object(*r) {
                Ok(Object::Stream(s)) => s
                    .decompressed_content()
                    .or_else(|_| Ok(s.content.clone())),
                Ok(Object::Array(arr)) => Ok(self.concat_streams(arr)),
                _ => Err(Error::PdfParse("Invalid content stream".to_string())),
            },
            Object::Array(arr) => Ok(self.concat_streams(arr)),
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content =
            lopdf::content::Content::decode(data).map_err(|e| Error::PdfParse(e.to_string()))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_name: &[u8], bytes: &[u8]) -> String {
        if let Ok(lopdf_fonts) = self.doc.get_page_fonts(page) {
            if let Some(font_dict) = lopdf_fonts.get(font_name) {
                if let Ok(enc) = font_dict.get_font_encoding(&self.doc) {
                    if let Ok(text) = LopdfDocument::decode_text(&enc, bytes) {
                        return text;
                    }
                }
            }
        }
        decode_text_simple(bytes)
    }

    fn image_xobject(&self, page: PageId, name: &[u8]) -> Option<ImageXObject> {
        let resources = self.page_resources(page)?;
        let xobjects = self.resolve_dict(resources, b"XObject")?;
        let obj_ref = xobjects.get(name).ok()?.as_reference().ok()?;
        let stream = match self.doc.get_object(obj_ref).ok()? {
            Object::Stream(s) => s,
            _ => return None,
        };
        let dict = &stream.dict;

        if dict.get(b"Subtype").and_then(Object::as_name_str).ok()? != "Image" {
            return None;
        }

        let dimension = |key: &[u8]| {
            dict.get(key)
                .ok()
                .and_then(|v| v.as_i64().ok())
                .map(|v| v.max(0) as u32)
                .unwrap_or(0)
        };

        let filter = match dict.get(b"Filter") {
            Ok(Object::Name(n)) => String::from_utf8_lossy(n).to_string(),
            Ok(Object::Array(arr)) => arr
                .last()
                .and_then(|o| o.as_name_str().ok())
                .unwrap_or_default()
                .to_string(),
            _ => String::new(),
        };

        let data = match filter.as_str() {
            "DCTDecode" | "JPXDecode" | "CCITTFaxDecode" | "JBIG2Decode" => stream.content.clone(),
            _ => stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        };

        let image_mask = dict
            .get(b"ImageMask")
            .and_then(Object::as_bool)
            .unwrap_or(false);
        let (color_space, components, bits_per_component) = if image_mask {
            (String::new(), 1, 1)
        } else {
            let (family, components) = dict
                .get(b"ColorSpace")
                .map(|cs| self.color_space(cs))
                .unwrap_or_default();
            let bits = dict
                .get(b"BitsPerComponent")
                .and_then(Object::as_i64)
                .map(|b| b.clamp(0, 16) as u8)
                .unwrap_or(8);
            (family, components, bits)
        };

        Some(ImageXObject {
            width: dimension(b"Width"),
            height: dimension(b"Height"),
            filter,
            color_space,
            components,
            bits_per_component,
            data,
        })
    }

    fn metadata(&self) -> SourceMetadata {
        let mut metadata = SourceMetadata {
            pdf_version: Some(self.version()),
            ..Default::default()
        };

        let info = self
            .doc
            .trailer
            .get(b"Info")
            .and_then(Object::as_reference)
            .and_then(|r| self.doc.get_dictionary(r));

        if let Ok(info_dict) = info {
            metadata.title = get_string_from_dict(info_dict, b"Title");
            metadata.author = get_string_from_dict(info_dict, b"Author");
            metadata.created = get_string_from_dict(info_dict, b"CreationDate")
                .as_deref()
                .and_then(parse_pdf_date);
        }

        metadata
    }
}

impl LopdfBackend {
    fn concat_streams(&self, arr: &[Object]) -> Vec<u8> {
        let mut content = Vec::new();
        for obj in arr {
            if let Object::Reference(r) = obj {
                if let Ok(Object::Stream(s)) = self.doc.get_object(*r) {
                    if let Ok(data) = s.decompressed_content() {
                        content.extend_from_slice(&data);
                        content.push(b' ');
                    }
                }
            }
        }
        content
    }
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

fn object_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Helper to get a string from a PDF dictionary.
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let text = match dict.get(key).ok()? {
        Object::String(bytes, _) => decode_text_simple(bytes),
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok()?,
        _ => return None,
    };
    let text = text.trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// Parse a PDF date string (D:YYYYMMDDHHmmSSOHH'mm').
pub(crate) fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.strip_prefix("D:").unwrap_or(s);

    if s.len() < 4 {
        return None;
    }

    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6).and_then(|m| m.parse().ok()).unwrap_or(1);
    let day: u32 = s.get(6..8).and_then(|d| d.parse().ok()).unwrap_or(1);
    let hour: u32 = s.get(8..10).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minute: u32 = s.get(10..12).and_then(|m| m.parse().ok()).unwrap_or(0);
    let second: u32 = s.get(12..14).and_then(|s| s.parse().ok()).unwrap_or(0);

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}
