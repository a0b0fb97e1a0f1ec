//! Image payloads for OCR engines.
//!
//! Engines read encoded image files. JPEG and JPEG 2000 streams already are
//! one; raw sample data is wrapped in a PNG using the XObject's dimensions,
//! colour components and bit depth.

use std::borrow::Cow;

use png::{BitDepth, ColorType, Encoder};

use super::backend::ImageXObject;
use super::ocr::OcrError;

/// Encode an image XObject into bytes an OCR engine can decode.
pub fn encode_for_ocr(image: &ImageXObject) -> Result<Vec<u8>, OcrError> {
    match image.filter.as_str() {
        "DCTDecode" | "JPXDecode" => return Ok(image.data.clone()),
        "CCITTFaxDecode" | "JBIG2Decode" => {
            return Err(OcrError::UnsupportedImage(format!("{} stream", image.filter)));
        }
        _ => {}
    }

    if image.width == 0 || image.height == 0 {
        return Err(OcrError::UnsupportedImage("missing dimensions".to_string()));
    }
    if image.components == 0 {
        let space = match image.color_space.as_str() {
            "" => "unknown",
            other => other,
        };
        return Err(OcrError::UnsupportedImage(format!("{} colour space", space)));
    }

    let bpc = image.bits_per_component;
    let depth = match bpc {
        1 => BitDepth::One,
        2 => BitDepth::Two,
        4 => BitDepth::Four,
        8 => BitDepth::Eight,
        16 => BitDepth::Sixteen,
        _ => {
            return Err(OcrError::UnsupportedImage(format!("{} bits per component", bpc)));
        }
    };

    // Rows are padded to whole bytes, in PDF and PNG alike.
    let row_bytes = (image.width as usize * image.components as usize * bpc as usize).div_ceil(8);
    let expected = row_bytes * image.height as usize;
    if image.data.len() < expected {
        return Err(OcrError::UnsupportedImage(format!(
            "{} bytes of samples, expected {}",
            image.data.len(),
            expected
        )));
    }
    let samples = &image.data[..expected];

    let (color, depth, pixels): (ColorType, BitDepth, Cow<'_, [u8]>) =
        match (image.components, bpc) {
            (1, _) => (ColorType::Grayscale, depth, Cow::Borrowed(samples)),
            (3, 8 | 16) => (ColorType::Rgb, depth, Cow::Borrowed(samples)),
            (4, 8) => (ColorType::Rgb, depth, Cow::Owned(cmyk_to_rgb(samples))),
            (n, bpc) => {
                return Err(OcrError::UnsupportedImage(format!(
                    "{} components at {} bits",
                    n, bpc
                )));
            }
        };

    let mut png_data = Vec::new();
    let mut encoder = Encoder::new(&mut png_data, image.width, image.height);
    encoder.set_color(color);
    encoder.set_depth(depth);
    let mut writer = encoder
        .write_header()
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    writer
        .write_image_data(&pixels)
        .map_err(|e| OcrError::Encode(e.to_string()))?;
    writer.finish().map_err(|e| OcrError::Encode(e.to_string()))?;

    Ok(png_data)
}

/// Naive CMYK → RGB, enough for text recognition.
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            [px[0], px[1], px[2]].map(|c| ((255 - c as u16) * k / 255) as u8)
        })
        .collect()
}
