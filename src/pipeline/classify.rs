//! Semantic classification of page primitives.
//!
//! Classification is a pure function of font metrics, position relative to
//! table and image regions on the same page, and primitive kind.

use std::collections::BTreeMap;

use super::TransformOptions;
use crate::model::{BBox, EntityType, Primitive, RawDocument, RawPage, TextRun};

/// Font statistics for heading detection.
#[derive(Debug, Clone, Default)]
pub struct FontStatistics {
    /// Body text font size (character-weighted median)
    pub body_size: f32,
    /// Distinct heading font sizes, largest first
    pub heading_sizes: Vec<f32>,
    /// Characters set at each font size (tenths of a point)
    pub size_histogram: BTreeMap<i32, usize>,
}

impl FontStatistics {
    /// Collect statistics over every text run of a document.
    pub fn from_document(doc: &RawDocument, options: &TransformOptions) -> Self {
        let mut stats = Self::default();
        for run in doc.pages.iter().flat_map(|p| p.text_runs()) {
            stats.add_run(run);
        }
        stats.analyze(options.heading_size_ratio);
        stats
    }

    /// Add a text run observation, weighted by its character count.
    pub fn add_run(&mut self, run: &TextRun) {
        self.add_size(run.font_size, run.char_count());
    }

    /// Add `chars` characters set at `size`.
    pub fn add_size(&mut self, size: f32, chars: usize) {
        if chars == 0 || !size.is_finite() || size <= 0.0 {
            return;
        }
        let key = (size * 10.0).round() as i32;
        *self.size_histogram.entry(key).or_insert(0) += chars;
    }

    /// Calculate body size and heading sizes.
    pub fn analyze(&mut self, heading_ratio: f32) {
        let total: usize = self.size_histogram.values().sum();
        if total == 0 {
            self.body_size = 12.0;
            self.heading_sizes.clear();
            return;
        }

        let half = total.div_ceil(2);
        let mut seen = 0;
        for (&key, &count) in &self.size_histogram {
            seen += count;
            if seen >= half {
                self.body_size = key as f32 / 10.0;
                break;
            }
        }

        let threshold = self.body_size * heading_ratio;
        self.heading_sizes = self
            .size_histogram
            .keys()
            .rev()
            .map(|&k| k as f32 / 10.0)
            .filter(|&size| size >= threshold)
            .collect();

        log::debug!(
            "Font statistics: body={:.1}pt, heading sizes={:?}",
            self.body_size,
            self.heading_sizes
        );
    }

    /// Ratio of a font size to the body size.
    pub fn ratio(&self, font_size: f32) -> f32 {
        if self.body_size > 0.0 {
            font_size / self.body_size
        } else {
            1.0
        }
    }

    /// Heading level (1-6) for a font size.
    ///
    /// Sizes below every known heading size (bold headings set near body
    /// size) take the level after the smallest heading size.
    pub fn heading_level(&self, font_size: f32) -> u8 {
        for (i, &size) in self.heading_sizes.iter().enumerate() {
            if font_size >= size - 0.5 {
                return (i + 1).min(6) as u8;
            }
        }
        (self.heading_sizes.len() + 1).min(6) as u8
    }
}

/// A primitive annotated with its semantic kind.
#[derive(Debug, Clone)]
pub struct ClassifiedPrimitive<'a> {
    /// The primitive itself
    pub primitive: &'a Primitive,
    /// Assigned kind
    pub entity_type: EntityType,
    /// Classification confidence (0.0 - 1.0)
    pub confidence: f32,
    /// Heading level for headings
    pub heading_level: Option<u8>,
    /// Position in the page's extraction order
    pub seq: usize,
}

impl<'a> ClassifiedPrimitive<'a> {
    fn new(primitive: &'a Primitive, seq: usize, entity_type: EntityType, confidence: f32) -> Self {
        Self {
            primitive,
            entity_type,
            confidence,
            heading_level: None,
            seq,
        }
    }

    /// Bounding box of the primitive.
    pub fn bbox(&self) -> BBox {
        self.primitive.bbox()
    }

    /// Page of the primitive.
    pub fn page(&self) -> u32 {
        self.primitive.page()
    }
}

/// Classify every primitive of a page, in extraction order.
pub fn classify_page<'a>(
    page: &'a RawPage,
    stats: &FontStatistics,
    options: &TransformOptions,
) -> Vec<ClassifiedPrimitive<'a>> {
    let regions = caption_anchors(page);

    let mut classified: Vec<_> = page
        .primitives
        .iter()
        .enumerate()
        .map(|(seq, primitive)| match primitive {
            Primitive::TableCell(_) => {
                ClassifiedPrimitive::new(primitive, seq, EntityType::Table, 1.0)
            }
            Primitive::ImageRegion(_) => {
                ClassifiedPrimitive::new(primitive, seq, EntityType::Image, 1.0)
            }
            Primitive::TextRun(run) => classify_run(primitive, run, seq, &regions, stats, options),
        })
        .collect();

    extend_captions(&mut classified, options);
    classified
}

/// Turn paragraph lines that wrap a caption into caption lines.
///
/// Runs are visited top to bottom so a caption grows one line at a time.
fn extend_captions(classified: &mut [ClassifiedPrimitive<'_>], options: &TransformOptions) {
    let mut by_top: Vec<usize> = (0..classified.len())
        .filter(|&i| matches!(classified[i].primitive, Primitive::TextRun(_)))
        .collect();
    by_top.sort_by(|&a, &b| classified[a].bbox().y0.total_cmp(&classified[b].bbox().y0));

    for (pos, &i) in by_top.iter().enumerate() {
        if classified[i].entity_type != EntityType::Paragraph {
            continue;
        }
        let Primitive::TextRun(run) = classified[i].primitive else {
            continue;
        };
        if run.char_count() > options.caption_max_chars {
            continue;
        }
        let wraps = by_top[..pos].iter().any(|&j| {
            let above = &classified[j];
            match above.primitive {
                Primitive::TextRun(prev) if above.entity_type == EntityType::Caption => {
                    wraps_caption(prev, run, options)
                }
                _ => false,
            }
        });
        if wraps {
            classified[i].entity_type = EntityType::Caption;
            classified[i].confidence = 0.7;
        }
    }
}

/// Whether `next` reads as the following line of the caption `prev`.
fn wraps_caption(prev: &TextRun, next: &TextRun, options: &TransformOptions) -> bool {
    if prev.page != next.page || (prev.font_size - next.font_size).abs() > options.font_size_tolerance {
        return false;
    }
    let gap = next.bbox.y0 - prev.bbox.y1;
    gap >= -0.5 * prev.font_size
        && gap <= options.merge_gap_ratio * prev.font_size
        && prev.bbox.horizontal_overlap(&next.bbox) > 0.0
}

fn classify_run<'a>(
    primitive: &'a Primitive,
    run: &TextRun,
    seq: usize,
    regions: &[BBox],
    stats: &FontStatistics,
    options: &TransformOptions,
) -> ClassifiedPrimitive<'a> {
    let chars = run.char_count();
    let short = chars > 0
        && chars <= options.max_heading_chars
        && run.line_count() <= options.max_heading_lines;
    let ratio = stats.ratio(run.font_size);

    if short && ratio >= options.heading_size_ratio {
        let mut classified = ClassifiedPrimitive::new(primitive, seq, EntityType::Heading, 0.9);
        classified.heading_level = Some(stats.heading_level(run.font_size));
        return classified;
    }

    if chars > 0 && chars <= options.caption_max_chars && follows_region(run, regions, options) {
        return ClassifiedPrimitive::new(primitive, seq, EntityType::Caption, 0.8);
    }

    if short && run.is_bold() && ratio >= options.bold_heading_ratio {
        let mut classified = ClassifiedPrimitive::new(primitive, seq, EntityType::Heading, 0.7);
        classified.heading_level = Some(stats.heading_level(run.font_size));
        return classified;
    }

    ClassifiedPrimitive::new(primitive, seq, EntityType::Paragraph, 0.9)
}

/// Regions a caption may follow: every image, and every table's grid.
fn caption_anchors(page: &RawPage) -> Vec<BBox> {
    let mut tables: BTreeMap<u32, BBox> = BTreeMap::new();
    for cell in page.table_cells() {
        tables
            .entry(cell.table)
            .and_modify(|b| *b = b.union(&cell.bbox))
            .or_insert(cell.bbox);
    }

    page.images()
        .map(|image| image.bbox)
        .chain(tables.into_values())
        .collect()
}

/// Whether the run sits just below a region, overlapping it horizontally.
fn follows_region(run: &TextRun, regions: &[BBox], options: &TransformOptions) -> bool {
    let max_gap = options.caption_max_gap * run.font_size;
    let min_gap = -0.25 * run.font_size;
    regions.iter().any(|region| {
        let gap = run.bbox.y0 - region.y1;
        gap >= min_gap && gap <= max_gap && run.bbox.horizontal_overlap(region) > 0.0
    })
}
