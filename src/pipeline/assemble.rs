//! Block assembly.
//!
//! Turns ordered, classified primitives into the final block sequence:
//! adjacent text runs of one kind merge into a single block, a table's
//! cells become one gap-free grid, images stay one block each. Block ids
//! are assigned in the merged reading order starting at 0.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use super::classify::ClassifiedPrimitive;
use super::text;
use super::TransformOptions;
use crate::model::{
    BBox, Block, EntityType, GridCell, ImagePayload, KeyValue, PageBox, PageSize, Payload,
    Primitive, TableCell, TableGrid, TextPayload, TextRun,
};

/// Summary cells longer than this are prose, not labels.
const MAX_SUMMARY_CELL_CHARS: usize = 60;

/// Text above a table shorter than this names it; longer text describes it.
const TABLE_TITLE_MAX_CHARS: usize = 80;

/// Largest gap between a table and the text above it, in font sizes.
const LEAD_GAP_RATIO: f32 = 2.0;

/// Largest gap in points between a table's bottom and a totals line.
const TRAILING_TOTALS_GAP: f32 = 30.0;

/// The ordered primitives of one page.
#[derive(Debug)]
pub struct OrderedPage<'a> {
    /// 1-indexed page number
    pub number: u32,
    /// Page dimensions
    pub size: PageSize,
    /// Classified primitives in reading order
    pub items: Vec<ClassifiedPrimitive<'a>>,
}

/// A block under construction.
#[derive(Debug)]
struct Draft<'a> {
    entity_type: EntityType,
    confidence: f32,
    level: Option<u8>,
    boxes: Vec<PageBox>,
    body: Body<'a>,
}

#[derive(Debug)]
enum Body<'a> {
    Text {
        text: String,
        font_size: f32,
        bold: bool,
        last: BBox,
    },
    Table {
        segments: Vec<Vec<&'a TableCell>>,
        lead: Option<String>,
        totals: Option<TotalsLine>,
    },
    Image {
        ocr_text: String,
        image_ref: String,
    },
}

/// A totals line printed under a table instead of inside it.
#[derive(Debug)]
struct TotalsLine {
    label: String,
    values: Vec<String>,
    last: BBox,
}

impl Draft<'_> {
    fn extend_box(&mut self, page: u32, bbox: BBox) {
        let same_page = self.boxes.last().is_some_and(|b| b.page == page);
        if !same_page {
            self.boxes.push(PageBox { page, bbox });
        } else if let Some(last) = self.boxes.last_mut() {
            last.bbox = last.bbox.union(&bbox);
        }
    }

    fn last_box(&self) -> Option<&PageBox> {
        self.boxes.last()
    }
}

/// Merges ordered primitives into blocks.
pub struct Assembler<'o, 'a> {
    options: &'o TransformOptions,
    heights: HashMap<u32, f32>,
    summary: Option<Regex>,
    drafts: Vec<Draft<'a>>,
}

impl<'o, 'a> Assembler<'o, 'a> {
    /// Create an assembler.
    pub fn new(options: &'o TransformOptions) -> Self {
        Self {
            options,
            heights: HashMap::new(),
            summary: summary_regex(&options.summary_keywords),
            drafts: Vec::new(),
        }
    }

    /// Feed the next page, in page order.
    pub fn push_page(&mut self, page: OrderedPage<'a>) {
        self.heights.insert(page.number, page.size.height);
        let items = page.items;

        let mut i = 0;
        while i < items.len() {
            let first_on_page = i == 0;
            match items[i].primitive {
                Primitive::TableCell(cell) => {
                    let mut end = i + 1;
                    while end < items.len() {
                        match items[end].primitive {
                            Primitive::TableCell(next) if next.table == cell.table => end += 1,
                            _ => break,
                        }
                    }
                    self.push_table(&items[i..end], page.number, first_on_page);
                    i = end;
                }
                Primitive::ImageRegion(image) => {
                    self.drafts.push(Draft {
                        entity_type: EntityType::Image,
                        confidence: items[i].confidence,
                        level: None,
                        boxes: vec![PageBox {
                            page: page.number,
                            bbox: image.bbox,
                        }],
                        body: Body::Image {
                            ocr_text: image.ocr_text.trim().to_string(),
                            image_ref: image.image_ref.clone(),
                        },
                    });
                    i += 1;
                }
                Primitive::TextRun(run) => {
                    self.push_text(&items[i], run, page.number, first_on_page);
                    i += 1;
                }
            }
        }
    }

    fn push_table(&mut self, items: &[ClassifiedPrimitive<'a>], page: u32, first_on_page: bool) {
        let mut segment: Vec<&'a TableCell> = items
            .iter()
            .filter_map(|item| match item.primitive {
                Primitive::TableCell(cell) => Some(cell),
                _ => None,
            })
            .collect();
        let Some(bbox) = segment.iter().map(|c| c.bbox).reduce(|a, b| a.union(&b)) else {
            return;
        };
        let confidence = items.iter().map(|i| i.confidence).fold(1.0, f32::min);

        if first_on_page && self.options.merge_across_pages && self.starts_near_top(page, &bbox) {
            let continues = self.drafts.last().is_some_and(|draft| {
                draft.entity_type == EntityType::Table && self.ends_near_bottom(draft, page)
            });
            if let Some(draft) = self.drafts.last_mut().filter(|_| continues) {
                if let Body::Table { segments, .. } = &mut draft.body {
                    let header = segments.first().map(|s| first_row_texts(s));
                    if segments
                        .first()
                        .is_some_and(|first| column_count(first) == column_count(&segment))
                    {
                        if header.is_some_and(|h| h == first_row_texts(&segment)) {
                            let top = segment.iter().map(|c| c.row).min();
                            segment.retain(|c| Some(c.row) != top);
                        }
                        log::debug!("Table continues from page {} to page {}", page - 1, page);
                        segments.push(segment);
                        draft.confidence = draft.confidence.min(confidence);
                        draft.extend_box(page, bbox);
                        return;
                    }
                }
            }
        }

        let lead = self
            .drafts
            .last()
            .and_then(|draft| lead_text(draft, page, &bbox));
        self.drafts.push(Draft {
            entity_type: EntityType::Table,
            confidence,
            level: None,
            boxes: vec![PageBox { page, bbox }],
            body: Body::Table {
                segments: vec![segment],
                lead,
                totals: None,
            },
        });
    }

    /// Take a totals line printed under the last table into that table.
    ///
    /// The table must have no summary row of its own. Values on the same
    /// line that arrive as separate runs extend the line already taken.
    fn absorb_totals(&mut self, run: &TextRun, page: u32) -> bool {
        let options = self.options;
        let Some(summary) = self.summary.as_ref() else {
            return false;
        };
        let Some(draft) = self.drafts.last_mut() else {
            return false;
        };
        if draft.entity_type != EntityType::Table {
            return false;
        }
        let Some(table_box) = draft.last_box().filter(|b| b.page == page).map(|b| b.bbox) else {
            return false;
        };
        let Body::Table {
            segments, totals, ..
        } = &mut draft.body
        else {
            return false;
        };
        let cols = segments.iter().map(|s| column_count(s)).max().unwrap_or(0);

        match totals {
            Some(line) => {
                let shorter = line.last.height().min(run.bbox.height());
                let on_line = shorter > 0.0
                    && line.last.vertical_overlap(&run.bbox) >= options.line_overlap_ratio * shorter
                    && run.bbox.x0 >= line.last.x1 - run.font_size;
                let Some(values) = parse_values(&run.text).filter(|_| on_line) else {
                    return false;
                };
                if line.values.len() + values.len() >= cols {
                    return false;
                }
                line.values.extend(values);
                line.last = run.bbox;
            }
            None => {
                let gap = run.bbox.y0 - table_box.y1;
                if gap < -0.5 * run.font_size
                    || gap > TRAILING_TOTALS_GAP
                    || run.bbox.horizontal_overlap(&table_box) <= 0.0
                    || has_summary_cell(segments, summary)
                {
                    return false;
                }
                let Some(line) = parse_totals(&run.text, summary, run.bbox) else {
                    return false;
                };
                if line.values.len() >= cols {
                    return false;
                }
                log::debug!("Totals line under table on page {}: {}", page, line.label);
                *totals = Some(line);
            }
        }
        draft.extend_box(page, run.bbox);
        true
    }

    fn push_text(
        &mut self,
        item: &ClassifiedPrimitive<'a>,
        run: &TextRun,
        page: u32,
        first_on_page: bool,
    ) {
        if item.entity_type == EntityType::Paragraph && self.absorb_totals(run, page) {
            return;
        }

        let options = self.options;
        let continues_page = first_on_page
            && options.merge_across_pages
            && item.entity_type == EntityType::Paragraph
            && self.starts_near_top(page, &run.bbox)
            && self.drafts.last().is_some_and(|draft| {
                draft.entity_type == EntityType::Paragraph && self.ends_near_bottom(draft, page)
            });

        if let Some(draft) = self.drafts.last_mut() {
            if let Body::Text {
                text,
                font_size,
                bold,
                last,
            } = &mut draft.body
            {
                let compatible = draft.entity_type == item.entity_type
                    && (run.font_size - *font_size).abs() <= options.font_size_tolerance
                    && (item.entity_type != EntityType::Heading
                        || (*bold == run.is_bold() && draft.level == item.heading_level));

                let on_same_page = draft.boxes.last().is_some_and(|b| b.page == page);
                let joined = if !compatible {
                    false
                } else if continues_page {
                    if text::ends_sentence(text) {
                        false
                    } else {
                        log::debug!("Paragraph continues from page {} to page {}", page - 1, page);
                        text::join_lines(text, &run.text);
                        true
                    }
                } else if on_same_page && same_line(last, &run.bbox, run.font_size, options) {
                    if run.bbox.x0 - last.x1 > 0.15 * run.font_size {
                        text::join_inline(text, &run.text);
                    } else {
                        text.push_str(&run.text);
                    }
                    true
                } else if on_same_page {
                    let column = draft.boxes.last().map(|b| b.bbox).unwrap_or(*last);
                    if next_line(last, &column, &run.bbox, run.font_size, options) {
                        text::join_lines(text, &run.text);
                        true
                    } else {
                        false
                    }
                } else {
                    false
                };

                if joined {
                    *last = run.bbox;
                    draft.confidence = draft.confidence.min(item.confidence);
                    draft.extend_box(page, run.bbox);
                    return;
                }
            }
        }

        self.drafts.push(Draft {
            entity_type: item.entity_type,
            confidence: item.confidence,
            level: item.heading_level.filter(|_| item.entity_type == EntityType::Heading),
            boxes: vec![PageBox {
                page,
                bbox: run.bbox,
            }],
            body: Body::Text {
                text: run.text.clone(),
                font_size: run.font_size,
                bold: run.is_bold(),
                last: run.bbox,
            },
        });
    }

    fn starts_near_top(&self, page: u32, bbox: &BBox) -> bool {
        self.heights
            .get(&page)
            .is_some_and(|&h| bbox.y0 <= h * self.options.page_edge_margin)
    }

    fn ends_near_bottom(&self, draft: &Draft<'_>, page: u32) -> bool {
        draft.last_box().is_some_and(|b| {
            b.page + 1 == page
                && self
                    .heights
                    .get(&b.page)
                    .is_some_and(|&h| b.bbox.y1 >= h * (1.0 - self.options.page_edge_margin))
        })
    }

    /// Finish assembly: assign ids, titles and parents.
    pub fn finish(self) -> Vec<Block> {
        let options = self.options;
        let summary = self.summary.as_ref();
        let mut headings: Vec<(u8, u32)> = Vec::new();
        let mut blocks = Vec::with_capacity(self.drafts.len());

        for (block_id, draft) in (0u32..).zip(self.drafts) {
            let (title, payload) = match draft.body {
                Body::Text { text, .. } => {
                    let text = text::normalize(&text);
                    let title = text_title(draft.entity_type, &text, options);
                    let level = draft.level.filter(|_| draft.entity_type == EntityType::Heading);
                    (title, Payload::Text(TextPayload { text, level }))
                }
                Body::Table {
                    segments,
                    lead,
                    totals,
                } => {
                    let mut grid = build_grid(&segments, totals.as_ref(), summary);
                    let lead = lead.map(|t| text::normalize(&t)).filter(|t| !t.is_empty());
                    let name = match lead {
                        Some(lead)
                            if !lead.contains('\n')
                                && lead.chars().count() < TABLE_TITLE_MAX_CHARS =>
                        {
                            Some(lead)
                        }
                        other => {
                            grid.description = other;
                            None
                        }
                    };
                    let header: Vec<&str> = grid
                        .cells
                        .iter()
                        .filter(|c| c.row == 0 && !c.text.is_empty())
                        .map(|c| c.text.as_str())
                        .collect();
                    let title = match name {
                        Some(name) => text::truncate(&name, options.max_title_chars),
                        None if header.is_empty() => "Table".to_string(),
                        None => text::snippet(&header.join(" | "), options.snippet_chars),
                    };
                    (title, Payload::Table(grid))
                }
                Body::Image {
                    ocr_text,
                    image_ref,
                } => {
                    let title = if ocr_text.is_empty() {
                        "Image".to_string()
                    } else {
                        text::snippet(&ocr_text, options.snippet_chars)
                    };
                    (title, Payload::Image(ImagePayload { ocr_text, image_ref }))
                }
            };

            let parent = match draft.entity_type {
                EntityType::Heading => {
                    let level = draft.level.unwrap_or(6);
                    while headings.last().is_some_and(|&(l, _)| l >= level) {
                        headings.pop();
                    }
                    let parent = headings.last().map(|&(_, id)| id);
                    headings.push((level, block_id));
                    parent
                }
                _ => headings.last().map(|&(_, id)| id),
            };

            let first = draft.boxes.first().map(|b| b.page).unwrap_or(1);
            let last = draft.boxes.last().map(|b| b.page).unwrap_or(first);
            blocks.push(Block {
                block_id,
                entity_type: draft.entity_type,
                title,
                page_range: (first, last),
                bounding_boxes: draft.boxes,
                confidence: draft.confidence,
                parent,
                payload,
            });
        }

        blocks
    }
}

fn summary_regex(keywords: &[String]) -> Option<Regex> {
    let mut words: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if words.is_empty() {
        return None;
    }
    // Longest first so "grand total" wins over "total".
    words.sort_by_key(|w| std::cmp::Reverse(w.len()));
    let alternation = words
        .iter()
        .map(|w| regex::escape(&w.to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!(r"\b(?:{})\b", alternation)) {
        Ok(re) => Some(re),
        Err(e) => {
            log::warn!("Invalid summary keywords: {}", e);
            None
        }
    }
}

/// Paragraph or caption text sitting just above a new table.
fn lead_text(draft: &Draft<'_>, page: u32, table: &BBox) -> Option<String> {
    if !matches!(
        draft.entity_type,
        EntityType::Paragraph | EntityType::Caption
    ) {
        return None;
    }
    let Body::Text {
        text,
        font_size,
        last,
        ..
    } = &draft.body
    else {
        return None;
    };
    let above = draft.last_box().filter(|b| b.page == page)?;
    let gap = table.y0 - last.y1;
    (gap >= -0.5 * font_size
        && gap <= LEAD_GAP_RATIO * font_size
        && above.bbox.horizontal_overlap(table) > 0.0)
        .then(|| text.clone())
}

fn is_summary_label(text: &str, summary: &Regex) -> bool {
    let label = text.trim().to_lowercase();
    !label.is_empty() && label.chars().count() <= MAX_SUMMARY_CELL_CHARS && summary.is_match(&label)
}

/// Whether any cell below the first row of a table reads as a totals label.
fn has_summary_cell(segments: &[Vec<&TableCell>], summary: &Regex) -> bool {
    segments.iter().enumerate().any(|(i, segment)| {
        let header = if i == 0 {
            segment.iter().map(|c| c.row).min()
        } else {
            None
        };
        segment
            .iter()
            .filter(|c| Some(c.row) != header)
            .any(|c| is_summary_label(&c.text, summary))
    })
}

/// Split a line like "Grand total $ 1,200 340" into its label and values.
fn parse_totals(line: &str, summary: &Regex, bbox: BBox) -> Option<TotalsLine> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let split = tokens.iter().position(|t| {
        t.chars().any(|c| c.is_ascii_digit()) || t.chars().all(|c| !c.is_alphanumeric())
    })?;
    let label = tokens[..split].join(" ");
    if !is_summary_label(&label, summary) {
        return None;
    }
    let values = parse_values(&tokens[split..].join(" "))?;
    Some(TotalsLine {
        label,
        values,
        last: bbox,
    })
}

/// Numeric values of a totals line. Currency signs and other bare symbols
/// attach to the number after them, or to the last one at the end.
fn parse_values(text: &str) -> Option<Vec<String>> {
    let mut values: Vec<String> = Vec::new();
    let mut pending = String::new();
    for token in text.split_whitespace() {
        if token.chars().any(|c| c.is_ascii_digit()) {
            values.push(format!("{}{}", pending, token));
            pending.clear();
        } else if token.chars().all(|c| !c.is_alphanumeric()) {
            pending.push_str(token);
        } else {
            return None;
        }
    }
    if !pending.is_empty() {
        values.last_mut()?.push_str(&pending);
    }
    (!values.is_empty()).then_some(values)
}

/// A grid whose key columns (every other column from the first) mostly
/// hold `Label:` cells.
fn is_key_value(rows: &[Vec<String>]) -> bool {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.len() < 2 || cols < 2 {
        return false;
    }
    (0..cols).step_by(2).all(|key| {
        let labelled = rows.iter().filter(|r| r[key].trim_end().ends_with(':')).count();
        labelled as f32 >= rows.len() as f32 * 0.5
    })
}

fn key_values(rows: &[Vec<String>]) -> Vec<KeyValue> {
    let cols = rows.first().map_or(0, Vec::len);
    let mut pairs = Vec::new();
    for row in rows {
        for key in (0..cols.saturating_sub(1)).step_by(2) {
            let label = row[key].trim_end().trim_end_matches(':').trim();
            if !label.is_empty() {
                pairs.push(KeyValue {
                    key: label.to_string(),
                    value: row[key + 1].clone(),
                });
            }
        }
    }
    pairs
}

fn text_title(entity_type: EntityType, text: &str, options: &TransformOptions) -> String {
    if text.is_empty() {
        return match entity_type {
            EntityType::Heading => "Heading",
            EntityType::Caption => "Caption",
            _ => "Paragraph",
        }
        .to_string();
    }
    match entity_type {
        EntityType::Heading | EntityType::Caption => text::truncate(text, options.max_title_chars),
        _ => text::snippet(text, options.snippet_chars),
    }
}

fn same_line(last: &BBox, bbox: &BBox, font_size: f32, options: &TransformOptions) -> bool {
    let shorter = last.height().min(bbox.height());
    let overlaps =
        shorter > 0.0 && last.vertical_overlap(bbox) >= options.line_overlap_ratio * shorter;
    let dx = bbox.x0 - last.x1;
    overlaps && dx <= options.min_gutter_width && dx >= -font_size
}

fn next_line(
    last: &BBox,
    column: &BBox,
    bbox: &BBox,
    font_size: f32,
    options: &TransformOptions,
) -> bool {
    let gap = bbox.y0 - last.y1;
    gap >= -0.5 * font_size
        && gap <= options.merge_gap_ratio * font_size
        && bbox.horizontal_overlap(column) > 0.0
}

fn distinct(values: impl Iterator<Item = u32>) -> Vec<u32> {
    values.collect::<BTreeSet<_>>().into_iter().collect()
}

fn column_count(cells: &[&TableCell]) -> usize {
    cells.iter().map(|c| c.col).collect::<BTreeSet<_>>().len()
}

fn first_row_texts(cells: &[&TableCell]) -> Vec<String> {
    let Some(top) = cells.iter().map(|c| c.row).min() else {
        return Vec::new();
    };
    let mut row: Vec<&&TableCell> = cells.iter().filter(|c| c.row == top).collect();
    row.sort_by_key(|c| c.col);
    row.iter().map(|c| c.text.trim().to_string()).collect()
}

/// A cell positioned in the assembled grid before conflict resolution.
struct Placed {
    row: u32,
    col: u32,
    rowspan: u32,
    colspan: u32,
    text: String,
}

/// Build a gap-free grid from one or more table segments.
///
/// Rows and columns are renumbered densely per segment, segments stack
/// vertically, spans are clipped to the grid, a cell landing on an occupied
/// position merges its text into the occupant, and uncovered positions get
/// empty cells. A totals line becomes the last row with its values in the
/// rightmost columns.
fn build_grid(
    segments: &[Vec<&TableCell>],
    totals: Option<&TotalsLine>,
    summary: Option<&Regex>,
) -> TableGrid {
    let mut placed: Vec<Placed> = Vec::new();
    let mut row_offset = 0u32;
    let mut cols = 0u32;

    for segment in segments {
        let rows: Vec<u32> = distinct(segment.iter().map(|c| c.row));
        let columns: Vec<u32> = distinct(segment.iter().map(|c| c.col));
        let (seg_rows, seg_cols) = (rows.len() as u32, columns.len() as u32);

        for cell in segment {
            let (Ok(r), Ok(c)) = (rows.binary_search(&cell.row), columns.binary_search(&cell.col))
            else {
                continue;
            };
            let (r, c) = (r as u32, c as u32);
            placed.push(Placed {
                row: row_offset + r,
                col: c,
                rowspan: cell.rowspan.clamp(1, seg_rows - r),
                colspan: cell.colspan.clamp(1, seg_cols - c),
                text: text::clean_cell(&cell.text),
            });
        }
        row_offset += seg_rows;
        cols = cols.max(seg_cols);
    }

    if let Some(line) = totals.filter(|t| (t.values.len() as u32) < cols) {
        let cell = |col: u32, value: &str| Placed {
            row: row_offset,
            col,
            rowspan: 1,
            colspan: 1,
            text: text::clean_cell(value),
        };
        placed.push(cell(0, &line.label));
        let first = cols - line.values.len() as u32;
        for (col, value) in (first..).zip(&line.values) {
            placed.push(cell(col, value));
        }
        row_offset += 1;
    }

    let rows = row_offset;
    placed.sort_by_key(|p| (p.row, p.col));

    let width = cols as usize;
    let mut owner: Vec<Option<usize>> = vec![None; rows as usize * width];
    let mut cells: Vec<GridCell> = Vec::with_capacity(owner.len());

    for p in placed {
        let anchor = p.row as usize * width + p.col as usize;
        if let Some(existing) = owner[anchor] {
            if !p.text.is_empty() {
                text::join_inline(&mut cells[existing].text, &p.text);
            }
            continue;
        }

        let mut colspan = 1;
        while colspan < p.colspan && owner[anchor + colspan as usize].is_none() {
            colspan += 1;
        }
        let mut rowspan = 1;
        while rowspan < p.rowspan
            && (p.col..p.col + colspan)
                .all(|c| owner[(p.row + rowspan) as usize * width + c as usize].is_none())
        {
            rowspan += 1;
        }

        let index = cells.len();
        for r in p.row..p.row + rowspan {
            for c in p.col..p.col + colspan {
                owner[r as usize * width + c as usize] = Some(index);
            }
        }
        cells.push(GridCell {
            row: p.row,
            col: p.col,
            rowspan,
            colspan,
            text: p.text,
        });
    }

    for (pos, slot) in owner.iter().enumerate() {
        if slot.is_none() {
            cells.push(GridCell {
                row: (pos / width) as u32,
                col: (pos % width) as u32,
                rowspan: 1,
                colspan: 1,
                text: String::new(),
            });
        }
    }
    cells.sort_by_key(|c| (c.row, c.col));

    let mut grid = TableGrid {
        rows,
        cols,
        cells,
        summary_row: None,
        key_values: Vec::new(),
        description: None,
    };
    let texts = grid.row_texts();
    if is_key_value(&texts) {
        grid.key_values = key_values(&texts);
    } else if let Some(re) = summary {
        grid.summary_row = (1..rows)
            .rev()
            .find(|&row| texts[row as usize].iter().any(|t| is_summary_label(t, re)));
    }
    grid
}
