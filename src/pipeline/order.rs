//! Reading-order resolution for one page.
//!
//! Ordering is an explicit clustering step followed by stable sorts:
//!
//! 1. Primitives become layout units (a table's cells form one unit).
//! 2. Units wider than `spanning_ratio` of the content width span columns
//!    and cut the page into horizontal sections.
//! 3. The remaining units are clustered into column bands by merging
//!    their horizontal extents; gaps of at least `min_gutter_width` are
//!    gutters.
//! 4. Each section is read band by band, each band line by line, each
//!    line left to right.
//!
//! Ties always fall back to extraction order.

use std::cmp::Ordering;

use super::classify::ClassifiedPrimitive;
use super::TransformOptions;
use crate::model::{BBox, Primitive};

/// A group of primitives that is ordered as one piece.
#[derive(Debug)]
struct Unit {
    members: Vec<usize>,
    bbox: BBox,
    seq: usize,
}

/// A column band: a horizontal extent holding narrow units.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Band {
    x0: f32,
    x1: f32,
    units: usize,
}

impl Band {
    fn width(&self) -> f32 {
        self.x1 - self.x0
    }
}

/// Order a page's classified primitives for reading.
///
/// The result holds exactly the input primitives; a table's cells stay
/// contiguous, sorted by row then column.
pub fn order_page<'a>(
    items: Vec<ClassifiedPrimitive<'a>>,
    options: &TransformOptions,
) -> Vec<ClassifiedPrimitive<'a>> {
    if items.len() < 2 {
        return items;
    }

    let units = build_units(&items);
    let (min_x, max_x) = units.iter().fold((f32::MAX, f32::MIN), |(lo, hi), u| {
        (lo.min(u.bbox.x0), hi.max(u.bbox.x1))
    });
    let content_width = (max_x - min_x).max(0.0);
    let is_spanning =
        |u: &Unit| content_width > 0.0 && u.bbox.width() > options.spanning_ratio * content_width;

    let (mut spanning, narrow): (Vec<&Unit>, Vec<&Unit>) =
        units.iter().partition(|u| is_spanning(u));
    spanning.sort_by(|a, b| cmp_top_left(a, b));

    let bands = detect_bands(&narrow, options);
    if bands.len() > 1 {
        log::debug!(
            "Page {}: {} column bands {:?}",
            items[0].page(),
            bands.len(),
            bands.iter().map(|b| (b.x0, b.x1)).collect::<Vec<_>>()
        );
    }

    // Narrow units grouped by (section, band).
    let mut sections: Vec<Vec<Vec<&Unit>>> =
        vec![vec![Vec::new(); bands.len().max(1)]; spanning.len() + 1];
    for &unit in &narrow {
        let cy = unit.bbox.center_y();
        let section = spanning.iter().take_while(|s| s.bbox.center_y() <= cy).count();
        let band = band_of(unit, &bands);
        sections[section][band].push(unit);
    }

    let mut ordered_units: Vec<&Unit> = Vec::with_capacity(units.len());
    for (i, section) in sections.into_iter().enumerate() {
        for band in section {
            ordered_units.extend(order_lines(band, options));
        }
        if let Some(span) = spanning.get(i) {
            ordered_units.push(*span);
        }
    }

    let mut slots: Vec<Option<ClassifiedPrimitive<'a>>> = items.into_iter().map(Some).collect();
    ordered_units
        .into_iter()
        .flat_map(|u| u.members.iter())
        .filter_map(|&idx| slots[idx].take())
        .collect()
}

fn build_units(items: &[ClassifiedPrimitive<'_>]) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    let mut table_units: Vec<(u32, usize)> = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        if let Primitive::TableCell(cell) = item.primitive {
            if let Some(&(_, u)) = table_units.iter().find(|(t, _)| *t == cell.table) {
                let unit = &mut units[u];
                unit.members.push(idx);
                unit.bbox = unit.bbox.union(&cell.bbox);
                unit.seq = unit.seq.min(item.seq);
                continue;
            }
            table_units.push((cell.table, units.len()));
        }
        units.push(Unit {
            members: vec![idx],
            bbox: item.bbox(),
            seq: item.seq,
        });
    }

    for &(_, u) in &table_units {
        units[u].members.sort_by_key(|&idx| match items[idx].primitive {
            Primitive::TableCell(cell) => (cell.row, cell.col, items[idx].seq),
            _ => (u32::MAX, u32::MAX, items[idx].seq),
        });
    }

    units
}

/// Cluster narrow units into column bands.
fn detect_bands(narrow: &[&Unit], options: &TransformOptions) -> Vec<Band> {
    let mut extents: Vec<(f32, f32)> = narrow.iter().map(|u| (u.bbox.x0, u.bbox.x1)).collect();
    extents.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut bands: Vec<Band> = Vec::new();
    for (x0, x1) in extents {
        let joins = bands
            .last()
            .is_some_and(|band| x0 < band.x1 + options.min_gutter_width);
        if !joins {
            bands.push(Band { x0, x1, units: 1 });
        } else if let Some(band) = bands.last_mut() {
            band.x1 = band.x1.max(x1);
            band.units += 1;
        }
    }

    // Fold weak bands into their closest neighbour.
    while bands.len() > 1 {
        let weak = bands.iter().position(|b| {
            b.width() < options.min_column_width || b.units < options.min_column_primitives
        });
        let Some(i) = weak else { break };

        let left_gap = (i > 0).then(|| bands[i].x0 - bands[i - 1].x1);
        let right_gap = bands.get(i + 1).map(|next| next.x0 - bands[i].x1);
        let target = match (left_gap, right_gap) {
            (Some(l), Some(r)) if r < l => i + 1,
            (Some(_), _) => i - 1,
            (None, _) => i + 1,
        };

        let (lo, hi) = if target < i { (target, i) } else { (i, target) };
        let merged = Band {
            x0: bands[lo].x0.min(bands[hi].x0),
            x1: bands[lo].x1.max(bands[hi].x1),
            units: bands[lo].units + bands[hi].units,
        };
        bands[lo] = merged;
        bands.remove(hi);
    }

    bands
}

fn band_of(unit: &Unit, bands: &[Band]) -> usize {
    let cx = unit.bbox.center_x();
    bands
        .iter()
        .position(|b| unit.bbox.x0 >= b.x0 && unit.bbox.x1 <= b.x1)
        .or_else(|| bands.iter().position(|b| cx >= b.x0 && cx <= b.x1))
        .unwrap_or_else(|| {
            bands
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    let da = (a.x0 + a.x1) / 2.0 - cx;
                    let db = (b.x0 + b.x1) / 2.0 - cx;
                    da.abs().total_cmp(&db.abs())
                })
                .map(|(i, _)| i)
                .unwrap_or(0)
        })
}

/// Sort units top to bottom, grouping vertically overlapping units into
/// lines read left to right.
fn order_lines<'u>(mut units: Vec<&'u Unit>, options: &TransformOptions) -> Vec<&'u Unit> {
    units.sort_by(|a, b| cmp_top_left(a, b));

    let mut lines: Vec<(BBox, Vec<&'u Unit>)> = Vec::new();
    for unit in units {
        let joins = lines
            .last()
            .is_some_and(|(line_box, _)| same_line(line_box, &unit.bbox, options));
        if !joins {
            lines.push((unit.bbox, vec![unit]));
        } else if let Some((line_box, members)) = lines.last_mut() {
            *line_box = line_box.union(&unit.bbox);
            members.push(unit);
        }
    }

    lines
        .into_iter()
        .flat_map(|(_, mut members)| {
            members.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0).then(a.seq.cmp(&b.seq)));
            members
        })
        .collect()
}

fn same_line(line: &BBox, bbox: &BBox, options: &TransformOptions) -> bool {
    let shorter = line.height().min(bbox.height());
    if shorter <= 0.0 {
        return (line.center_y() - bbox.center_y()).abs() < f32::EPSILON;
    }
    line.vertical_overlap(bbox) >= options.line_overlap_ratio * shorter
}

fn cmp_top_left(a: &Unit, b: &Unit) -> Ordering {
    a.bbox
        .y0
        .total_cmp(&b.bbox.y0)
        .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        .then(a.seq.cmp(&b.seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityType, TableCell, TextRun};

    fn run(text: &str, x: f32, y: f32, width: f32) -> Primitive {
        TextRun::new(text, 10.0, BBox::new(x, y, x + width, y + 10.0), 1).into()
    }

    fn classify(primitives: &[Primitive]) -> Vec<ClassifiedPrimitive<'_>> {
        primitives
            .iter()
            .enumerate()
            .map(|(seq, primitive)| ClassifiedPrimitive {
                primitive,
                entity_type: EntityType::Paragraph,
                confidence: 0.9,
                heading_level: None,
                seq,
            })
            .collect()
    }

    fn texts(ordered: &[ClassifiedPrimitive<'_>]) -> Vec<String> {
        ordered
            .iter()
            .map(|c| match c.primitive {
                Primitive::TextRun(run) => run.text.clone(),
                Primitive::TableCell(cell) => cell.text.clone(),
                Primitive::ImageRegion(image) => image.image_ref.clone(),
            })
            .collect()
    }

    #[test]
    fn test_top_to_bottom() {
        let primitives = vec![
            run("third", 72.0, 300.0, 400.0),
            run("first", 72.0, 100.0, 400.0),
            run("second", 72.0, 200.0, 400.0),
        ];
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(texts(&ordered), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_same_line_left_to_right() {
        let primitives = vec![
            run("right", 300.0, 100.0, 100.0),
            run("left", 72.0, 101.0, 100.0),
            run("below", 72.0, 130.0, 100.0),
        ];
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(texts(&ordered), vec!["left", "right", "below"]);
    }

    #[test]
    fn test_two_columns_read_column_by_column() {
        let mut primitives = Vec::new();
        for i in 0..4 {
            let y = 100.0 + i as f32 * 14.0;
            primitives.push(run(&format!("L{}", i), 50.0, y, 200.0));
            primitives.push(run(&format!("R{}", i), 320.0, y, 200.0));
        }
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(
            texts(&ordered),
            vec!["L0", "L1", "L2", "L3", "R0", "R1", "R2", "R3"]
        );
    }

    #[test]
    fn test_spanning_title_splits_sections() {
        let primitives = vec![
            run("L-top", 50.0, 100.0, 200.0),
            run("R-top", 320.0, 100.0, 200.0),
            run("L-top2", 50.0, 114.0, 200.0),
            run("R-top2", 320.0, 114.0, 200.0),
            run("Full width", 50.0, 200.0, 470.0),
            run("L-bottom", 50.0, 300.0, 200.0),
            run("R-bottom", 320.0, 300.0, 200.0),
            run("L-bottom2", 50.0, 314.0, 200.0),
            run("R-bottom2", 320.0, 314.0, 200.0),
        ];
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(
            texts(&ordered),
            vec![
                "L-top", "L-top2", "R-top", "R-top2", "Full width", "L-bottom", "L-bottom2",
                "R-bottom", "R-bottom2"
            ]
        );
    }

    #[test]
    fn test_narrow_band_merges_into_neighbour() {
        let primitives = vec![
            run("a", 50.0, 100.0, 200.0),
            run("b", 50.0, 114.0, 200.0),
            run("1", 530.0, 100.0, 10.0),
        ];
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(texts(&ordered), vec!["a", "1", "b"]);
    }

    #[test]
    fn test_identical_boxes_keep_extraction_order() {
        let primitives = vec![
            run("one", 72.0, 100.0, 100.0),
            run("two", 72.0, 100.0, 100.0),
            run("three", 72.0, 100.0, 100.0),
        ];
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(texts(&ordered), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_table_cells_stay_together() {
        let cell = |row: u32, col: u32, text: &str| -> Primitive {
            let x = 72.0 + col as f32 * 100.0;
            let y = 200.0 + row as f32 * 20.0;
            TableCell::new(0, row, col, text, BBox::new(x, y, x + 90.0, y + 12.0), 1).into()
        };
        let primitives = vec![
            cell(1, 1, "B2"),
            cell(0, 0, "A1"),
            run("after", 72.0, 300.0, 300.0),
            cell(1, 0, "A2"),
            cell(0, 1, "B1"),
            run("before", 72.0, 100.0, 300.0),
        ];
        let ordered = order_page(classify(&primitives), &TransformOptions::default());
        assert_eq!(
            texts(&ordered),
            vec!["before", "A1", "B1", "A2", "B2", "after"]
        );
    }
}
