//! Table detection using text position analysis (Stream mode algorithm).
//!
//! Tables are found by text alignment alone, without ruling lines: runs are
//! grouped into rows by baseline, column edges are the left edges that recur
//! across rows, and contiguous well-aligned rows form a table region.

use std::collections::{HashMap, HashSet};

use crate::model::{BBox, TableCell, TextRun};

/// Bucket width (points) for clustering left edges.
const EDGE_BUCKET: f32 = 5.0;
/// A run aligns with a column when its left edge is this close (points).
const ALIGN_TOLERANCE: f32 = 5.0;

/// A detected table region with its content.
#[derive(Debug, Clone)]
pub struct DetectedTable {
    /// Region covered by the table
    pub bbox: BBox,
    /// Column left edges, ascending
    pub columns: Vec<f32>,
    /// Rows of runs, top to bottom
    pub rows: Vec<TableRowData>,
}

/// A row of text runs in a table.
#[derive(Debug, Clone)]
pub struct TableRowData {
    /// Mean baseline of the row (top-left page space)
    pub y: f32,
    /// Runs in this row, sorted by x
    pub runs: Vec<TextRun>,
}

impl TableRowData {
    fn top(&self) -> f32 {
        self.runs.iter().map(|r| r.bbox.y0).fold(f32::INFINITY, f32::min)
    }

    fn bottom(&self) -> f32 {
        self.runs
            .iter()
            .map(|r| r.bbox.y1)
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping runs into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
    /// Regions whose cells average more characters than this are prose
    /// columns, not tables
    pub max_mean_cell_chars: usize,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
            max_mean_cell_chars: 40,
        }
    }
}

/// Detects tables in a page's text runs.
#[derive(Debug, Clone, Default)]
pub struct TableDetector {
    config: TableDetectorConfig,
}

impl TableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables in the given runs.
    ///
    /// Returns detected tables and the runs that were NOT part of tables, the
    /// latter in their original order.
    pub fn detect(&self, runs: Vec<TextRun>) -> (Vec<DetectedTable>, Vec<TextRun>) {
        log::debug!("TableDetector: starting with {} runs", runs.len());

        if runs.len() < self.config.min_rows * self.config.min_columns {
            return (vec![], runs);
        }

        let rows = self.group_into_rows(&runs);
        if rows.len() < self.config.min_rows {
            return (vec![], runs);
        }

        let columns = self.detect_columns(&rows, &runs);
        log::debug!(
            "TableDetector: {} rows, {} candidate columns at {:?}",
            rows.len(),
            columns.len(),
            columns
        );
        if columns.len() < self.config.min_columns {
            return (vec![], runs);
        }

        let regions = self.find_table_regions(&rows, &columns, &runs);
        if regions.is_empty() {
            log::debug!("TableDetector: no table regions found");
            return (vec![], runs);
        }

        let mut used: HashSet<usize> = HashSet::new();
        let mut tables = Vec::new();

        for (start, end) in regions {
            let region_rows = &rows[start..=end];
            let table_columns = self.detect_columns(region_rows, &runs);

            if table_columns.len() < self.config.min_columns {
                continue;
            }
            if table_columns.len() > self.config.max_columns {
                log::debug!(
                    "TableDetector: skipping region, too many columns ({} > {})",
                    table_columns.len(),
                    self.config.max_columns
                );
                continue;
            }

            let data: Vec<TableRowData> = region_rows
                .iter()
                .map(|row| {
                    let mut row_runs: Vec<TextRun> =
                        row.iter().map(|&i| runs[i].clone()).collect();
                    row_runs.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));
                    let y = row_runs.iter().map(|r| r.bbox.y1).sum::<f32>() / row_runs.len() as f32;
                    TableRowData { y, runs: row_runs }
                })
                .collect();

            if self.is_list_pattern(&data, &table_columns) {
                log::debug!("TableDetector: skipping region, detected as list pattern");
                continue;
            }
            if self.is_prose(&data) {
                log::debug!("TableDetector: skipping region, cells read as prose");
                continue;
            }

            let bbox = data
                .iter()
                .flat_map(|r| r.runs.iter())
                .map(|r| r.bbox)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_default();

            used.extend(region_rows.iter().flatten().copied());
            tables.push(DetectedTable {
                bbox,
                columns: table_columns,
                rows: data,
            });
        }

        let remaining = runs
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, run)| run)
            .collect();

        (tables, remaining)
    }

    /// Group run indices into rows by baseline, top to bottom.
    fn group_into_rows(&self, runs: &[TextRun]) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..runs.len()).collect();
        order.sort_by(|&a, &b| {
            runs[a]
                .bbox
                .y1
                .total_cmp(&runs[b].bbox.y1)
                .then(runs[a].bbox.x0.total_cmp(&runs[b].bbox.x0))
        });

        let mut rows: Vec<Vec<usize>> = Vec::new();
        let mut current_y: Option<f32> = None;

        for i in order {
            let run = &runs[i];
            let tolerance = run.font_size * self.config.y_tolerance_factor;
            let same_row = current_y.is_some_and(|y| (run.bbox.y1 - y).abs() <= tolerance);
            if !same_row {
                current_y = Some(run.bbox.y1);
                rows.push(vec![i]);
            } else if let Some(row) = rows.last_mut() {
                row.push(i);
            }
        }

        rows
    }

    /// Detect column edges from left edges that recur across rows.
    ///
    /// Rows with several runs are the likely table rows; when too few exist,
    /// every row votes.
    fn detect_columns(&self, rows: &[Vec<usize>], runs: &[TextRun]) -> Vec<f32> {
        let multi: Vec<&Vec<usize>> = rows.iter().filter(|r| r.len() >= 2).collect();
        let voters: Vec<&Vec<usize>> = if multi.len() >= self.config.min_rows {
            multi
        } else {
            rows.iter().collect()
        };
        if voters.is_empty() {
            return vec![];
        }

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        for row in &voters {
            let buckets: HashSet<i32> = row
                .iter()
                .map(|&i| (runs[i].bbox.x0 / EDGE_BUCKET).round() as i32)
                .collect();
            for bucket in buckets {
                *edge_counts.entry(bucket).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((voters.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .iter()
            .filter(|(_, count)| **count >= min_occurrences)
            .map(|(bucket, _)| *bucket as f32 * EDGE_BUCKET)
            .collect();
        edges.sort_by(f32::total_cmp);

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Find contiguous row regions that align with the columns.
    fn find_table_regions(
        &self,
        rows: &[Vec<usize>],
        columns: &[f32],
        runs: &[TextRun],
    ) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            let aligned = row
                .iter()
                .filter(|&&r| {
                    columns
                        .iter()
                        .any(|c| (runs[r].bbox.x0 - c).abs() <= ALIGN_TOLERANCE)
                })
                .count();
            let score = aligned as f32 / row.len().max(1) as f32;
            // Single-run rows are headings or prose between tables.
            let is_table_row = row.len() >= 2 && score >= self.config.min_alignment_ratio;

            match (is_table_row, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= self.config.min_rows {
                        regions.push((s, i - 1));
                    }
                    start = None;
                }
                _ => {}
            }
        }

        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }

    /// Convert a detected table to grid cells. Every (row, col) position gets
    /// a cell; positions with no text get an empty one.
    pub fn to_cells(&self, detected: &DetectedTable, table: u32, page: u32) -> Vec<TableCell> {
        let columns = &detected.columns;
        let right_x = detected.bbox.x1;
        let mut cells = Vec::with_capacity(detected.rows.len() * columns.len());

        for (row_idx, row) in detected.rows.iter().enumerate() {
            let mut slots: Vec<Vec<&TextRun>> = vec![Vec::new(); columns.len()];
            for run in &row.runs {
                let col = find_column(run.bbox.x0, columns, right_x);
                if let Some(slot) = slots.get_mut(col) {
                    slot.push(run);
                }
            }

            let (top, bottom) = (row.top(), row.bottom());
            for (col_idx, slot) in slots.into_iter().enumerate() {
                let text = slot
                    .iter()
                    .map(|r| r.text.trim())
                    .collect::<Vec<_>>()
                    .join(" ");
                let bbox = slot.iter().map(|r| r.bbox).reduce(|a, b| a.union(&b)).unwrap_or_else(|| {
                    let x0 = columns[col_idx];
                    let x1 = columns.get(col_idx + 1).copied().unwrap_or(right_x).max(x0);
                    BBox::new(x0, top, x1, bottom)
                });
                cells.push(TableCell::new(
                    table,
                    row_idx as u32,
                    col_idx as u32,
                    text,
                    bbox,
                    page,
                ));
            }
        }

        cells
    }

    /// Check if detected table rows actually represent a numbered or bulleted list.
    ///
    /// A numbered list like "1. Item" often yields the number and the text as
    /// separate runs at different x positions, which looks like a two-column
    /// table.
    fn is_list_pattern(&self, rows: &[TableRowData], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullet_count = 0;
        let mut number_count = 0;

        for row in rows {
            if let Some(run) = row.runs.first() {
                let text = run.text.trim();
                if is_bullet_marker(text) {
                    bullet_count += 1;
                } else if is_number_marker(text) {
                    number_count += 1;
                }
            }
        }

        let bullet_ratio = bullet_count as f32 / rows.len() as f32;
        let total_ratio = (bullet_count + number_count) as f32 / rows.len() as f32;

        // Bullets are almost never real table data; numbers only rule out
        // two-column regions, since real tables often number their rows.
        bullet_ratio >= 0.5 || (columns.len() == 2 && total_ratio >= 0.5)
    }

    fn is_prose(&self, rows: &[TableRowData]) -> bool {
        let (chars, count) = rows
            .iter()
            .flat_map(|r| r.runs.iter())
            .fold((0, 0), |(chars, count), r| (chars + r.char_count(), count + 1));
        count > 0 && chars / count > self.config.max_mean_cell_chars
    }
}

/// Find which column a left edge belongs to.
fn find_column(x: f32, columns: &[f32], right_x: f32) -> usize {
    for (i, &col_start) in columns.iter().enumerate() {
        let col_end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        // 10pt slack for runs starting slightly before the column edge
        if x >= col_start - 10.0 && x < col_end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (x - **a).abs().total_cmp(&(x - **b).abs()))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Check if text is a bullet marker (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "□" | "◆" | "◇" | "▶" | "➤"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }

    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && (chars[1] == '.' || chars[1] == ')')
}
