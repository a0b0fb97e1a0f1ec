//! Transformation thresholds.
//!
//! Every heuristic the pipeline applies reads its threshold from here.

/// Options for classifying, ordering and assembling primitives.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOptions {
    /// Minimum font size ratio to the body size for a heading
    pub heading_size_ratio: f32,

    /// Minimum font size ratio for a bold run to count as a heading
    pub bold_heading_ratio: f32,

    /// Headings span at most this many lines
    pub max_heading_lines: usize,

    /// Headings hold at most this many characters
    pub max_heading_chars: usize,

    /// Captions hold at most this many characters
    pub caption_max_chars: usize,

    /// Maximum gap below a table or image for a caption (multiples of font size)
    pub caption_max_gap: f32,

    /// Maximum vertical gap between merged runs (multiples of font size)
    pub merge_gap_ratio: f32,

    /// Maximum font size difference between merged runs (points)
    pub font_size_tolerance: f32,

    /// Minimum empty horizontal band between columns (points)
    pub min_gutter_width: f32,

    /// Columns narrower than this merge into a neighbour (points)
    pub min_column_width: f32,

    /// Columns with fewer primitives merge into a neighbour
    pub min_column_primitives: usize,

    /// Primitives wider than this share of the content width span columns
    pub spanning_ratio: f32,

    /// Minimum vertical overlap (share of the shorter box) for one line
    pub line_overlap_ratio: f32,

    /// Maximum title length in characters
    pub max_title_chars: usize,

    /// Length of derived title snippets in characters
    pub snippet_chars: usize,

    /// Continue paragraphs and tables across page breaks
    pub merge_across_pages: bool,

    /// Share of the page height treated as the top or bottom edge
    pub page_edge_margin: f32,

    /// Words marking a table's summary row
    pub summary_keywords: Vec<String>,
}

impl TransformOptions {
    /// Create new transform options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the heading font size ratio.
    pub fn with_heading_ratio(mut self, ratio: f32) -> Self {
        self.heading_size_ratio = ratio.max(1.0);
        self
    }

    /// Set the caption length limit.
    pub fn with_caption_max_chars(mut self, chars: usize) -> Self {
        self.caption_max_chars = chars;
        self
    }

    /// Set the merge gap ratio.
    pub fn with_merge_gap(mut self, ratio: f32) -> Self {
        self.merge_gap_ratio = ratio.max(0.0);
        self
    }

    /// Set the minimum gutter width.
    pub fn with_min_gutter(mut self, width: f32) -> Self {
        self.min_gutter_width = width.max(0.0);
        self
    }

    /// Set the maximum title length.
    pub fn with_max_title(mut self, chars: usize) -> Self {
        self.max_title_chars = chars.max(1);
        self
    }

    /// Enable or disable cross-page continuation.
    pub fn with_page_merging(mut self, merge: bool) -> Self {
        self.merge_across_pages = merge;
        self
    }

    /// Replace the summary row keywords.
    pub fn with_summary_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summary_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            heading_size_ratio: 1.3,
            bold_heading_ratio: 1.1,
            max_heading_lines: 2,
            max_heading_chars: 120,
            caption_max_chars: 200,
            caption_max_gap: 1.5,
            merge_gap_ratio: 0.8,
            font_size_tolerance: 1.0,
            min_gutter_width: 12.0,
            min_column_width: 80.0,
            min_column_primitives: 2,
            spanning_ratio: 0.6,
            line_overlap_ratio: 0.5,
            max_title_chars: 80,
            snippet_chars: 60,
            merge_across_pages: true,
            page_edge_margin: 0.15,
            summary_keywords: [
                "total",
                "sum",
                "subtotal",
                "grand total",
                "average",
                "net total",
                "net payable",
                "net commission",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_options_builder() {
        let options = TransformOptions::new()
            .with_heading_ratio(0.5)
            .with_max_title(0)
            .with_page_merging(false)
            .with_summary_keywords(["gesamt"]);

        assert_eq!(options.heading_size_ratio, 1.0);
        assert_eq!(options.max_title_chars, 1);
        assert!(!options.merge_across_pages);
        assert_eq!(options.summary_keywords, vec!["gesamt".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let options = TransformOptions::default();
        assert_eq!(options.heading_size_ratio, 1.3);
        assert_eq!(options.snippet_chars, 60);
        assert!(options.summary_keywords.iter().any(|k| k == "grand total"));
    }
}
