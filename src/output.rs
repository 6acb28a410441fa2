//! Output types: extraction snapshots and diff reports.
//!
//! Everything here is produced fresh per request, never mutated after
//! creation, and serialises to the JSON shapes persisted in the asset
//! store (`content.json`) or returned to callers. No type carries
//! cross-request identity beyond the process identifier namespacing its
//! artifacts.

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};

/// Extraction result for a whole document: one [`Page`] per PDF page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Process identifier namespacing this document's persisted artifacts.
    pub process_id: String,
    pub page_count: usize,
    pub pages: Vec<Page>,
}

/// Structured content of a single PDF page.
///
/// Bounding boxes are top-left-origin points; see [`crate::geometry`] for
/// the coordinate convention and how it differs from bottom-left PDF tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 0-based page index.
    pub index: usize,
    /// Page width in points (1 pt = 1/72 inch).
    pub width_pt: f32,
    /// Page height in points.
    pub height_pt: f32,
    pub text_lines: Vec<TextLine>,
    pub images: Vec<ImageRef>,
}

/// One merged line of text.
///
/// Produced by joining all spans sharing a line, left to right; the bbox is
/// the union of the span bboxes. `font_size`, `font_name` and `color_guess`
/// come from the first span in the line with non-whitespace content —
/// per-character attribute variation within a line is not modelled.
///
/// The bbox has positive area for any line with visible content; the one
/// exception is a line consisting of a single zero-width glyph, whose bbox
/// degenerates to a zero span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLine {
    pub content: String,
    pub bbox: Rect,
    pub font_size: f32,
    pub font_name: String,
    /// Fill colour of the line's leading span, `#rrggbb`.
    pub color_guess: String,
}

/// One placement of an embedded raster image on a page.
///
/// A single embedded resource placed twice yields two entries, one per
/// placement rectangle; placements are not deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    /// Asset filename, `p<page>_img<seq>_xref<id>.<ext>`.
    pub filename: String,
    pub bbox: Rect,
    /// Native pixel dimensions of the embedded resource.
    pub width_px: u32,
    pub height_px: u32,
    /// Asset-store URL serving the persisted bytes.
    pub url: String,
}

/// Result of comparing a candidate raster against a reference raster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    /// 1.0 = identical within threshold, 0.0 = maximally different.
    /// Rounded to 4 decimal places.
    pub score: f64,
    /// Width of the normalised comparison canvas in pixels.
    pub width: u32,
    /// Height of the normalised comparison canvas in pixels.
    pub height: u32,
    /// Grid cells whose differing-pixel fraction exceeded the reporting
    /// threshold. Empty when the images match everywhere.
    pub diffs: Vec<DiffCell>,
}

/// One cell of the fixed 8×8 diff grid, 0-based, row-major from top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiffCell {
    pub row: u32,
    pub col: u32,
    /// Fraction of the cell's pixels that differ, rounded to 4 decimals.
    pub diff_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_snapshot_json_shape() {
        let page = Page {
            index: 0,
            width_pt: 612.0,
            height_pt: 792.0,
            text_lines: vec![TextLine {
                content: "Hello".into(),
                bbox: Rect::new(72.0, 60.0, 120.0, 74.0),
                font_size: 12.0,
                font_name: "Helvetica".into(),
                color_guess: "#000000".into(),
            }],
            images: vec![],
        };
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["text_lines"][0]["bbox"]["x0"], 72.0);
        assert_eq!(json["text_lines"][0]["color_guess"], "#000000");
        assert_eq!(json["images"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn diff_result_round_trips() {
        let result = DiffResult {
            score: 0.9876,
            width: 600,
            height: 800,
            diffs: vec![DiffCell {
                row: 1,
                col: 7,
                diff_pct: 0.0312,
            }],
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: DiffResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.score, 0.9876);
        assert_eq!(back.diffs[0], result.diffs[0]);
    }
}
