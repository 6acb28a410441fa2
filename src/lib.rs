//! # facsimile
//!
//! Turn a PDF page into structured, geometrically-addressed content, rebuild
//! it as HTML, rasterise the reconstruction, and score how visually faithful
//! it is to the original page.
//!
//! ## Why this crate?
//!
//! Checking that a reconstructed document *looks like* its source is harder
//! than diffing text: coordinate systems must agree across PDF, HTML, and
//! raster space, images must be normalised deterministically before
//! comparison, and the diff needs tunable noise tolerance plus spatial
//! reporting so callers can see *where* a reconstruction drifted. This crate
//! implements that loop end to end.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Extract    text lines + embedded images with top-left point bboxes
//!  │                (pdfium, CPU-bound, spawn_blocking)
//!  ├─ 2. Previews   per-page PNG renders at dpi/72, capped at 4000 px
//!  ├─ 3. Template   typed content modules → table-based HTML
//!  ├─ 4. Rasterise  HTML → single-page PDF (weasyprint) → first page PNG
//!  └─ 5. Diff       normalise, blur, threshold, 8×8 region report
//! ```
//!
//! Artifacts flow through a TTL-scoped [`store::AssetStore`] keyed by a
//! per-request process identifier; stages communicate by asset URL, and the
//! rasteriser and diff engine resolve the service's own URLs straight from
//! disk instead of fetching them over the network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use facsimile::{extract_document, render_previews, visual_diff};
//! use facsimile::{AssetStore, PipelineConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let store = AssetStore::new(&config);
//!     let process_id = AssetStore::new_process_id();
//!
//!     let doc = extract_document(Path::new("page.pdf"), &store, &process_id).await?;
//!     let previews = render_previews(Path::new("page.pdf"), &store, &process_id, &config).await?;
//!     println!("{} pages, first preview at {}", doc.page_count, previews[0]);
//!
//!     // ... build modules, render HTML, rasterise, then:
//!     let report = visual_diff(&previews[0], &previews[0], &store, &config).await?;
//!     assert_eq!(report.score, 1.0);
//!     Ok(())
//! }
//! ```
//!
//! ## Coordinate convention
//!
//! Every bounding box this crate emits uses a **top-left origin with y
//! growing downward**, in PDF points (1 pt = 1/72 inch). This differs from
//! the bottom-left convention of many PDF tools; see [`geometry`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `facsimile` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! facsimile = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod geometry;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::FacsimileError;
pub use geometry::Rect;
pub use output::{DiffCell, DiffResult, ExtractedDocument, ImageRef, Page, TextLine};
pub use pipeline::diff::{diff_images, visual_diff};
pub use pipeline::extract::{extract_document, render_previews};
pub use pipeline::rasterize::rasterize_html;
pub use store::{is_asset_url, parse_asset_url, AssetStore};
pub use template::{parse_modules, render_modules, Column, Module};
