//! Pipeline stages for the extract → render → rasterise → diff loop.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. the HTML layout backend) without touching the rest.
//!
//! ## Data Flow
//!
//! ```text
//! PDF ──▶ extract ──▶ caller builds modules ──▶ template ──▶ rasterize ──▶ diff
//!         (pdfium)                              (HTML)       (weasyprint   (image
//!            │                                                + pdfium)     compare)
//!            └─▶ page previews ──────────────────────────────────────────────┘
//! ```
//!
//! 1. [`extract`]   — structured text lines + embedded images per page, and
//!    whole-page raster previews; runs in `spawn_blocking` because pdfium is
//!    not async-safe
//! 2. [`rasterize`] — HTML at a fixed logical width → single-page PDF →
//!    first page as PNG
//! 3. [`fetch`]     — image loading for the diff: data URI, own asset from
//!    disk, or network with a bounded timeout; the only stage with network I/O
//! 4. [`diff`]      — deterministic normalisation and thresholded pixel
//!    comparison with an 8×8 region report

pub mod diff;
pub mod extract;
pub mod fetch;
pub mod rasterize;
