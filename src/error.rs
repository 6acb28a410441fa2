//! Error types for the facsimile library.
//!
//! The taxonomy follows the four failure classes of the pipeline:
//!
//! * **Input** — the PDF (or HTML) handed to us is unusable. Surfaced to the
//!   caller, never retried.
//! * **Upstream fetch** — a network fetch for an external image failed or
//!   timed out. Surfaced, never retried; callers may retry a whole request.
//! * **Render** — the HTML-to-raster pipeline failed layout or produced a
//!   zero-page document. Kept distinct from fetch errors so callers can tell
//!   "your HTML is broken" apart from "the network is broken".
//! * **Storage** — an artifact could not be persisted or read back. Fatal for
//!   the current request only; other processes' directories are untouched.
//!
//! A single bad embedded image during extraction is *not* an error at this
//! level — the extractor skips it, logs a warning, and continues.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the facsimile library.
#[derive(Debug, Error)]
pub enum FacsimileError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    ///
    /// Fatal for the whole request: no page of an unopenable document can
    /// be extracted.
    #[error("PDF '{path}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { path: PathBuf, detail: String },

    /// An image source string is neither a data URI, an asset URL, nor an
    /// HTTP/HTTPS URL.
    #[error("Invalid image source '{src}': not a data URI, asset URL, or HTTP/HTTPS URL")]
    InvalidImageSource { src: String },

    /// Image bytes were obtained but could not be decoded.
    #[error("Failed to decode image from '{src}': {detail}")]
    ImageDecodeFailed { src: String, detail: String },

    // ── Upstream fetch errors ─────────────────────────────────────────────
    /// HTTP fetch of an external image failed (connection, status, body).
    #[error("Failed to fetch '{url}': {reason}\nThe pipeline never retries; retry the request if this was transient.")]
    FetchFailed { url: String, reason: String },

    /// HTTP fetch exceeded the configured timeout.
    #[error("Fetch timed out after {secs}s for '{url}'")]
    FetchTimeout { url: String, secs: u64 },

    // ── Render errors ─────────────────────────────────────────────────────
    /// The HTML layout step (weasyprint) failed outright.
    #[error("HTML layout failed (exit code {code}): {stderr}")]
    HtmlLayoutFailed { code: i32, stderr: String },

    /// The layout tool is not installed.
    #[error("weasyprint not found on PATH\nInstall it with: pip install weasyprint")]
    LayoutToolNotFound,

    /// The intermediate document produced by layout has zero pages
    /// (typically an empty HTML body). Distinct from layout and fetch
    /// failures so callers can special-case it.
    #[error("HTML produced an empty document (zero pages); nothing to rasterise")]
    EmptyRender,

    /// pdfium returned an error while rasterising a page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Could not persist an artifact into the asset store.
    #[error("Failed to persist asset '{filename}': {source}")]
    PersistFailed {
        filename: String,
        #[source]
        source: std::io::Error,
    },

    /// Could not read or write process metadata.
    #[error("Failed to access process metadata in '{dir}': {detail}")]
    MetadataFailed { dir: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FacsimileError {
    /// True when the error belongs to the render class (layout failure or
    /// zero-page intermediate), as opposed to fetch or input failures.
    pub fn is_render_error(&self) -> bool {
        matches!(
            self,
            FacsimileError::HtmlLayoutFailed { .. }
                | FacsimileError::LayoutToolNotFound
                | FacsimileError::EmptyRender
                | FacsimileError::RasterisationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_timeout_display() {
        let e = FacsimileError::FetchTimeout {
            url: "http://example.com/a.png".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
        assert!(e.to_string().contains("example.com"));
    }

    #[test]
    fn empty_render_is_render_class() {
        assert!(FacsimileError::EmptyRender.is_render_error());
        let fetch = FacsimileError::FetchFailed {
            url: "x".into(),
            reason: "y".into(),
        };
        assert!(!fetch.is_render_error());
    }

    #[test]
    fn corrupt_pdf_display_mentions_path() {
        let e = FacsimileError::CorruptPdf {
            path: PathBuf::from("/tmp/x.pdf"),
            detail: "bad xref".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("/tmp/x.pdf"), "got: {msg}");
        assert!(msg.contains("bad xref"));
    }
}
