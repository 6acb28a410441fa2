//! Content extraction: structured text lines, embedded images, and page
//! previews via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! pdfium wraps a C++ library with thread-local state that must not be
//! driven from async contexts. `tokio::task::spawn_blocking` moves the work
//! onto the blocking thread pool so Tokio workers never stall on CPU-heavy
//! page walks or rasterisation.
//!
//! ## Coordinate convention
//!
//! pdfium reports page-space geometry with a bottom-left origin. Everything
//! this module emits is flipped once into the crate-wide top-left-origin,
//! y-down convention (see [`crate::geometry`]); consumers comparing against
//! bottom-left-origin PDF tools must flip y themselves.

use crate::config::PipelineConfig;
use crate::error::FacsimileError;
use crate::geometry::Rect;
use crate::output::{ExtractedDocument, ImageRef, Page, TextLine};
use crate::store::AssetStore;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

/// Filename of the JSON snapshot persisted beside the extracted assets.
pub const CONTENT_SNAPSHOT_FILENAME: &str = "content.json";

/// Extract text lines and embedded images for every page of a PDF.
///
/// Embedded image bytes are persisted through `store` under the process
/// directory; the returned document is also persisted as a JSON snapshot
/// (`content.json`). A malformed embedded image is skipped with a warning;
/// an unopenable document is fatal for the whole request.
pub async fn extract_document(
    pdf_path: &Path,
    store: &AssetStore,
    process_id: &str,
) -> Result<ExtractedDocument, FacsimileError> {
    let path = pdf_path.to_path_buf();
    let store = store.clone();
    let process_id = process_id.to_string();

    tokio::task::spawn_blocking(move || extract_document_blocking(&path, &store, &process_id))
        .await
        .map_err(|e| FacsimileError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Render every page as a PNG preview at `config.dpi` and return the asset
/// URLs in page order.
///
/// Renders exceeding `config.max_render_pixels` in either dimension are
/// downscaled uniformly (aspect preserved) before being persisted.
pub async fn render_previews(
    pdf_path: &Path,
    store: &AssetStore,
    process_id: &str,
    config: &PipelineConfig,
) -> Result<Vec<String>, FacsimileError> {
    let path = pdf_path.to_path_buf();
    let store = store.clone();
    let process_id = process_id.to_string();
    let dpi = config.dpi;
    let max_pixels = config.max_render_pixels;

    tokio::task::spawn_blocking(move || {
        render_previews_blocking(&path, &store, &process_id, dpi, max_pixels)
    })
    .await
    .map_err(|e| FacsimileError::Internal(format!("Preview task panicked: {}", e)))?
}

// ── Blocking implementations ─────────────────────────────────────────────

fn extract_document_blocking(
    pdf_path: &Path,
    store: &AssetStore,
    process_id: &str,
) -> Result<ExtractedDocument, FacsimileError> {
    validate_pdf_path(pdf_path)?;

    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, pdf_path)?;

    let mut pages = Vec::new();
    // Document-wide image sequence, threaded explicitly through each page.
    let mut image_seq: u32 = 0;

    for (index, page) in document.pages().iter().enumerate() {
        let width_pt = page.width().value;
        let height_pt = page.height().value;

        let text_lines = extract_page_lines(&page, height_pt);
        let images = extract_page_images(&page, height_pt, store, process_id, index, &mut image_seq)?;

        debug!(
            "Page {}: {} text lines, {} images",
            index,
            text_lines.len(),
            images.len()
        );

        pages.push(Page {
            index,
            width_pt,
            height_pt,
            text_lines,
            images,
        });
    }

    let document = ExtractedDocument {
        process_id: process_id.to_string(),
        page_count: pages.len(),
        pages,
    };

    let snapshot = serde_json::to_vec_pretty(&document)
        .map_err(|e| FacsimileError::Internal(format!("Snapshot serialisation failed: {}", e)))?;
    store.persist(process_id, CONTENT_SNAPSHOT_FILENAME, &snapshot)?;

    info!(
        "Extracted {} pages for process {}",
        document.page_count, process_id
    );
    Ok(document)
}

fn render_previews_blocking(
    pdf_path: &Path,
    store: &AssetStore,
    process_id: &str,
    dpi: u32,
    max_pixels: u32,
) -> Result<Vec<String>, FacsimileError> {
    validate_pdf_path(pdf_path)?;

    let pdfium = Pdfium::default();
    let document = open_document(&pdfium, pdf_path)?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    let mut urls = Vec::new();

    for (index, page) in document.pages().iter().enumerate() {
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| FacsimileError::RasterisationFailed {
                page: index,
                detail: format!("{:?}", e),
            })?;
        let mut image = bitmap.as_image();

        if image.width() > max_pixels || image.height() > max_pixels {
            debug!(
                "Preview {}x{} exceeds cap {}, downscaling",
                image.width(),
                image.height(),
                max_pixels
            );
            image = image.resize(max_pixels, max_pixels, image::imageops::FilterType::Lanczos3);
        }

        let filename = format!("render_p{:02}.png", index);
        let url = store.persist(process_id, &filename, &encode_png(&image, index)?)?;
        urls.push(url);
    }

    Ok(urls)
}

// ── Page walks ───────────────────────────────────────────────────────────

/// One text span: a single pdfium text object, already in top-left space.
struct Span {
    text: String,
    bbox: Rect,
    font_size: f32,
    font_name: String,
    color: String,
}

/// Walk a page's text objects and merge them into lines.
///
/// pdfium exposes no block→line→span hierarchy, so text objects play the
/// span role: spans whose vertical extents overlap by more than half the
/// shorter height share a line. Per line, spans are ordered left to right,
/// the bbox is the union of span bboxes, and `font_size`/`font_name`/
/// `color_guess` come from the first span with non-whitespace content.
/// Lines that are whitespace-only after trimming are discarded.
fn extract_page_lines(page: &PdfPage, page_height: f32) -> Vec<TextLine> {
    let mut spans = Vec::new();

    for object in page.objects().iter() {
        if let Some(text_object) = object.as_text_object() {
            let bbox = match object_bounds(&object, page_height) {
                Some(b) => b,
                None => continue,
            };
            let color = text_object
                .fill_color()
                .map(|c| format!("#{:02x}{:02x}{:02x}", c.red(), c.green(), c.blue()))
                .unwrap_or_else(|_| "#000000".to_string());
            spans.push(Span {
                text: text_object.text(),
                bbox,
                font_size: round2(text_object.unscaled_font_size().value),
                font_name: text_object.font().family(),
                color,
            });
        }
    }

    // Group spans into lines by vertical overlap.
    let mut groups: Vec<(Rect, Vec<Span>)> = Vec::new();
    for span in spans {
        let line = groups.iter().position(|(bbox, _)| {
            let min_h = bbox.height().min(span.bbox.height());
            min_h > 0.0 && bbox.vertical_overlap(&span.bbox) / min_h > 0.5
        });
        match line {
            Some(i) => {
                let (bbox, members) = &mut groups[i];
                *bbox = bbox.union(&span.bbox);
                members.push(span);
            }
            None => groups.push((span.bbox, vec![span])),
        }
    }

    // Reading order: top to bottom, then left to right within the line.
    groups.sort_by(|a, b| a.0.y0.total_cmp(&b.0.y0));

    let mut lines = Vec::new();
    for (bbox, mut members) in groups {
        members.sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0));

        let content = members
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if content.is_empty() {
            continue;
        }

        let primary = members
            .iter()
            .find(|s| !s.text.trim().is_empty())
            .unwrap_or(&members[0]);

        lines.push(TextLine {
            content,
            bbox: bbox.rounded(),
            font_size: primary.font_size,
            font_name: primary.font_name.clone(),
            color_guess: primary.color.clone(),
        });
    }

    lines
}

/// Enumerate embedded image placements on a page, persisting the decoded
/// bytes once per placement rectangle (no deduplication across placements).
fn extract_page_images(
    page: &PdfPage,
    page_height: f32,
    store: &AssetStore,
    process_id: &str,
    page_index: usize,
    image_seq: &mut u32,
) -> Result<Vec<ImageRef>, FacsimileError> {
    let mut images = Vec::new();

    for (object_index, object) in page.objects().iter().enumerate() {
        let Some(image_object) = object.as_image_object() else {
            continue;
        };

        let bbox = match object_bounds(&object, page_height) {
            Some(b) => b,
            None => {
                warn!(
                    "Skipping image object {} on page {}: no bounds",
                    object_index, page_index
                );
                continue;
            }
        };

        // A malformed embedded image is a local failure: skip it, keep the page.
        let decoded = match image_object.get_raw_image() {
            Ok(img) => img,
            Err(e) => {
                warn!(
                    "Skipping image object {} on page {}: {:?}",
                    object_index, page_index, e
                );
                continue;
            }
        };

        *image_seq += 1;
        let filename = format!(
            "p{:02}_img{:03}_xref{}.png",
            page_index, image_seq, object_index
        );

        // Storage failures are fatal for the request, unlike decode failures.
        let url = store.persist(process_id, &filename, &encode_png(&decoded, page_index)?)?;

        images.push(ImageRef {
            filename,
            bbox: bbox.rounded(),
            width_px: decoded.width(),
            height_px: decoded.height(),
            url,
        });
    }

    Ok(images)
}

// ── Helpers ──────────────────────────────────────────────────────────────

/// Validate existence, readability, and PDF magic bytes before handing the
/// path to pdfium, so callers get a structured error instead of a pdfium
/// crash report.
fn validate_pdf_path(path: &Path) -> Result<(), FacsimileError> {
    if !path.exists() {
        return Err(FacsimileError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(FacsimileError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(FacsimileError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(FacsimileError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    path: &Path,
) -> Result<PdfDocument<'a>, FacsimileError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| FacsimileError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{:?}", e),
        })
}

/// Object bounds converted from pdfium's bottom-left page space into the
/// crate's top-left convention.
fn object_bounds(object: &PdfPageObject, page_height: f32) -> Option<Rect> {
    let bounds = object.bounds().ok()?;
    let rect = bounds.to_rect();
    Some(Rect::new(
        rect.left.value,
        page_height - rect.top.value,
        rect.right.value,
        page_height - rect.bottom.value,
    ))
}

fn encode_png(image: &DynamicImage, page: usize) -> Result<Vec<u8>, FacsimileError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| FacsimileError::RasterisationFailed {
            page,
            detail: format!("PNG encoding failed: {}", e),
        })?;
    Ok(buf)
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_missing_file() {
        let err = validate_pdf_path(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, FacsimileError::FileNotFound { .. }));
    }

    #[test]
    fn validate_rejects_non_pdf_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a not a pdf").unwrap();
        let err = validate_pdf_path(&path).unwrap_err();
        assert!(matches!(err, FacsimileError::NotAPdf { magic, .. } if &magic == b"GIF8"));
    }

    #[test]
    fn validate_accepts_pdf_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7 rest").unwrap();
        assert!(validate_pdf_path(&path).is_ok());
    }
}
