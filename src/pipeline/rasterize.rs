//! HTML rasterisation: lay out HTML at a fixed logical width and rasterise
//! the first page of the resulting document to a PNG.
//!
//! ## Pipeline
//!
//! HTML → weasyprint (subprocess) → single-page PDF → pdfium → PNG.
//!
//! No crate in the Rust ecosystem does CSS layout, so the layout step
//! shells out to the `weasyprint` CLI, the same way a poppler-based
//! extractor shells out to `pdftotext`. The page is declared
//! `size: <width>px auto` with zero margins: the document grows downward to
//! fit its content and never paginates.
//!
//! ## Asset resolution
//!
//! URLs in the HTML that match the asset store's own scheme are rewritten
//! to `file://` paths *before* layout, so rendering a reconstruction never
//! issues a network call back into the service that is running it (which
//! would deadlock a single-worker deployment). All other URLs are fetched
//! by weasyprint normally.

use crate::config::PipelineConfig;
use crate::error::FacsimileError;
use crate::store::AssetStore;
use once_cell::sync::Lazy;
use pdfium_render::prelude::*;
use regex::Regex;
use std::io::Cursor;
use std::process::Command;
use tracing::{debug, info};

/// Filename under which the rasterised preview is persisted.
pub const PREVIEW_FILENAME: &str = "preview.png";

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>]+"#).expect("static regex"));

/// Rasterise `html` as a single page of width `config.viewport_width` CSS
/// pixels at `config.dpi`, persist the PNG as `preview.png`, and return its
/// asset URL.
///
/// # Errors
///
/// [`FacsimileError::EmptyRender`] when layout produces a zero-page
/// document (e.g. an empty body) — distinct from
/// [`FacsimileError::HtmlLayoutFailed`] and from fetch errors.
pub async fn rasterize_html(
    html: &str,
    store: &AssetStore,
    process_id: &str,
    config: &PipelineConfig,
) -> Result<String, FacsimileError> {
    let html = html.to_string();
    let store = store.clone();
    let process_id = process_id.to_string();
    let viewport_width = config.viewport_width;
    let dpi = config.dpi;

    tokio::task::spawn_blocking(move || {
        rasterize_html_blocking(&html, &store, &process_id, viewport_width, dpi)
    })
    .await
    .map_err(|e| FacsimileError::Internal(format!("Rasterise task panicked: {}", e)))?
}

/// Check if weasyprint is available on the system.
pub fn is_available() -> bool {
    Command::new("weasyprint")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn rasterize_html_blocking(
    html: &str,
    store: &AssetStore,
    process_id: &str,
    viewport_width: u32,
    dpi: u32,
) -> Result<String, FacsimileError> {
    let rewritten = rewrite_asset_urls(html, store);

    let workdir = tempfile::tempdir()
        .map_err(|e| FacsimileError::Internal(format!("tempdir: {e}")))?;
    let html_path = workdir.path().join("input.html");
    let css_path = workdir.path().join("page.css");
    let pdf_path = workdir.path().join("layout.pdf");

    std::fs::write(&html_path, &rewritten)
        .map_err(|e| FacsimileError::Internal(format!("write html: {e}")))?;
    std::fs::write(
        &css_path,
        format!("@page {{ size: {viewport_width}px auto; margin: 0; }}\nbody {{ margin: 0; padding: 0; }}\n"),
    )
    .map_err(|e| FacsimileError::Internal(format!("write css: {e}")))?;

    let output = Command::new("weasyprint")
        .arg(&html_path)
        .arg(&pdf_path)
        .arg("--stylesheet")
        .arg(&css_path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FacsimileError::LayoutToolNotFound
            } else {
                FacsimileError::HtmlLayoutFailed {
                    code: -1,
                    stderr: e.to_string(),
                }
            }
        })?;

    if !output.status.success() {
        return Err(FacsimileError::HtmlLayoutFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    // First (only) page of the intermediate → PNG at dpi/72 scale.
    let pdfium = Pdfium::default();
    let document = pdfium
        .load_pdf_from_file(&pdf_path, None)
        .map_err(|e| FacsimileError::HtmlLayoutFailed {
            code: 0,
            stderr: format!("layout produced an unreadable document: {:?}", e),
        })?;

    let pages = document.pages();
    if pages.len() == 0 {
        return Err(FacsimileError::EmptyRender);
    }
    let page = pages.get(0).map_err(|e| FacsimileError::RasterisationFailed {
        page: 0,
        detail: format!("{:?}", e),
    })?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| FacsimileError::RasterisationFailed {
            page: 0,
            detail: format!("{:?}", e),
        })?;
    let image = bitmap.as_image();
    debug!("Rasterised HTML → {}x{} px", image.width(), image.height());

    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| FacsimileError::RasterisationFailed {
            page: 0,
            detail: format!("PNG encoding failed: {}", e),
        })?;

    let url = store.persist(process_id, PREVIEW_FILENAME, &buf)?;
    info!("Persisted rasterised preview for process {}", process_id);
    Ok(url)
}

/// Rewrite every own-asset URL in `html` to a local `file://` path.
///
/// URLs appear in attribute position, so `&` may be entity-encoded; each
/// candidate is resolved both raw and with `&amp;` decoded. URLs that do
/// not resolve (foreign scheme, expired process, missing file) are left
/// untouched for the layout engine's normal fetcher.
fn rewrite_asset_urls(html: &str, store: &AssetStore) -> String {
    URL_RE
        .replace_all(html, |caps: &regex::Captures<'_>| {
            let raw = &caps[0];
            let decoded = raw.replace("&amp;", "&");
            match store.resolve(&decoded) {
                Some(path) => format!("file://{}", path.display()),
                None => raw.to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with_asset() -> (AssetStore, TempDir, String) {
        let dir = TempDir::new().unwrap();
        let store = AssetStore::from_parts(dir.path().to_path_buf(), "http://svc:8080", 3600);
        let url = store.persist("p1", "img.png", b"png-bytes").unwrap();
        (store, dir, url)
    }

    #[test]
    fn own_urls_are_rewritten_to_file_paths() {
        let (store, _dir, url) = store_with_asset();
        let html = format!("<img src=\"{url}\">");
        let out = rewrite_asset_urls(&html, &store);
        assert!(out.contains("file://"), "got: {out}");
        assert!(out.contains("img.png"));
        assert!(!out.contains("http://svc:8080"));
    }

    #[test]
    fn entity_encoded_ampersands_are_handled() {
        let (store, _dir, url) = store_with_asset();
        let encoded = url.replace('&', "&amp;");
        let html = format!("<img src=\"{encoded}\">");
        let out = rewrite_asset_urls(&html, &store);
        assert!(out.contains("file://"), "got: {out}");
    }

    #[test]
    fn foreign_urls_are_left_for_network_fetch() {
        let (store, _dir, _url) = store_with_asset();
        let html = "<img src=\"https://example.com/logo.png\">";
        assert_eq!(rewrite_asset_urls(html, &store), html);
    }

    #[test]
    fn missing_asset_urls_are_left_untouched() {
        let (store, _dir, _url) = store_with_asset();
        let gone = store.asset_url("p1", "nope.png");
        let html = format!("<img src=\"{gone}\">");
        assert_eq!(rewrite_asset_urls(&html, &store), html);
    }
}
