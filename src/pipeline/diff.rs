//! Visual diff: normalise two rasters and score how much they differ.
//!
//! ## Normalisation
//!
//! Both images are converted to 3-channel RGB (alpha discarded). The wider
//! image is downscaled to the narrower one's width with Lanczos resampling
//! (aspect preserved) — downscaling both to the smaller width avoids the
//! upscaling artefacts that would dominate the comparison. After width
//! normalisation the shorter image is top-left-anchored onto a white canvas
//! of the taller height, so a legitimately shorter candidate is not
//! penalised for rows it never claimed to have, while every row of the
//! taller image still participates.
//!
//! ## Scoring
//!
//! Per-pixel, per-channel absolute difference, Gaussian-blurred (sigma 1)
//! to suppress compression noise; a pixel is "different" when its maximum
//! channel difference exceeds the threshold (default 15/255).
//! `score = 1 − different/total`, rounded to 4 decimals; zero-area input
//! scores 1.0 vacuously.
//!
//! ## Region report
//!
//! The canvas is partitioned into a fixed 8×8 grid regardless of size; the
//! last row/column absorbs the integer-division remainder. Cells whose
//! differing-pixel fraction exceeds the reporting threshold (default 1 %)
//! are listed row-major from the top left.

use crate::config::PipelineConfig;
use crate::error::FacsimileError;
use crate::output::{DiffCell, DiffResult};
use crate::pipeline::fetch;
use crate::store::AssetStore;
use image::{imageops, DynamicImage, Rgb, RgbImage};
use tracing::debug;

/// Grid dimension of the region report.
pub const DIFF_GRID: u32 = 8;

/// Compare two images by source reference.
///
/// `reference` is ground truth (e.g. the original page render), `candidate`
/// the reconstruction being scored. Each source may be a base64 data URI,
/// an own-asset URL (read from disk), or an external URL (network fetch
/// with `config.fetch_timeout_secs`).
pub async fn visual_diff(
    reference: &str,
    candidate: &str,
    store: &AssetStore,
    config: &PipelineConfig,
) -> Result<DiffResult, FacsimileError> {
    let a = fetch::load_image(reference, store, config.fetch_timeout_secs).await?;
    let b = fetch::load_image(candidate, store, config.fetch_timeout_secs).await?;

    let threshold = config.diff_threshold;
    let cell_min_pct = config.cell_report_min_pct;
    tokio::task::spawn_blocking(move || diff_images(&a, &b, threshold, cell_min_pct))
        .await
        .map_err(|e| FacsimileError::Internal(format!("Diff task panicked: {}", e)))
}

/// Pure comparison over already-loaded images.
pub fn diff_images(
    a: &DynamicImage,
    b: &DynamicImage,
    threshold: u8,
    cell_min_pct: f64,
) -> DiffResult {
    let a = a.to_rgb8();
    let b = b.to_rgb8();

    if a.width() == 0 || a.height() == 0 || b.width() == 0 || b.height() == 0 {
        return DiffResult {
            score: 1.0,
            width: a.width().min(b.width()),
            height: a.height().max(b.height()),
            diffs: Vec::new(),
        };
    }

    let (a, b) = normalize_pair(a, b);
    let (width, height) = (a.width(), a.height());

    // Blur the difference image, not the inputs: compression artefacts are
    // high-frequency and mostly cancel; real content differences survive.
    let mask = diff_mask(&a, &b, threshold);
    let different = mask.iter().filter(|&&d| d).count();
    let total = (width as u64 * height as u64) as usize;
    let score = round4(1.0 - different as f64 / total as f64);
    debug!("{}/{} differing pixels → score {}", different, total, score);

    let diffs = grid_report(&mask, width, height, cell_min_pct);

    DiffResult {
        score,
        width,
        height,
        diffs,
    }
}

/// Width-normalise then height-pad two RGB images to a common canvas.
fn normalize_pair(mut a: RgbImage, mut b: RgbImage) -> (RgbImage, RgbImage) {
    let target_w = a.width().min(b.width());
    if a.width() > target_w {
        a = scale_to_width(&a, target_w);
    }
    if b.width() > target_w {
        b = scale_to_width(&b, target_w);
    }

    let target_h = a.height().max(b.height());
    if a.height() < target_h {
        a = pad_bottom(&a, target_w, target_h);
    }
    if b.height() < target_h {
        b = pad_bottom(&b, target_w, target_h);
    }

    (a, b)
}

fn scale_to_width(img: &RgbImage, target_w: u32) -> RgbImage {
    let target_h =
        ((img.height() as f64 * target_w as f64 / img.width() as f64).round() as u32).max(1);
    imageops::resize(img, target_w, target_h, imageops::FilterType::Lanczos3)
}

fn pad_bottom(img: &RgbImage, width: u32, height: u32) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
    imageops::replace(&mut canvas, img, 0, 0);
    canvas
}

/// Per-pixel "is different" mask, row-major.
fn diff_mask(a: &RgbImage, b: &RgbImage, threshold: u8) -> Vec<bool> {
    let mut diff = RgbImage::new(a.width(), a.height());
    for (x, y, out) in diff.enumerate_pixels_mut() {
        let pa = a.get_pixel(x, y);
        let pb = b.get_pixel(x, y);
        *out = Rgb([
            pa[0].abs_diff(pb[0]),
            pa[1].abs_diff(pb[1]),
            pa[2].abs_diff(pb[2]),
        ]);
    }

    let blurred = imageops::blur(&diff, 1.0);
    blurred
        .pixels()
        .map(|p| p[0].max(p[1]).max(p[2]) > threshold)
        .collect()
}

/// 8×8 region report over the difference mask.
fn grid_report(mask: &[bool], width: u32, height: u32, cell_min_pct: f64) -> Vec<DiffCell> {
    let cell_w = (width / DIFF_GRID).max(1);
    let cell_h = (height / DIFF_GRID).max(1);
    let mut diffs = Vec::new();

    for row in 0..DIFF_GRID {
        for col in 0..DIFF_GRID {
            let x0 = col * cell_w;
            let y0 = row * cell_h;
            if x0 >= width || y0 >= height {
                continue;
            }
            // Last row/column absorbs the remainder of the integer division.
            let x1 = if col == DIFF_GRID - 1 {
                width
            } else {
                ((col + 1) * cell_w).min(width)
            };
            let y1 = if row == DIFF_GRID - 1 {
                height
            } else {
                ((row + 1) * cell_h).min(height)
            };

            let mut cell_diff = 0usize;
            for y in y0..y1 {
                let base = (y * width) as usize;
                cell_diff += mask[base + x0 as usize..base + x1 as usize]
                    .iter()
                    .filter(|&&d| d)
                    .count();
            }

            let cell_total = ((x1 - x0) * (y1 - y0)) as usize;
            let pct = round4(cell_diff as f64 / cell_total as f64);
            if pct > cell_min_pct {
                diffs.push(DiffCell {
                    row,
                    col,
                    diff_pct: pct,
                });
            }
        }
    }

    diffs
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}
