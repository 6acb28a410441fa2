//! Configuration for the extract → rasterise → diff pipeline.
//!
//! Every knob lives in one [`PipelineConfig`] built via
//! [`PipelineConfigBuilder`], so a config can be shared across concurrent
//! requests, logged, and diffed between two runs. The diff thresholds are
//! deliberately configurable but ship with the defaults the scoring
//! behaviour was calibrated against; tests pin those defaults.

use crate::error::FacsimileError;
use std::path::PathBuf;

/// Configuration for one pipeline instance.
///
/// Built via [`PipelineConfig::builder()`] or [`PipelineConfig::default()`].
///
/// # Example
/// ```rust
/// use facsimile::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .dpi(150)
///     .viewport_width(600)
///     .public_base_url("http://reviews.internal:8080")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Rendering DPI for page previews and HTML rasterisation. Range: 72–400. Default: 150.
    ///
    /// Page-space coordinates are points (1 pt = 1/72 inch), so the raster
    /// scale factor is always `dpi / 72`.
    pub dpi: u32,

    /// Maximum preview dimension (width or height) in pixels. Default: 4000.
    ///
    /// Downstream image consumers (vision APIs in particular) reject very
    /// large uploads. Previews exceeding this cap in either dimension are
    /// downscaled uniformly, preserving aspect ratio, before being persisted.
    pub max_render_pixels: u32,

    /// Logical page width in CSS pixels for HTML rasterisation. Default: 600.
    ///
    /// The document height is unconstrained ("auto"): content grows downward
    /// and is never paginated.
    pub viewport_width: u32,

    /// Per-channel difference threshold on a 0–255 scale. Default: 15.
    ///
    /// After blurring, a pixel counts as "different" when the maximum of its
    /// three channel differences exceeds this value. 15 absorbs PNG/JPEG
    /// compression noise without masking real content changes.
    pub diff_threshold: u8,

    /// Minimum fraction of differing pixels for a grid cell to be reported. Default: 0.01.
    pub cell_report_min_pct: f64,

    /// Timeout for network fetches of external images, in seconds. Default: 30.
    ///
    /// A fetch that does not complete within the bound is a terminal
    /// failure; nothing in the pipeline retries.
    pub fetch_timeout_secs: u64,

    /// Wall-clock TTL for persisted process artifacts, in seconds. Default: 3600.
    pub asset_ttl_secs: u64,

    /// Root directory for per-process asset directories.
    ///
    /// Each pipeline invocation reads and writes only
    /// `<output_root>/<process_id>/`, so concurrent requests never contend.
    pub output_root: PathBuf,

    /// Public base URL the asset store embeds in returned asset URLs.
    ///
    /// Also the base the "is this my own asset URL" predicate matches
    /// against when deciding disk-read vs. network-fetch.
    pub public_base_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dpi: 150,
            max_render_pixels: 4000,
            viewport_width: 600,
            diff_threshold: 15,
            cell_report_min_pct: 0.01,
            fetch_timeout_secs: 30,
            asset_ttl_secs: 3600,
            output_root: std::env::temp_dir().join("facsimile-outputs"),
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_render_pixels(mut self, px: u32) -> Self {
        self.config.max_render_pixels = px.max(100);
        self
    }

    pub fn viewport_width(mut self, px: u32) -> Self {
        self.config.viewport_width = px.max(50);
        self
    }

    pub fn diff_threshold(mut self, threshold: u8) -> Self {
        self.config.diff_threshold = threshold;
        self
    }

    pub fn cell_report_min_pct(mut self, pct: f64) -> Self {
        self.config.cell_report_min_pct = pct.clamp(0.0, 1.0);
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn asset_ttl_secs(mut self, secs: u64) -> Self {
        self.config.asset_ttl_secs = secs.max(1);
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.output_root = root.into();
        self
    }

    pub fn public_base_url(mut self, base: impl Into<String>) -> Self {
        // Stored without a trailing slash so URL assembly is uniform.
        let base: String = base.into();
        self.config.public_base_url = base.trim_end_matches('/').to_string();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, FacsimileError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(FacsimileError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.public_base_url.is_empty() {
            return Err(FacsimileError::InvalidConfig(
                "public_base_url must not be empty".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.cell_report_min_pct) {
            return Err(FacsimileError::InvalidConfig(format!(
                "cell_report_min_pct must be in [0,1], got {}",
                c.cell_report_min_pct
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_calibration_baseline() {
        let c = PipelineConfig::default();
        assert_eq!(c.diff_threshold, 15);
        assert_eq!(c.cell_report_min_pct, 0.01);
        assert_eq!(c.dpi, 150);
        assert_eq!(c.max_render_pixels, 4000);
        assert_eq!(c.viewport_width, 600);
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = PipelineConfig::builder().dpi(10).build().unwrap();
        assert_eq!(c.dpi, 72);
        let c = PipelineConfig::builder().dpi(9999).build().unwrap();
        assert_eq!(c.dpi, 400);
    }

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let c = PipelineConfig::builder()
            .public_base_url("http://svc:8080/")
            .build()
            .unwrap();
        assert_eq!(c.public_base_url, "http://svc:8080");
    }
}
