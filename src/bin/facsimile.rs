//! CLI binary for facsimile.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, drives one pipeline stage per subcommand, and prints
//! results as JSON (machine-readable, pipeable into the next stage).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facsimile::{
    extract_document, parse_modules, rasterize_html, render_modules, render_previews, visual_diff,
    AssetStore, PipelineConfig,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract structured content (text lines, images) from a PDF
  facsimile extract document.pdf

  # Render page previews at 200 DPI
  facsimile previews document.pdf --dpi 200

  # Build HTML from a module list and rasterise it
  facsimile render modules.json -o reconstruction.html
  facsimile rasterize reconstruction.html --width 600

  # Score a reconstruction against the original page render
  facsimile diff "$REFERENCE_URL" "$CANDIDATE_URL"

  # Sweep expired process directories
  facsimile cleanup

ENVIRONMENT VARIABLES:
  FACSIMILE_OUTPUT_ROOT   Root directory for per-process artifacts
  FACSIMILE_BASE_URL      Public base URL embedded in asset URLs
  PDFIUM_LIB_PATH         Path to an existing libpdfium

SETUP:
  pdfium is loaded as a system library; weasyprint (pip install weasyprint)
  is required for the rasterize subcommand only.
"#;

/// Extract PDF content, rebuild it as HTML, rasterise, and score fidelity.
#[derive(Parser, Debug)]
#[command(
    name = "facsimile",
    version,
    about = "Extract PDF page content, rebuild it as HTML, rasterise, and score visual fidelity",
    arg_required_else_help = true,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root directory for per-process artifact storage.
    #[arg(long, global = true, env = "FACSIMILE_OUTPUT_ROOT")]
    output_root: Option<PathBuf>,

    /// Public base URL for generated asset URLs.
    #[arg(long, global = true, env = "FACSIMILE_BASE_URL")]
    base_url: Option<String>,

    /// Reuse an existing process identifier instead of generating one.
    #[arg(long, global = true)]
    process_id: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors and results.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract text lines and embedded images from every page.
    Extract {
        /// Path to the PDF file.
        pdf: PathBuf,

        /// Also render page previews and include their URLs.
        #[arg(long)]
        previews: bool,

        /// Rendering DPI for previews.
        #[arg(long, default_value_t = 150)]
        dpi: u32,
    },

    /// Render per-page PNG previews.
    Previews {
        pdf: PathBuf,

        #[arg(long, default_value_t = 150)]
        dpi: u32,
    },

    /// Render a JSON module list to HTML.
    Render {
        /// JSON file holding an array of content modules.
        modules: PathBuf,

        /// Logical page width in CSS pixels.
        #[arg(long, default_value_t = 600)]
        width: u32,

        /// Write HTML here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Rasterise an HTML file to a PNG preview.
    Rasterize {
        /// Path to the HTML file ('-' for stdin).
        html: PathBuf,

        #[arg(long, default_value_t = 600)]
        width: u32,

        #[arg(long, default_value_t = 150)]
        dpi: u32,
    },

    /// Compare two images and report a similarity score.
    Diff {
        /// Reference image: data URI, asset URL, or external URL.
        reference: String,

        /// Candidate image to score against the reference.
        candidate: String,
    },

    /// Delete expired process directories.
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;
    let store = AssetStore::new(&config);
    let process_id = cli
        .process_id
        .clone()
        .unwrap_or_else(AssetStore::new_process_id);

    match cli.command {
        Command::Extract { pdf, previews, dpi } => {
            let config = with_dpi(config, dpi)?;
            let doc = extract_document(&pdf, &store, &process_id)
                .await
                .context("Extraction failed")?;

            if previews {
                let urls = render_previews(&pdf, &store, &process_id, &config)
                    .await
                    .context("Preview rendering failed")?;
                print_json(&serde_json::json!({ "document": doc, "previews": urls }))?;
            } else {
                print_json(&doc)?;
            }
        }

        Command::Previews { pdf, dpi } => {
            let config = with_dpi(config, dpi)?;
            let urls = render_previews(&pdf, &store, &process_id, &config)
                .await
                .context("Preview rendering failed")?;
            print_json(&serde_json::json!({ "process_id": process_id, "previews": urls }))?;
        }

        Command::Render {
            modules,
            width,
            output,
        } => {
            let raw = std::fs::read_to_string(&modules)
                .with_context(|| format!("Failed to read {}", modules.display()))?;
            let values: Vec<serde_json::Value> =
                serde_json::from_str(&raw).context("Module file must be a JSON array")?;
            let html = render_modules(&parse_modules(&values), width);

            match output {
                Some(path) => std::fs::write(&path, html)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => io::stdout().write_all(html.as_bytes())?,
            }
        }

        Command::Rasterize { html, width, dpi } => {
            let content = if html.as_os_str() == "-" {
                io::read_to_string(io::stdin())?
            } else {
                std::fs::read_to_string(&html)
                    .with_context(|| format!("Failed to read {}", html.display()))?
            };
            let config = PipelineConfig::builder()
                .dpi(dpi)
                .viewport_width(width)
                .output_root(config.output_root.clone())
                .public_base_url(config.public_base_url.clone())
                .build()
                .context("Invalid configuration")?;
            let url = rasterize_html(&content, &store, &process_id, &config)
                .await
                .context("Rasterisation failed")?;
            print_json(&serde_json::json!({ "process_id": process_id, "preview_url": url }))?;
        }

        Command::Diff {
            reference,
            candidate,
        } => {
            let result = visual_diff(&reference, &candidate, &store, &config)
                .await
                .context("Diff failed")?;
            print_json(&result)?;
        }

        Command::Cleanup => {
            store.cleanup_expired();
        }
    }

    Ok(())
}

/// Map global CLI flags to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder();
    if let Some(ref root) = cli.output_root {
        builder = builder.output_root(root.clone());
    }
    if let Some(ref base) = cli.base_url {
        builder = builder.public_base_url(base.clone());
    }
    builder.build().context("Invalid configuration")
}

fn with_dpi(config: PipelineConfig, dpi: u32) -> Result<PipelineConfig> {
    PipelineConfig::builder()
        .dpi(dpi)
        .output_root(config.output_root)
        .public_base_url(config.public_base_url)
        .build()
        .context("Invalid configuration")
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise result")?;
    println!("{json}");
    Ok(())
}
