//! # edgequake-pdf2ocr
//!
//! Turn a PDF into a multi-modal packet: one PNG image per page plus the
//! document's recognised text, ready to hand to a multimodal model.
//!
//! ## Why both images and text?
//!
//! OCR text alone loses layout, figures and handwriting; page images alone
//! make a model re-read every glyph. Sending both lets the consumer cross
//! check the two. The images come from a local pdfium render; the text comes
//! from a pluggable [`RecognitionEngine`] (the hosted Mathpix service, or a
//! deterministic mock for offline use).
//!
//! ## Pipeline Overview
//!
//! ```text
//! document id
//!  │
//!  ├─ 1. Source   fetch bytes (local root, URL, or in-memory)
//!  ├─ 2. Render   rasterise every page via pdfium (spawn_blocking)
//!  ├─ 3. Engine   pick the configured engine from the registry
//!  ├─ 4. OCR      submit → poll every 5 s → fetch (5 min budget)
//!  └─ 5. Output   CombinedResult → text block + base64 PNG blocks
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2ocr::{
//!     CallContext, ConversionConfig, Converter, EngineRegistry, LocalSource, MathpixConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Mathpix is registered (and default) when MATHPIX_APP_ID / MATHPIX_APP_KEY are set.
//!     let registry = EngineRegistry::with_standard_engines(MathpixConfig::from_env())?;
//!     let converter = Converter::new(
//!         Arc::new(LocalSource::new(".")),
//!         Arc::new(registry),
//!         ConversionConfig::default(),
//!     );
//!     let result = converter.convert(&CallContext::new(), "paper.pdf").await?;
//!     println!("{}", result.recognized_text);
//!     eprintln!("{} page images", result.page_count());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2ocr` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ```toml
//! edgequake-pdf2ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod context;
pub mod convert;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod source;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, MathpixConfig, MathpixConfigBuilder};
pub use context::CallContext;
pub use convert::Converter;
pub use engine::job::{JobObserver, JobState, NoopObserver};
pub use engine::mathpix::MathpixEngine;
pub use engine::mock::MockEngine;
pub use engine::registry::{EngineRegistry, EngineRegistryBuilder};
pub use engine::{DocumentType, EngineInfo, RecognitionEngine, RecognitionResult};
pub use error::{ErrorKind, Pdf2OcrError};
pub use output::{CombinedResult, ContentBlock, DocumentMetadata, PageImage};
pub use pipeline::render::{inspect, PageRasterizer, PdfiumRasterizer};
pub use source::{DocumentEntry, DocumentSource, LocalSource, MemorySource};
