//! Conversion orchestrator: one PDF in, page images plus recognised text out.
//!
//! A [`Converter`] wires together the three collaborators a conversion needs:
//!
//! ```text
//! DocumentSource ──▶ bytes ──┬──▶ PageRasterizer ──▶ PageImage × N
//!                            └──▶ RecognitionEngine::process_pdf ──▶ text
//!                                          │
//!                                   CombinedResult
//! ```
//!
//! The rasteriser and the engine both receive the original bytes; neither
//! depends on the other's output, so with
//! [`ConversionConfig::overlap_stages`] they run concurrently. Either way a
//! conversion either returns a complete [`CombinedResult`] or an error; there
//! is no partial success.

use crate::config::ConversionConfig;
use crate::context::CallContext;
use crate::engine::registry::EngineRegistry;
use crate::engine::{RecognitionEngine, RecognitionResult};
use crate::error::Pdf2OcrError;
use crate::output::{CombinedResult, PageImage};
use crate::pipeline::render::{PageRasterizer, PdfiumRasterizer};
use crate::source::DocumentSource;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs conversions against a fixed source, registry and rasteriser.
///
/// Cheap to clone; every field is shared.
#[derive(Clone)]
pub struct Converter {
    source: Arc<dyn DocumentSource>,
    registry: Arc<EngineRegistry>,
    rasterizer: Arc<dyn PageRasterizer>,
    config: ConversionConfig,
}

impl Converter {
    /// A converter that rasterises with pdfium.
    pub fn new(
        source: Arc<dyn DocumentSource>,
        registry: Arc<EngineRegistry>,
        config: ConversionConfig,
    ) -> Self {
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(&config));
        Self {
            source,
            registry,
            rasterizer,
            config,
        }
    }

    /// Replace the rasteriser.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn source(&self) -> &dyn DocumentSource {
        self.source.as_ref()
    }

    /// Fetch `document_id` from the source and convert it.
    ///
    /// # Errors
    /// - `NotFound` when the source does not know the id
    /// - `Decode` / `PasswordRequired` / `WrongPassword` / `Encode` from
    ///   rasterisation, including a document with zero pages
    /// - `EngineUnavailable` when the configured engine is not registered
    /// - whatever the engine reports (`Submission`, `JobFailed`,
    ///   `JobTimedOut`, ...)
    /// - `Cancelled` / `DeadlineExceeded` from `ctx`
    pub async fn convert(
        &self,
        ctx: &CallContext,
        document_id: &str,
    ) -> Result<CombinedResult, Pdf2OcrError> {
        let started = Instant::now();
        info!("Starting conversion: {}", document_id);

        // ── Step 1: Fetch bytes ──────────────────────────────────────────────
        let bytes = ctx.run(self.source.fetch(document_id)).await?;
        debug!("Fetched {} bytes for {}", bytes.len(), document_id);

        self.convert_fetched(ctx, document_id, bytes.into(), started)
            .await
    }

    /// Convert bytes the caller already holds; `document_id` is only a label.
    pub async fn convert_bytes(
        &self,
        ctx: &CallContext,
        document_id: &str,
        bytes: Vec<u8>,
    ) -> Result<CombinedResult, Pdf2OcrError> {
        info!("Starting conversion: {} ({} bytes)", document_id, bytes.len());
        self.convert_fetched(ctx, document_id, bytes.into(), Instant::now())
            .await
    }

    async fn convert_fetched(
        &self,
        ctx: &CallContext,
        document_id: &str,
        pdf: Arc<[u8]>,
        started: Instant,
    ) -> Result<CombinedResult, Pdf2OcrError> {
        let (page_images, recognition) = if self.config.overlap_stages {
            // Resolve first so an unknown engine fails before any work starts.
            let engine = self.resolve_engine()?;
            tokio::try_join!(
                self.rasterize(ctx, Arc::clone(&pdf)),
                self.recognise(ctx, engine.as_ref(), &pdf),
            )?
        } else {
            // ── Step 2: Rasterise pages ──────────────────────────────────────
            let page_images = self.rasterize(ctx, Arc::clone(&pdf)).await?;

            // ── Step 3: Resolve engine ───────────────────────────────────────
            let engine = self.resolve_engine()?;

            // ── Step 4: Recognise the whole document ─────────────────────────
            let recognition = self.recognise(ctx, engine.as_ref(), &pdf).await?;
            (page_images, recognition)
        };

        // ── Step 5: Assemble ─────────────────────────────────────────────────
        let result = CombinedResult {
            document_id: document_id.to_string(),
            recognized_text: recognition.text,
            engine_used: recognition.engine,
            confidence: recognition.confidence,
            processing_time: started.elapsed(),
            page_images,
        };

        info!(
            "Conversion complete: {} pages, {} chars via {} in {}ms",
            result.page_count(),
            result.recognized_text.len(),
            result.engine_used,
            result.processing_time.as_millis()
        );
        Ok(result)
    }

    fn resolve_engine(&self) -> Result<Arc<dyn RecognitionEngine>, Pdf2OcrError> {
        self.registry.get(&self.config.remote_engine)
    }

    async fn rasterize(
        &self,
        ctx: &CallContext,
        pdf: Arc<[u8]>,
    ) -> Result<Vec<PageImage>, Pdf2OcrError> {
        let render_start = Instant::now();
        let images = ctx
            .run(self.rasterizer.render(pdf, self.config.dpi))
            .await?;
        if images.is_empty() {
            return Err(Pdf2OcrError::Decode {
                detail: "document has no pages".into(),
            });
        }
        info!(
            "Rendered {} pages at {} DPI in {}ms",
            images.len(),
            self.config.dpi,
            render_start.elapsed().as_millis()
        );
        Ok(images)
    }

    async fn recognise(
        &self,
        ctx: &CallContext,
        engine: &dyn RecognitionEngine,
        pdf: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        let ocr_start = Instant::now();
        let result = ctx.run(engine.process_pdf(ctx, pdf)).await?;
        info!(
            "Engine '{}' finished in {}ms (confidence {:.2})",
            result.engine,
            ocr_start.elapsed().as_millis(),
            result.confidence
        );
        Ok(result)
    }
}
