//! In-process stand-in engine.
//!
//! Returns deterministic placeholder output with a fixed confidence and never
//! touches the network. Used by tests and as the offline fallback when no
//! remote credentials are configured.

use crate::context::CallContext;
use crate::engine::{
    BlockType, BoundingBox, DocumentType, EngineInfo, LayoutInfo, Orientation, RecognitionEngine,
    RecognitionResult, StructuredRecognitionResult, TextBlock,
};
use crate::error::Pdf2OcrError;
use async_trait::async_trait;
use std::time::Duration;

/// Registry key and engine name.
pub const MOCK_ENGINE: &str = "mock";

/// Confidence reported by every mock result.
pub const MOCK_CONFIDENCE: f32 = 0.95;

/// US-letter page in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;

#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    name: Option<String>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock registered under another name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(MOCK_ENGINE)
    }

    fn result(&self, text: String) -> RecognitionResult {
        RecognitionResult::new(text, MOCK_CONFIDENCE, "en", self.name(), Duration::ZERO)
    }
}

#[async_trait]
impl RecognitionEngine for MockEngine {
    async fn extract_text(
        &self,
        ctx: &CallContext,
        image: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        ctx.check()?;
        Ok(self.result(format!(
            "Mock OCR text extracted from image ({} bytes)",
            image.len()
        )))
    }

    async fn extract_structured_text(
        &self,
        ctx: &CallContext,
        image: &[u8],
        hint: DocumentType,
    ) -> Result<StructuredRecognitionResult, Pdf2OcrError> {
        ctx.check()?;
        let text = format!(
            "Mock structured OCR text ({} document, {} bytes)",
            hint,
            image.len()
        );
        let block = TextBlock {
            text: text.clone(),
            confidence: MOCK_CONFIDENCE,
            bounding_box: BoundingBox {
                x: 72.0,
                y: 72.0,
                width: PAGE_WIDTH - 144.0,
                height: 24.0,
            },
            block_type: BlockType::Paragraph,
        };
        Ok(StructuredRecognitionResult {
            base: self.result(text),
            blocks: vec![block],
            tables: Vec::new(),
            layout: Some(LayoutInfo {
                page_width: PAGE_WIDTH,
                page_height: PAGE_HEIGHT,
                orientation: Orientation::Portrait,
                column_count: 1,
                has_tables: false,
                has_diagrams: false,
            }),
        })
    }

    async fn process_pdf(
        &self,
        ctx: &CallContext,
        pdf: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        ctx.check()?;
        Ok(self.result(format!(
            "Mock OCR text extracted from PDF ({} bytes)",
            pdf.len()
        )))
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            name: self.name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            supported_languages: vec!["en".to_string()],
            features: vec!["text".into(), "structured".into(), "pdf".into()],
            is_local: true,
            requires_auth: false,
        }
    }
}
