//! Recognition engines: the OCR capability behind the conversion pipeline.
//!
//! [`RecognitionEngine`] is the seam. Two independent implementations exist:
//!
//! * [`mathpix::MathpixEngine`]: remote, drives the submit/poll/fetch job
//!   protocol in [`job`] for whole PDFs and calls `v3/text` for images.
//! * [`mock::MockEngine`]: in-process stand-in with deterministic output,
//!   used in tests and as an offline fallback.
//!
//! Engines are held as `Arc<dyn RecognitionEngine>` inside an
//! [`registry::EngineRegistry`], so the orchestrator never knows which one
//! it is talking to.

pub mod job;
pub mod mathpix;
pub mod mock;
pub mod registry;

use crate::context::CallContext;
use crate::error::Pdf2OcrError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Text-recognition capability.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Plain-text extraction from a single encoded image.
    async fn extract_text(
        &self,
        ctx: &CallContext,
        image: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError>;

    /// Block, table and layout extraction from a single encoded image.
    ///
    /// `hint` may tune the request but never changes what is correct.
    async fn extract_structured_text(
        &self,
        ctx: &CallContext,
        image: &[u8],
        hint: DocumentType,
    ) -> Result<StructuredRecognitionResult, Pdf2OcrError>;

    /// Whole-document extraction.
    async fn process_pdf(
        &self,
        ctx: &CallContext,
        pdf: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError>;

    /// Static self-description. No I/O.
    fn info(&self) -> EngineInfo;
}

/// Static descriptor of an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub supported_languages: Vec<String>,
    pub features: Vec<String>,
    pub is_local: bool,
    pub requires_auth: bool,
}

/// Output of a text recognition call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub text: String,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub language: String,
    pub engine: String,
    pub processing_time: Duration,
}

impl RecognitionResult {
    /// Build a result, clamping `confidence` into `[0, 1]` (NaN becomes 0).
    pub fn new(
        text: impl Into<String>,
        confidence: f32,
        language: impl Into<String>,
        engine: impl Into<String>,
        processing_time: Duration,
    ) -> Self {
        Self {
            text: text.into(),
            confidence: clamp_confidence(confidence),
            language: language.into(),
            engine: engine.into(),
            processing_time,
        }
    }
}

pub(crate) fn clamp_confidence(c: f32) -> f32 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}

/// Recognition output with block, table and layout structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecognitionResult {
    #[serde(flatten)]
    pub base: RecognitionResult,
    pub blocks: Vec<TextBlock>,
    pub tables: Vec<Table>,
    pub layout: Option<LayoutInfo>,
}

impl StructuredRecognitionResult {
    /// True when every block's box lies inside the page (vacuously true
    /// without layout).
    pub fn blocks_within_page(&self) -> bool {
        match &self.layout {
            Some(layout) => self.blocks.iter().all(|b| b.bounding_box.fits_within(layout)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub confidence: f32,
    pub bounding_box: BoundingBox,
    pub block_type: BlockType,
}

/// Axis-aligned box in page pixels; `x`/`y` are the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Smallest box containing every point; `None` for no points.
    pub fn from_points(points: &[[f32; 2]]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first[0], first[1], first[0], first[1]);
        for p in &points[1..] {
            min_x = min_x.min(p[0]);
            min_y = min_y.min(p[1]);
            max_x = max_x.max(p[0]);
            max_y = max_y.max(p[1]);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Clip into `[0, page_width) × [0, page_height)`.
    pub fn clip_to(self, layout: &LayoutInfo) -> Self {
        let max_x = (layout.page_width - 1.0).max(0.0);
        let max_y = (layout.page_height - 1.0).max(0.0);
        let x = self.x.clamp(0.0, max_x);
        let y = self.y.clamp(0.0, max_y);
        let right = (self.x + self.width).clamp(x, max_x);
        let bottom = (self.y + self.height).clamp(y, max_y);
        Self {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    pub fn fits_within(&self, layout: &LayoutInfo) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width >= 0.0
            && self.height >= 0.0
            && self.x + self.width < layout.page_width
            && self.y + self.height < layout.page_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Paragraph,
    Heading,
    TableRow,
    Math,
    Title,
    Line,
    Word,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Vec<TableCell>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub text: String,
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub page_width: f32,
    pub page_height: f32,
    pub orientation: Orientation,
    pub column_count: u32,
    pub has_tables: bool,
    pub has_diagrams: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn from_size(width: f32, height: f32) -> Self {
        if width > height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }
}

/// Advisory document category used for engine selection and request tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Typed,
    Handwritten,
    Math,
    Scanned,
    Mixed,
    #[default]
    Unknown,
}

impl DocumentType {
    /// Guess a category from a file name. Purely lexical.
    pub fn guess(file_name: &str) -> Self {
        let lower = file_name.to_lowercase();
        let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has(&["handwrit", "notes", "sketch"]) {
            DocumentType::Handwritten
        } else if has(&["math", "equation", "calculus", "algebra", "arxiv", "proof"]) {
            DocumentType::Math
        } else if has(&["scan", "fax"]) {
            DocumentType::Scanned
        } else if lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
            DocumentType::Scanned
        } else if lower.ends_with(".pdf") || lower.ends_with(".txt") || lower.ends_with(".md") {
            DocumentType::Typed
        } else {
            DocumentType::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Typed => "typed",
            DocumentType::Handwritten => "handwritten",
            DocumentType::Math => "math",
            DocumentType::Scanned => "scanned",
            DocumentType::Mixed => "mixed",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl From<&str> for DocumentType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "typed" | "printed" | "text" => DocumentType::Typed,
            "handwritten" | "handwriting" => DocumentType::Handwritten,
            "math" | "mathematical" | "equations" => DocumentType::Math,
            "scanned" | "scan" => DocumentType::Scanned,
            "mixed" => DocumentType::Mixed,
            _ => DocumentType::Unknown,
        }
    }
}

impl FromStr for DocumentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(DocumentType::from(s))
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
