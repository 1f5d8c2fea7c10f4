//! Conversion output types.
//!
//! [`CombinedResult`] pairs the recognised text with the rendered pages.
//! The pairing is positional only: the text comes from one whole-document
//! OCR job and is not split per page. Reconciling text with individual
//! pages is left to the downstream LLM.

use crate::error::Pdf2OcrError;
use crate::pipeline::encode::{check_base64_payload, to_base64, PNG_MIME};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One rendered page, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// 0-based page index in document order.
    pub index: usize,
    pub width: u32,
    pub height: u32,
    /// PNG-encoded pixels.
    #[serde(skip)]
    pub png: Vec<u8>,
}

impl PageImage {
    /// 1-based page number.
    pub fn page_num(&self) -> usize {
        self.index + 1
    }

    pub fn mime_type(&self) -> &'static str {
        PNG_MIME
    }

    /// Base64 payload for transport (standard alphabet, padded, unwrapped).
    pub fn to_base64(&self) -> String {
        to_base64(&self.png)
    }
}

/// Document-level metadata read without rendering.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Result of one conversion: recognised text plus every page image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedResult {
    pub document_id: String,
    pub recognized_text: String,
    pub engine_used: String,
    pub confidence: f32,
    pub processing_time: Duration,
    pub page_images: Vec<PageImage>,
}

/// One block of a tool response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl CombinedResult {
    pub fn page_count(&self) -> usize {
        self.page_images.len()
    }

    /// Render as a tool response: one text block, then one image per page
    /// in page order. Every image payload is checked against the base64
    /// transport contract.
    pub fn to_content_blocks(&self) -> Result<Vec<ContentBlock>, Pdf2OcrError> {
        let mut blocks = Vec::with_capacity(self.page_images.len() + 1);
        blocks.push(ContentBlock::Text {
            text: self.summary_text(),
        });
        for page in &self.page_images {
            let data = page.to_base64();
            check_base64_payload(&data).map_err(|e| {
                Pdf2OcrError::Internal(format!("page {}: {e}", page.page_num()))
            })?;
            blocks.push(ContentBlock::Image {
                data,
                mime_type: page.mime_type().to_string(),
            });
        }
        Ok(blocks)
    }

    fn summary_text(&self) -> String {
        format!(
            "OCR text ({engine}, confidence {conf:.2}, {pages} page images attached):\n\n{text}",
            engine = self.engine_used,
            conf = self.confidence,
            pages = self.page_images.len(),
            text = self.recognized_text,
        )
    }
}
