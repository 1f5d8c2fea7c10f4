//! Mathpix-backed recognition engine.
//!
//! * Whole PDFs go through the asynchronous job API (`v3/pdf`), driven by
//!   [`JobDriver`]: multipart upload, status polling, result download.
//! * Single images go through the synchronous `v3/text` API with the image
//!   inlined as a base64 data URI.
//!
//! Every request carries the `app_id` / `app_key` headers.

use crate::config::MathpixConfig;
use crate::context::CallContext;
use crate::engine::job::{
    JobDriver, JobPolicy, JobTransport, NoopObserver, PollStatus, SharedObserver,
};
use crate::engine::{
    clamp_confidence, BlockType, BoundingBox, DocumentType, EngineInfo, LayoutInfo, Orientation,
    RecognitionEngine, RecognitionResult, StructuredRecognitionResult, Table, TableCell,
    TextBlock,
};
use crate::error::Pdf2OcrError;
use crate::pipeline::encode::to_base64;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Registry key and engine name.
pub const MATHPIX_ENGINE: &str = "mathpix";

/// The PDF API reports no confidence score; results carry this nominal value.
pub const PDF_RESULT_CONFIDENCE: f32 = 0.9;

/// The PDF API reports no language either; results carry this one.
pub const PDF_RESULT_LANGUAGE: &str = "en";

/// Multipart file name sent with every PDF upload. The service only uses it
/// for display, and callers hand over bytes, not paths.
pub const PDF_UPLOAD_NAME: &str = "document.pdf";

/// Longest response body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 300;

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SubmitBody {
    pdf_id: Option<String>,
    job_id: Option<String>,
    error: Option<String>,
    error_info: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TextBody {
    #[serde(default)]
    text: String,
    confidence: Option<f32>,
    confidence_rate: Option<f32>,
    error: Option<String>,
    error_info: Option<serde_json::Value>,
    image_width: Option<f32>,
    image_height: Option<f32>,
    #[serde(default)]
    line_data: Vec<LineData>,
    #[serde(default)]
    languages_detected: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LineData {
    #[serde(rename = "type", default)]
    kind: String,
    subtype: Option<String>,
    #[serde(default)]
    cnt: Vec<[f32; 2]>,
    #[serde(default)]
    text: String,
    confidence: Option<f32>,
    #[serde(default = "default_true")]
    included: bool,
}

fn default_true() -> bool {
    true
}

/// Interpret the response to a job submission.
///
/// Non-success status, an `error` field, or a missing id are all
/// [`Pdf2OcrError::Submission`]; these are configuration, auth or input
/// problems and are never retried.
pub fn parse_submit_response(status: u16, body: &str) -> Result<String, Pdf2OcrError> {
    if !(200..300).contains(&status) {
        return Err(Pdf2OcrError::Submission {
            detail: format!("HTTP {status}: {}", excerpt(body)),
        });
    }
    let parsed: SubmitBody = serde_json::from_str(body).map_err(|e| Pdf2OcrError::Submission {
        detail: format!("unparseable response ({e}): {}", excerpt(body)),
    })?;
    if let Some(err) = parsed.error {
        let info = parsed
            .error_info
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        return Err(Pdf2OcrError::Submission {
            detail: format!("{err}{info}"),
        });
    }
    parsed
        .pdf_id
        .or(parsed.job_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Pdf2OcrError::Submission {
            detail: "response carried no job id".into(),
        })
}

/// Interpret a status poll body.
pub fn parse_status_response(body: &str) -> Result<PollStatus, Pdf2OcrError> {
    let parsed: StatusBody = serde_json::from_str(body).map_err(|e| {
        Pdf2OcrError::Internal(format!("unparseable status response ({e}): {}", excerpt(body)))
    })?;
    let status = parsed.status.unwrap_or_default();
    Ok(PollStatus::parse(&status, parsed.error))
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

fn build_client(config: &MathpixConfig) -> Result<reqwest::Client, Pdf2OcrError> {
    let mut headers = HeaderMap::new();
    let header = |v: &str, name: &str| {
        HeaderValue::from_str(v)
            .map_err(|_| Pdf2OcrError::InvalidConfig(format!("{name} is not a valid header value")))
    };
    headers.insert("app_id", header(&config.app_id, "app_id")?);
    let mut key = header(&config.app_key, "app_key")?;
    key.set_sensitive(true);
    headers.insert("app_key", key);

    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| Pdf2OcrError::InvalidConfig(format!("HTTP client: {e}")))
}

fn http_error(url: &str, e: reqwest::Error) -> Pdf2OcrError {
    Pdf2OcrError::Http {
        url: url.to_string(),
        detail: e.to_string(),
    }
}

// ── Transport ────────────────────────────────────────────────────────────

/// reqwest implementation of the Mathpix `v3/pdf` job protocol.
pub struct HttpJobTransport {
    client: reqwest::Client,
    config: MathpixConfig,
}

impl HttpJobTransport {
    pub fn new(config: MathpixConfig) -> Result<Self, Pdf2OcrError> {
        Ok(Self {
            client: build_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl JobTransport for HttpJobTransport {
    async fn submit(&self, file_name: &str, pdf: &[u8]) -> Result<String, Pdf2OcrError> {
        let url = self.config.pdf_endpoint();
        let part = Part::bytes(pdf.to_vec())
            .file_name(file_name.to_string())
            .mime_str("application/pdf")
            .map_err(|e| Pdf2OcrError::Internal(e.to_string()))?;
        let mut form = Form::new().part("file", part);
        if self.config.result_format != "mmd" {
            let mut formats = serde_json::Map::new();
            formats.insert(self.config.result_format.clone(), json!(true));
            let options = json!({ "conversion_formats": formats });
            form = form.text("options_json", options.to_string());
        }

        debug!("POST {} ({} bytes)", url, pdf.len());
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Pdf2OcrError::Submission {
                detail: e.to_string(),
            })?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| Pdf2OcrError::Submission {
            detail: e.to_string(),
        })?;
        parse_submit_response(status, &body)
    }

    async fn status(&self, job_id: &str) -> Result<PollStatus, Pdf2OcrError> {
        let url = format!("{}/{}", self.config.pdf_endpoint(), job_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| http_error(&url, e))?;
        if !response.status().is_success() {
            return Err(Pdf2OcrError::Http {
                url,
                detail: format!("HTTP {}", response.status()),
            });
        }
        let body = response.text().await.map_err(|e| http_error(&url, e))?;
        parse_status_response(&body)
    }

    async fn fetch(&self, job_id: &str) -> Result<String, Pdf2OcrError> {
        let url = format!(
            "{}/{}.{}",
            self.config.pdf_endpoint(),
            job_id,
            self.config.result_format
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| http_error(&url, e))?;
        if !response.status().is_success() {
            return Err(Pdf2OcrError::Http {
                url,
                detail: format!("HTTP {}", response.status()),
            });
        }
        response.text().await.map_err(|e| http_error(&url, e))
    }
}

// ── Engine ───────────────────────────────────────────────────────────────

/// Remote recognition engine backed by the Mathpix API.
pub struct MathpixEngine {
    config: MathpixConfig,
    client: reqwest::Client,
    transport: Arc<dyn JobTransport>,
    policy: JobPolicy,
    observer: SharedObserver,
}

impl MathpixEngine {
    /// Engine using the HTTP job transport.
    pub fn new(config: MathpixConfig) -> Result<Self, Pdf2OcrError> {
        let transport = Arc::new(HttpJobTransport::new(config.clone())?);
        Self::with_transport(config, transport)
    }

    /// Engine whose PDF jobs go through `transport`.
    pub fn with_transport(
        config: MathpixConfig,
        transport: Arc<dyn JobTransport>,
    ) -> Result<Self, Pdf2OcrError> {
        let policy = JobPolicy {
            poll_interval: config.poll_interval,
            timeout: config.job_timeout,
            strict_status: config.strict_status,
        };
        Ok(Self {
            client: build_client(&config)?,
            config,
            transport,
            policy,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Receive job lifecycle events.
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &JobPolicy {
        &self.policy
    }

    async fn post_text(&self, body: serde_json::Value) -> Result<TextBody, Pdf2OcrError> {
        let url = self.config.text_endpoint();
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(&url, e))?;
        let status = response.status();
        let raw = response.text().await.map_err(|e| http_error(&url, e))?;
        if !status.is_success() {
            return Err(Pdf2OcrError::Submission {
                detail: format!("HTTP {}: {}", status.as_u16(), excerpt(&raw)),
            });
        }
        let parsed: TextBody = serde_json::from_str(&raw).map_err(|e| {
            Pdf2OcrError::Internal(format!("unparseable v3/text response ({e})"))
        })?;
        if let Some(err) = parsed.error.clone() {
            let info = parsed
                .error_info
                .as_ref()
                .map(|v| format!(" ({v})"))
                .unwrap_or_default();
            return Err(Pdf2OcrError::Submission {
                detail: format!("{err}{info}"),
            });
        }
        Ok(parsed)
    }
}

fn image_src(image: &[u8]) -> String {
    let mime = match image {
        [0xFF, 0xD8, ..] => "image/jpeg",
        _ => "image/png",
    };
    format!("data:{mime};base64,{}", to_base64(image))
}

fn body_confidence(body: &TextBody) -> f32 {
    clamp_confidence(body.confidence.or(body.confidence_rate).unwrap_or(0.0))
}

fn body_language(body: &TextBody) -> String {
    body.languages_detected
        .first()
        .cloned()
        .unwrap_or_else(|| "en".to_string())
}

fn block_type(line: &LineData) -> Option<BlockType> {
    match (line.kind.as_str(), line.subtype.as_deref()) {
        ("diagram" | "chart" | "page_info", _) => None,
        (_, Some("title")) => Some(BlockType::Title),
        (_, Some("section_header" | "header")) => Some(BlockType::Heading),
        ("math" | "equation_number", _) => Some(BlockType::Math),
        ("table", _) => Some(BlockType::TableRow),
        _ => Some(BlockType::Line),
    }
}

/// Parse a pipe-delimited table into cells; non-pipe text becomes one cell.
fn parse_table(text: &str) -> Table {
    let mut rows = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with('|') && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')) {
            continue;
        }
        let r = rows.len();
        let cells: Vec<TableCell> = line
            .trim_matches('|')
            .split('|')
            .enumerate()
            .map(|(c, cell)| TableCell {
                text: cell.trim().to_string(),
                row: r,
                col: c,
                row_span: 1,
                col_span: 1,
            })
            .collect();
        rows.push(cells);
    }
    Table { rows }
}

/// Build blocks, tables and layout from `v3/text` line data.
fn structure_from_lines(body: &TextBody) -> (Vec<TextBlock>, Vec<Table>, Option<LayoutInfo>) {
    let layout = match (body.image_width, body.image_height) {
        (Some(w), Some(h)) if w > 0.0 && h > 0.0 => Some(LayoutInfo {
            page_width: w,
            page_height: h,
            orientation: Orientation::from_size(w, h),
            column_count: 1,
            has_tables: body.line_data.iter().any(|l| l.kind == "table"),
            has_diagrams: body
                .line_data
                .iter()
                .any(|l| matches!(l.kind.as_str(), "diagram" | "chart")),
        }),
        _ => None,
    };

    let mut blocks = Vec::new();
    let mut tables = Vec::new();
    for line in body.line_data.iter().filter(|l| l.included) {
        let Some(kind) = block_type(line) else {
            continue;
        };
        let Some(mut bbox) = BoundingBox::from_points(&line.cnt) else {
            continue;
        };
        if let Some(layout) = &layout {
            bbox = bbox.clip_to(layout);
        }
        if kind == BlockType::TableRow {
            tables.push(parse_table(&line.text));
        }
        blocks.push(TextBlock {
            text: line.text.clone(),
            confidence: clamp_confidence(line.confidence.unwrap_or(0.0)),
            bounding_box: bbox,
            block_type: kind,
        });
    }

    let layout = layout.map(|mut l| {
        l.column_count = estimate_columns(&blocks, l.page_width);
        l
    });
    (blocks, tables, layout)
}

/// Two columns when text lines start in both page halves, else one.
fn estimate_columns(blocks: &[TextBlock], page_width: f32) -> u32 {
    let lines = blocks.iter().filter(|b| b.block_type == BlockType::Line);
    let (mut left, mut right) = (0usize, 0usize);
    for b in lines {
        if b.bounding_box.x < page_width * 0.25 {
            left += 1;
        } else if b.bounding_box.x > page_width * 0.5 {
            right += 1;
        }
    }
    if left >= 2 && right >= 2 {
        2
    } else {
        1
    }
}

#[async_trait]
impl RecognitionEngine for MathpixEngine {
    async fn extract_text(
        &self,
        ctx: &CallContext,
        image: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        let start = Instant::now();
        let body = json!({
            "src": image_src(image),
            "formats": ["text"],
            "rm_spaces": true,
        });
        let parsed = ctx.run(self.post_text(body)).await?;
        Ok(RecognitionResult::new(
            parsed.text.clone(),
            body_confidence(&parsed),
            body_language(&parsed),
            MATHPIX_ENGINE,
            start.elapsed(),
        ))
    }

    async fn extract_structured_text(
        &self,
        ctx: &CallContext,
        image: &[u8],
        hint: DocumentType,
    ) -> Result<StructuredRecognitionResult, Pdf2OcrError> {
        let start = Instant::now();
        let mut body = json!({
            "src": image_src(image),
            "formats": ["text", "data"],
            "include_line_data": true,
            "rm_spaces": true,
        });
        if hint == DocumentType::Math {
            body["math_inline_delimiters"] = json!(["$", "$"]);
            body["math_display_delimiters"] = json!(["$$", "$$"]);
        }
        let parsed = ctx.run(self.post_text(body)).await?;
        let (blocks, tables, layout) = structure_from_lines(&parsed);
        debug!(
            "Structured OCR: {} blocks, {} tables (hint: {})",
            blocks.len(),
            tables.len(),
            hint
        );
        Ok(StructuredRecognitionResult {
            base: RecognitionResult::new(
                parsed.text.clone(),
                body_confidence(&parsed),
                body_language(&parsed),
                MATHPIX_ENGINE,
                start.elapsed(),
            ),
            blocks,
            tables,
            layout,
        })
    }

    async fn process_pdf(
        &self,
        ctx: &CallContext,
        pdf: &[u8],
    ) -> Result<RecognitionResult, Pdf2OcrError> {
        let start = Instant::now();
        info!("Submitting {} byte PDF to Mathpix", pdf.len());
        let driver = JobDriver::new(self.transport.as_ref(), &self.policy, self.observer.as_ref());
        let outcome = driver.run(ctx, PDF_UPLOAD_NAME, pdf).await?;
        Ok(RecognitionResult::new(
            outcome.text,
            PDF_RESULT_CONFIDENCE,
            PDF_RESULT_LANGUAGE,
            MATHPIX_ENGINE,
            start.elapsed(),
        ))
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            name: MATHPIX_ENGINE.to_string(),
            version: "v3".to_string(),
            supported_languages: ["en", "de", "fr", "es", "it", "pt", "ru", "zh", "ja", "ko", "hi"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            features: ["text", "structured", "pdf", "math", "tables", "handwriting"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            is_local: false,
            requires_auth: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn policy_follows_config() {
        let config = MathpixConfig::builder()
            .credentials("id", "key")
            .poll_interval(Duration::from_secs(2))
            .job_timeout(Duration::from_secs(30))
            .strict_status(true)
            .build()
            .unwrap();
        let engine = MathpixEngine::new(config).unwrap();
        let policy = engine.policy();
        assert_eq!(policy.poll_interval, Duration::from_secs(2));
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert!(policy.strict_status);
    }

    #[test]
    fn submit_response_with_pdf_id() {
        let id = parse_submit_response(200, r#"{"pdf_id":"2025_01_01_abc"}"#).unwrap();
        assert_eq!(id, "2025_01_01_abc");
    }

    #[test]
    fn submit_response_with_job_id() {
        let id = parse_submit_response(200, r#"{"job_id":"j-1"}"#).unwrap();
        assert_eq!(id, "j-1");
    }

    #[test]
    fn submit_error_field_is_submission_error() {
        let err = parse_submit_response(
            200,
            r#"{"error":"Invalid credentials","error_info":{"id":"http_unauthorized"}}"#,
        )
        .unwrap_err();
        match err {
            Pdf2OcrError::Submission { detail } => {
                assert!(detail.contains("Invalid credentials"));
                assert!(detail.contains("http_unauthorized"));
            }
            other => panic!("expected Submission, got {other:?}"),
        }
    }

    #[test]
    fn submit_http_failure_is_submission_error() {
        let err = parse_submit_response(401, "unauthorized").unwrap_err();
        assert!(matches!(err, Pdf2OcrError::Submission { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn submit_without_id_is_submission_error() {
        assert!(matches!(
            parse_submit_response(200, "{}"),
            Err(Pdf2OcrError::Submission { .. })
        ));
    }

    #[test]
    fn status_parsing() {
        assert_eq!(
            parse_status_response(r#"{"status":"processing","percent_done":40}"#).unwrap(),
            PollStatus::Processing
        );
        assert_eq!(
            parse_status_response(r#"{"status":"split"}"#).unwrap(),
            PollStatus::Other("split".into())
        );
        assert!(parse_status_response("<html>").is_err());
    }

    #[test]
    fn excerpt_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let e = excerpt(&long);
        assert!(e.chars().count() <= ERROR_BODY_LIMIT + 1);
        assert!(e.ends_with('…'));
    }

    #[test]
    fn image_src_detects_jpeg() {
        assert!(image_src(&[0xFF, 0xD8, 0xFF]).starts_with("data:image/jpeg;base64,"));
        assert!(image_src(b"\x89PNG").starts_with("data:image/png;base64,"));
    }

    #[test]
    fn line_data_maps_to_clipped_blocks() {
        let body: TextBody = serde_json::from_str(
            r#"{
                "text": "Title\nx^2",
                "confidence": 0.97,
                "image_width": 400,
                "image_height": 300,
                "line_data": [
                    {"type":"text","subtype":"title","cnt":[[10,10],[200,10],[200,40],[10,40]],"text":"Title","confidence":0.99},
                    {"type":"math","cnt":[[20,60],[500,60],[500,90],[20,90]],"text":"x^2","confidence":0.9},
                    {"type":"table","cnt":[[0,100],[300,100],[300,200],[0,200]],"text":"| a | b |\n|---|---|\n| 1 | 2 |"},
                    {"type":"diagram","cnt":[[0,210],[100,210],[100,290],[0,290]],"text":""},
                    {"type":"text","cnt":[[0,0],[1,1]],"text":"hidden","included":false}
                ]
            }"#,
        )
        .unwrap();
        let (blocks, tables, layout) = structure_from_lines(&body);
        let layout = layout.unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].block_type, BlockType::Title);
        assert_eq!(blocks[1].block_type, BlockType::Math);
        assert_eq!(blocks[2].block_type, BlockType::TableRow);
        assert!(blocks.iter().all(|b| b.bounding_box.fits_within(&layout)));
        assert!(layout.has_tables);
        assert!(layout.has_diagrams);
        assert_eq!(layout.orientation, Orientation::Landscape);
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].rows[1][1].text, "2");
    }

    #[test]
    fn info_describes_remote_engine() {
        let config = MathpixConfig::builder()
            .credentials("id", "key")
            .build()
            .unwrap();
        let engine = MathpixEngine::new(config).unwrap();
        let info = engine.info();
        assert_eq!(info.name, "mathpix");
        assert!(!info.is_local);
        assert!(info.requires_auth);
    }
}
