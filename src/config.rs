//! Configuration types for PDF-to-OCR conversion.
//!
//! Two structs cover the two halves of the pipeline:
//!
//! * [`ConversionConfig`]: local behaviour: rendering DPI, pixel cap, which
//!   registry key names the remote engine, whether stages overlap.
//! * [`MathpixConfig`]: the remote recognition service: credentials,
//!   endpoint, polling interval and the absolute job budget.
//!
//! Both are built via builders that clamp obviously-wrong values and
//! validate the rest in `build()`.

use crate::error::Pdf2OcrError;
use std::fmt;
use std::time::Duration;

/// DPI used when the caller supplies none (or a non-positive one).
pub const DEFAULT_DPI: u32 = 150;

/// Registry key of the remote-capable engine the orchestrator asks for.
pub const DEFAULT_REMOTE_ENGINE: &str = "mathpix";

/// Resolve a caller-supplied DPI, substituting [`DEFAULT_DPI`] when it is
/// unset or non-positive.
pub fn effective_dpi(requested: Option<i64>) -> u32 {
    match requested {
        Some(d) if d > 0 => u32::try_from(d).unwrap_or(u32::MAX),
        _ => DEFAULT_DPI,
    }
}

/// Configuration for a conversion.
///
/// # Example
/// ```rust
/// use edgequake_pdf2ocr::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .dpi(200)
///     .remote_engine("mathpix")
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 200);
/// ```
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    /// Rendering DPI. Default: 150.
    ///
    /// 150 DPI keeps body text legible for a VLM while page PNGs stay well
    /// under typical attachment limits.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 2500.
    ///
    /// Caps oversized pages (posters, drawings) independently of DPI.
    pub max_rendered_pixels: u32,

    /// Registry key of the engine that receives the whole PDF. Default: "mathpix".
    pub remote_engine: String,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Run rasterisation and the remote job concurrently. Default: false.
    ///
    /// The two stages are independent; overlapping them hides rendering time
    /// behind the polling wait. The conversion still completes only once
    /// both are done.
    pub overlap_stages: bool,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            max_rendered_pixels: 2500,
            remote_engine: DEFAULT_REMOTE_ENGINE.to_string(),
            password: None,
            overlap_stages: false,
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn remote_engine(mut self, name: impl Into<String>) -> Self {
        self.config.remote_engine = name.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn overlap_stages(mut self, v: bool) -> Self {
        self.config.overlap_stages = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2OcrError> {
        let c = &self.config;
        if c.dpi == 0 || c.dpi > 1200 {
            return Err(Pdf2OcrError::InvalidConfig(format!(
                "DPI must be 1–1200, got {}",
                c.dpi
            )));
        }
        if c.remote_engine.trim().is_empty() {
            return Err(Pdf2OcrError::InvalidConfig(
                "remote engine name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Mathpix ──────────────────────────────────────────────────────────────

/// Connection and protocol settings for the Mathpix recognition service.
#[derive(Clone)]
pub struct MathpixConfig {
    /// Application identifier, sent as the `app_id` header.
    pub app_id: String,

    /// Secret key, sent as the `app_key` header. Redacted in `Debug`.
    pub app_key: String,

    /// API root. Default: `https://api.mathpix.com`.
    pub base_url: String,

    /// Delay between status polls. Default: 5 s.
    pub poll_interval: Duration,

    /// Absolute budget from accepted submission to terminal state. Default: 5 min.
    pub job_timeout: Duration,

    /// Timeout for each individual HTTP request. Default: 60 s.
    pub request_timeout: Duration,

    /// Extension of the result document fetched on completion. Default: "md".
    pub result_format: String,

    /// Fail on poll statuses outside processing/completed/error. Default: false.
    ///
    /// Mathpix reports intermediate states ("received", "loaded", "split")
    /// before "processing", so the tolerant default keeps waiting on them.
    pub strict_status: bool,
}

impl Default for MathpixConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_key: String::new(),
            base_url: "https://api.mathpix.com".to_string(),
            poll_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(300),
            request_timeout: Duration::from_secs(60),
            result_format: "md".to_string(),
            strict_status: false,
        }
    }
}

impl fmt::Debug for MathpixConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MathpixConfig")
            .field("app_id", &self.app_id)
            .field("app_key", &if self.app_key.is_empty() { "" } else { "<redacted>" })
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("job_timeout", &self.job_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("result_format", &self.result_format)
            .field("strict_status", &self.strict_status)
            .finish()
    }
}

impl MathpixConfig {
    pub fn builder() -> MathpixConfigBuilder {
        MathpixConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read credentials from `MATHPIX_APP_ID` / `MATHPIX_APP_KEY`
    /// (and optionally `MATHPIX_BASE_URL`).
    ///
    /// Returns `None` when either credential is missing or empty.
    pub fn from_env() -> Option<Self> {
        let app_id = std::env::var("MATHPIX_APP_ID").ok().filter(|s| !s.is_empty())?;
        let app_key = std::env::var("MATHPIX_APP_KEY").ok().filter(|s| !s.is_empty())?;
        let mut builder = Self::builder().credentials(app_id, app_key);
        if let Ok(url) = std::env::var("MATHPIX_BASE_URL") {
            if !url.is_empty() {
                builder = builder.base_url(url);
            }
        }
        builder.build().ok()
    }

    /// Job endpoint, e.g. `https://api.mathpix.com/v3/pdf`.
    pub fn pdf_endpoint(&self) -> String {
        format!("{}/v3/pdf", self.base_url.trim_end_matches('/'))
    }

    /// Single-image endpoint, e.g. `https://api.mathpix.com/v3/text`.
    pub fn text_endpoint(&self) -> String {
        format!("{}/v3/text", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`MathpixConfig`].
#[derive(Debug)]
pub struct MathpixConfigBuilder {
    config: MathpixConfig,
}

impl MathpixConfigBuilder {
    pub fn credentials(mut self, app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
        self.config.app_id = app_id.into();
        self.config.app_key = app_key.into();
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.config.poll_interval = d;
        self
    }

    pub fn job_timeout(mut self, d: Duration) -> Self {
        self.config.job_timeout = d;
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.config.request_timeout = d;
        self
    }

    pub fn result_format(mut self, ext: impl Into<String>) -> Self {
        self.config.result_format = ext.into().trim_start_matches('.').to_string();
        self
    }

    pub fn strict_status(mut self, v: bool) -> Self {
        self.config.strict_status = v;
        self
    }

    pub fn build(self) -> Result<MathpixConfig, Pdf2OcrError> {
        let c = &self.config;
        if c.app_id.is_empty() || c.app_key.is_empty() {
            return Err(Pdf2OcrError::InvalidConfig(
                "Mathpix app_id and app_key are both required".into(),
            ));
        }
        if c.poll_interval.is_zero() {
            return Err(Pdf2OcrError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if c.job_timeout < c.poll_interval {
            return Err(Pdf2OcrError::InvalidConfig(format!(
                "job timeout ({:?}) is shorter than the poll interval ({:?})",
                c.job_timeout, c.poll_interval
            )));
        }
        if !c.base_url.starts_with("http://") && !c.base_url.starts_with("https://") {
            return Err(Pdf2OcrError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        Ok(self.config)
    }
}
