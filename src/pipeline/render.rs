//! PDF rasterisation: render every page of an in-memory PDF to PNG via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is CPU-bound. `tokio::task::spawn_blocking` moves the work onto
//! the blocking pool so Tokio worker threads (and the polling loop of a
//! concurrent remote job) never stall during rendering.
//!
//! ## All or nothing
//!
//! Pages are rendered and encoded strictly in document order. The first page
//! that fails aborts the call; a partial image set is never returned.

use crate::config::ConversionConfig;
use crate::error::Pdf2OcrError;
use crate::output::{DocumentMetadata, PageImage};
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Renders a PDF into one PNG page image per page.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Render every page at `dpi`, in page order.
    async fn render(&self, pdf: Arc<[u8]>, dpi: u32) -> Result<Vec<PageImage>, Pdf2OcrError>;
}

/// pdfium-backed [`PageRasterizer`].
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: Option<u32>,
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take pixel cap and password from a [`ConversionConfig`].
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            max_rendered_pixels: Some(config.max_rendered_pixels),
            password: config.password.clone(),
            library_path: None,
        }
    }

    /// Bind to a specific pdfium library instead of `PDFIUM_LIB_PATH` / system.
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }
}

#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    async fn render(&self, pdf: Arc<[u8]>, dpi: u32) -> Result<Vec<PageImage>, Pdf2OcrError> {
        ensure_pdf_magic(&pdf)?;
        if dpi == 0 {
            return Err(Pdf2OcrError::InvalidConfig("DPI must be positive".into()));
        }
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.render_blocking(&pdf, dpi))
            .await
            .map_err(|e| Pdf2OcrError::Internal(format!("Render task panicked: {}", e)))?
    }
}

impl PdfiumRasterizer {
    fn render_blocking(&self, pdf: &[u8], dpi: u32) -> Result<Vec<PageImage>, Pdf2OcrError> {
        let pdfium = bind_pdfium(self.library_path.as_ref())?;
        let document = load_document(&pdfium, pdf, self.password.as_deref())?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages, rendering at {} DPI", total_pages, dpi);

        let mut render_config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / 72.0);
        if let Some(max) = self.max_rendered_pixels {
            render_config = render_config
                .set_maximum_width(max as i32)
                .set_maximum_height(max as i32);
        }

        let mut images = Vec::with_capacity(total_pages);
        for idx in 0..total_pages {
            let page = pages.get(idx as u16).map_err(|e| Pdf2OcrError::Encode {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?;

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| Pdf2OcrError::Encode {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let image = bitmap.as_image();
            let png = encode_png(&image).map_err(|e| Pdf2OcrError::Encode {
                page: idx + 1,
                detail: e.to_string(),
            })?;
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );

            images.push(PageImage {
                index: idx,
                width: image.width(),
                height: image.height(),
                png,
            });
        }

        Ok(images)
    }
}

/// Extract document metadata without rendering pages.
pub async fn inspect(pdf: Arc<[u8]>, password: Option<&str>) -> Result<DocumentMetadata, Pdf2OcrError> {
    ensure_pdf_magic(&pdf)?;
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || -> Result<DocumentMetadata, Pdf2OcrError> {
        let pdfium = bind_pdfium(None)?;
        let document = load_document(&pdfium, &pdf, pwd.as_deref())?;
        let metadata = document.metadata();

        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata.get(tag).and_then(|t| {
                let v = t.value().to_string();
                if v.is_empty() {
                    None
                } else {
                    Some(v)
                }
            })
        };

        Ok(DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            page_count: document.pages().len() as usize,
            pdf_version: format!("{:?}", document.version()),
        })
    })
    .await
    .map_err(|e| Pdf2OcrError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Reject input that does not start with the `%PDF` header.
///
/// Checked before pdfium is bound so bad input is reported as
/// [`Pdf2OcrError::Decode`] even where no pdfium library is installed.
pub fn ensure_pdf_magic(bytes: &[u8]) -> Result<(), Pdf2OcrError> {
    if bytes.len() < 5 || &bytes[..4] != b"%PDF" {
        let head: String = bytes
            .iter()
            .take(8)
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        return Err(Pdf2OcrError::Decode {
            detail: format!("missing %PDF header (first bytes: {head:?})"),
        });
    }
    Ok(())
}

/// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the system library.
pub fn bind_pdfium(explicit: Option<&PathBuf>) -> Result<Pdfium, Pdf2OcrError> {
    let from_env = std::env::var("PDFIUM_LIB_PATH")
        .ok()
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    let bindings = match explicit.cloned().or(from_env) {
        Some(path) => {
            debug!("Binding pdfium from {}", path.display());
            Pdfium::bind_to_library(&path)
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2OcrError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Pdf2OcrError> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                Pdf2OcrError::WrongPassword
            } else {
                Pdf2OcrError::PasswordRequired
            }
        } else {
            Pdf2OcrError::Decode { detail: err_str }
        }
    })
}
