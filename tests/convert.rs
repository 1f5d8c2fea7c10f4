//! Orchestrator tests with an in-memory source and a fake rasteriser.

use async_trait::async_trait;
use base64::Engine as _;
use edgequake_pdf2ocr::engine::job::{JobTransport, PollStatus};
use edgequake_pdf2ocr::pipeline::encode::encode_png;
use edgequake_pdf2ocr::{
    CallContext, ContentBlock, ConversionConfig, Converter, EngineRegistry, LocalSource,
    MathpixConfig, MathpixEngine, MemorySource, MockEngine, PageImage, PageRasterizer,
    Pdf2OcrError,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Produces `pages` real PNGs of distinct sizes, one per page.
struct FakeRasterizer {
    pages: usize,
    calls: AtomicUsize,
}

impl FakeRasterizer {
    fn new(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PageRasterizer for FakeRasterizer {
    async fn render(&self, pdf: Arc<[u8]>, _dpi: u32) -> Result<Vec<PageImage>, Pdf2OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !pdf.starts_with(b"%PDF") {
            return Err(Pdf2OcrError::Decode {
                detail: "missing %PDF header".into(),
            });
        }
        (0..self.pages)
            .map(|index| {
                let width = 8 + index as u32;
                let img = image::DynamicImage::new_rgb8(width, 11);
                let png = encode_png(&img).map_err(|e| Pdf2OcrError::Encode {
                    page: index + 1,
                    detail: e.to_string(),
                })?;
                Ok(PageImage {
                    index,
                    width,
                    height: 11,
                    png,
                })
            })
            .collect()
    }
}

struct RejectingTransport;

#[async_trait]
impl JobTransport for RejectingTransport {
    async fn submit(&self, _file_name: &str, _pdf: &[u8]) -> Result<String, Pdf2OcrError> {
        Err(Pdf2OcrError::Submission {
            detail: "HTTP 401: invalid credentials".into(),
        })
    }

    async fn status(&self, _job_id: &str) -> Result<PollStatus, Pdf2OcrError> {
        unreachable!("rejected jobs are never polled")
    }

    async fn fetch(&self, _job_id: &str) -> Result<String, Pdf2OcrError> {
        unreachable!("rejected jobs are never fetched")
    }
}

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF";

fn source() -> Arc<MemorySource> {
    Arc::new(
        MemorySource::new()
            .with_document("paper", "paper.pdf", PDF.to_vec())
            .with_document("junk", "junk.pdf", b"not a pdf".to_vec()),
    )
}

/// Mock registered under the key the orchestrator asks for.
fn registry() -> Arc<EngineRegistry> {
    Arc::new(
        EngineRegistry::builder()
            .register("mathpix", Arc::new(MockEngine::named("mathpix")))
            .build(),
    )
}

fn converter(rasterizer: Arc<FakeRasterizer>, overlap: bool) -> Converter {
    let config = ConversionConfig::builder()
        .overlap_stages(overlap)
        .build()
        .unwrap();
    Converter::new(source(), registry(), config).with_rasterizer(rasterizer)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_document_yields_ordered_images_and_text() {
    let result = converter(FakeRasterizer::new(3), false)
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap();

    assert_eq!(result.document_id, "paper");
    assert_eq!(result.page_count(), 3);
    let order: Vec<_> = result.page_images.iter().map(|p| p.page_num()).collect();
    assert_eq!(order, vec![1, 2, 3]);
    assert_eq!(result.engine_used, "mathpix");
    assert!((0.0..=1.0).contains(&result.confidence));
    assert!(result
        .recognized_text
        .contains(&format!("{} bytes", PDF.len())));
}

#[tokio::test]
async fn overlapped_stages_produce_the_same_result() {
    let sequential = converter(FakeRasterizer::new(2), false)
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap();
    let overlapped = converter(FakeRasterizer::new(2), true)
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap();
    assert_eq!(sequential.recognized_text, overlapped.recognized_text);
    assert_eq!(sequential.page_images, overlapped.page_images);
}

#[tokio::test]
async fn unknown_document_is_not_found() {
    let rasterizer = FakeRasterizer::new(1);
    let err = converter(rasterizer.clone(), false)
        .convert(&CallContext::new(), "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::NotFound { ref id } if id == "missing"));
    assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn undecodable_bytes_fail_the_conversion() {
    let err = converter(FakeRasterizer::new(1), false)
        .convert(&CallContext::new(), "junk")
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::Decode { .. }));
}

#[tokio::test]
async fn zero_page_render_is_a_decode_error() {
    let err = converter(FakeRasterizer::new(0), false)
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::Decode { .. }));
}

#[tokio::test]
async fn missing_remote_engine_is_unavailable() {
    let only_mock = Arc::new(
        EngineRegistry::builder()
            .register("mock", Arc::new(MockEngine::new()))
            .build(),
    );
    let converter = Converter::new(source(), only_mock, ConversionConfig::default())
        .with_rasterizer(FakeRasterizer::new(1));

    let err = converter
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::EngineUnavailable { ref name, .. } if name == "mathpix"));
}

#[tokio::test]
async fn engine_failure_discards_rendered_pages() {
    let config = MathpixConfig::builder()
        .credentials("id", "bad-key")
        .build()
        .unwrap();
    let engine = MathpixEngine::with_transport(config, Arc::new(RejectingTransport)).unwrap();
    let registry = Arc::new(
        EngineRegistry::builder()
            .register("mathpix", Arc::new(engine))
            .build(),
    );
    let converter = Converter::new(source(), registry, ConversionConfig::default())
        .with_rasterizer(FakeRasterizer::new(2));

    let err = converter
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::Submission { .. }));
}

#[tokio::test]
async fn content_blocks_honour_the_base64_contract() {
    let result = converter(FakeRasterizer::new(3), false)
        .convert(&CallContext::new(), "paper")
        .await
        .unwrap();
    let blocks = result.to_content_blocks().unwrap();
    assert_eq!(blocks.len(), 4);
    assert!(matches!(blocks[0], ContentBlock::Text { .. }));

    let b64 = base64::engine::general_purpose::STANDARD;
    for (block, page) in blocks[1..].iter().zip(&result.page_images) {
        let ContentBlock::Image { data, mime_type } = block else {
            panic!("expected image block, got {block:?}");
        };
        assert_eq!(mime_type, "image/png");
        assert_eq!(data.len() % 4, 0);
        assert!(!data.contains(['\n', '\r', ' ', '\t']));
        let decoded = b64.decode(data).unwrap();
        assert_eq!(decoded, page.png);
        assert_eq!(&b64.encode(&decoded), data);
        assert!(decoded.starts_with(b"\x89PNG\r\n\x1a\n"));
    }

    let json = serde_json::to_value(&blocks[1]).unwrap();
    assert_eq!(json["type"], "image");
    assert_eq!(json["mimeType"], "image/png");
}

#[tokio::test]
async fn local_source_feeds_the_converter() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("report.pdf"), PDF).unwrap();

    let converter = Converter::new(
        Arc::new(LocalSource::new(dir.path())),
        registry(),
        ConversionConfig::default(),
    )
    .with_rasterizer(FakeRasterizer::new(1));

    let result = converter
        .convert(&CallContext::new(), "report.pdf")
        .await
        .unwrap();
    assert_eq!(result.page_count(), 1);
}

#[tokio::test]
async fn convert_bytes_skips_the_source() {
    let result = converter(FakeRasterizer::new(2), false)
        .convert_bytes(&CallContext::new(), "inline", PDF.to_vec())
        .await
        .unwrap();
    assert_eq!(result.document_id, "inline");
    assert_eq!(result.page_count(), 2);
}
