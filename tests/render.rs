//! Rasteriser tests.
//!
//! Tests that need pdfium skip themselves when the library cannot be bound.
//! Point `PDFIUM_LIB_PATH` at a libpdfium to run them:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib/libpdfium.so cargo test --test render -- --nocapture

use edgequake_pdf2ocr::pipeline::render::bind_pdfium;
use edgequake_pdf2ocr::{inspect, PageRasterizer, Pdf2OcrError, PdfiumRasterizer};
use std::sync::Arc;

/// Skip this test if pdfium is not available on this machine.
macro_rules! skip_unless_pdfium {
    () => {{
        if let Err(e) = bind_pdfium(None) {
            println!("SKIP — pdfium not available: {e}");
            return;
        }
    }};
}

/// Minimal uncompressed PDF with `pages` blank pages of 200x300 pt.
fn blank_pdf(pages: usize) -> Vec<u8> {
    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 200 300] >>".to_string());
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

#[tokio::test]
async fn not_a_pdf_is_a_decode_error() {
    let err = PdfiumRasterizer::new()
        .render(Arc::from(&b"not a pdf"[..]), 150)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::Decode { .. }));
}

#[tokio::test]
async fn empty_input_is_a_decode_error() {
    let err = PdfiumRasterizer::new()
        .render(Arc::from(Vec::new()), 150)
        .await
        .unwrap_err();
    assert!(matches!(err, Pdf2OcrError::Decode { .. }));
}

#[tokio::test]
async fn three_pages_render_in_order_as_png() {
    skip_unless_pdfium!();

    let images = PdfiumRasterizer::new()
        .render(blank_pdf(3).into(), 150)
        .await
        .unwrap();

    assert_eq!(images.len(), 3);
    for (i, page) in images.iter().enumerate() {
        assert_eq!(page.index, i);
        assert!(page.png.starts_with(b"\x89PNG\r\n\x1a\n"));
        let decoded = image::load_from_memory(&page.png).unwrap();
        assert_eq!(decoded.width(), page.width);
        assert_eq!(decoded.height(), page.height);
    }
    // 200x300 pt at 150 DPI, allowing for rounding.
    let first = &images[0];
    assert!((415..=418).contains(&first.width), "width {}", first.width);
    assert!((623..=626).contains(&first.height), "height {}", first.height);
}

#[tokio::test]
async fn pixel_cap_limits_large_renders() {
    skip_unless_pdfium!();

    let config = edgequake_pdf2ocr::ConversionConfig::builder()
        .max_rendered_pixels(100)
        .build()
        .unwrap();
    let images = PdfiumRasterizer::from_config(&config)
        .render(blank_pdf(1).into(), 600)
        .await
        .unwrap();
    assert!(images[0].width <= 100 && images[0].height <= 100);
}

#[tokio::test]
async fn inspect_reports_page_count() {
    skip_unless_pdfium!();

    let meta = inspect(blank_pdf(3).into(), None).await.unwrap();
    assert_eq!(meta.page_count, 3);
}
