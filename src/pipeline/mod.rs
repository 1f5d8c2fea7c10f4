//! Local image stages of a conversion.
//!
//! ```text
//! render ──▶ encode
//! (pdfium)   (PNG / base64)
//! ```
//!
//! 1. [`render`]: rasterise every page; runs in `spawn_blocking` because
//!    pdfium is not async-safe
//! 2. [`encode`]: PNG-encode each page and wrap it in standard base64 for
//!    transport

pub mod encode;
pub mod render;
