//! Document rendering seam
//!
//! The convert pipeline only depends on these traits; the concrete
//! rasterizer is pluggable. Implementations are blocking by design (page
//! rasterization is CPU-bound) and are driven from `spawn_blocking`.

use thiserror::Error;

/// Errors produced while opening, rendering, or encoding a document.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("open document: {0}")]
    Open(String),

    #[error("pdf has no pages")]
    NoPages,

    #[error("render page: {0}")]
    Render(String),

    #[error("encode jpeg: {0}")]
    Encode(String),

    #[error("conversion canceled")]
    Canceled,
}

/// A page-addressable document produced by a [`DocumentOpener`].
pub trait PageDocument: Send {
    fn page_count(&self) -> usize;

    /// Rasterize the zero-indexed page.
    fn render_page(&self, index: usize) -> Result<image::DynamicImage, ConvertError>;
}

/// Opens raw document bytes into a page-addressable document.
pub trait DocumentOpener: Send + Sync {
    fn open(&self, data: &[u8]) -> Result<Box<dyn PageDocument>, ConvertError>;
}
