//! First-page PDF to JPEG conversion

use std::sync::Arc;

use crate::domain::document::{ConvertError, DocumentOpener};

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Renders the first page of a document to JPEG bytes. Rasterization and
/// encoding are CPU-bound, so the whole pipeline runs on the blocking pool.
#[derive(Clone)]
pub struct ConvertService {
    opener: Arc<dyn DocumentOpener>,
    jpeg_quality: u8,
}

impl ConvertService {
    pub fn new(opener: Arc<dyn DocumentOpener>, jpeg_quality: u8) -> Self {
        Self {
            opener,
            jpeg_quality,
        }
    }

    pub async fn convert_first_page(&self, data: Vec<u8>) -> Result<Vec<u8>, ConvertError> {
        let opener = self.opener.clone();
        let quality = self.jpeg_quality;

        tokio::task::spawn_blocking(move || {
            let doc = opener.open(&data)?;
            if doc.page_count() == 0 {
                return Err(ConvertError::NoPages);
            }

            let page = doc.render_page(0)?;

            let mut buf = Vec::new();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
            page.write_with_encoder(encoder)
                .map_err(|e| ConvertError::Encode(e.to_string()))?;
            Ok(buf)
        })
        .await
        .map_err(|join_err| {
            if join_err.is_cancelled() {
                ConvertError::Canceled
            } else {
                ConvertError::Render(join_err.to_string())
            }
        })?
    }
}
