//! Document rendering infrastructure

mod poppler;
mod service;

pub use poppler::PopplerOpener;
pub use service::{ConvertService, DEFAULT_JPEG_QUALITY};

#[cfg(test)]
pub use service::stub::StubOpener;
