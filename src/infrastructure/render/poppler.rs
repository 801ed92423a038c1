//! Default document opener backed by poppler-utils
//!
//! Shells out to `pdfinfo` for the page count and `pdftoppm` for
//! rasterization. Keeping the rasterizer out of process keeps the crate
//! free of native PDF build dependencies; any in-process implementation of
//! `DocumentOpener` can be wired in instead.

use std::io::Write;
use std::process::Command;

use tempfile::NamedTempFile;

use crate::domain::document::{ConvertError, DocumentOpener, PageDocument};

const PDFINFO_BIN: &str = "pdfinfo";
const PDFTOPPM_BIN: &str = "pdftoppm";

/// Resolution for rasterized pages, in DPI.
const RENDER_DPI: &str = "150";

#[derive(Debug, Default, Clone)]
pub struct PopplerOpener;

impl PopplerOpener {
    pub fn new() -> Self {
        Self
    }
}

struct PopplerDocument {
    file: NamedTempFile,
    pages: usize,
}

impl DocumentOpener for PopplerOpener {
    fn open(&self, data: &[u8]) -> Result<Box<dyn PageDocument>, ConvertError> {
        let mut file = NamedTempFile::with_suffix(".pdf")
            .map_err(|e| ConvertError::Open(format!("create temp file: {e}")))?;
        file.write_all(data)
            .map_err(|e| ConvertError::Open(format!("write temp file: {e}")))?;
        file.flush()
            .map_err(|e| ConvertError::Open(format!("flush temp file: {e}")))?;

        let pages = page_count(file.path())?;
        Ok(Box::new(PopplerDocument { file, pages }))
    }
}

impl PageDocument for PopplerDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render_page(&self, index: usize) -> Result<image::DynamicImage, ConvertError> {
        let page = index + 1;
        let output = Command::new(PDFTOPPM_BIN)
            .arg("-png")
            .arg("-r")
            .arg(RENDER_DPI)
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg(self.file.path())
            .output()
            .map_err(|e| ConvertError::Render(format!("spawn {PDFTOPPM_BIN}: {e}")))?;

        if !output.status.success() {
            return Err(ConvertError::Render(format!(
                "{PDFTOPPM_BIN} exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        image::load_from_memory(&output.stdout)
            .map_err(|e| ConvertError::Render(format!("decode rasterized page: {e}")))
    }
}

fn page_count(path: &std::path::Path) -> Result<usize, ConvertError> {
    let output = Command::new(PDFINFO_BIN)
        .arg(path)
        .output()
        .map_err(|e| ConvertError::Open(format!("spawn {PDFINFO_BIN}: {e}")))?;

    if !output.status.success() {
        return Err(ConvertError::Open(format!(
            "{PDFINFO_BIN} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout)
        .ok_or_else(|| ConvertError::Open("missing page count in pdfinfo output".to_string()))
}

fn parse_page_count(pdfinfo_output: &str) -> Option<usize> {
    pdfinfo_output
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}
