//! PDF text extraction via pdfium, one string per page.
//!
//! pdfium keeps thread-local state and blocks, so every call runs inside
//! `tokio::task::spawn_blocking`.
//!
//! The library is bound at runtime: `PDFIUM_LIB_PATH` when set, then a
//! `libpdfium` next to the working directory, then the system library.

use crate::error::McqGenError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an explicit pdfium library file.
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Extract the text of every page, in page order.
///
/// Pages with no text layer come back as empty strings; the chunker drops
/// them.
pub async fn extract_pages(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<String>, McqGenError> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_pages_blocking(&path, password.as_deref()))
        .await
        .map_err(|e| McqGenError::Internal(format!("Extraction task panicked: {}", e)))?
}

fn extract_pages_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<Vec<String>, McqGenError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| McqGenError::ExtractionFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();
        debug!("Page {}: {} chars", idx + 1, text.chars().count());
        texts.push(text);
    }

    Ok(texts)
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, McqGenError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                McqGenError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                McqGenError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            McqGenError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Bind to a pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, McqGenError> {
    if let Some(path) = env_library_path() {
        debug!("Binding pdfium from {}", path.display());
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| McqGenError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e)));
    }

    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| Pdfium::bind_to_system_library())
        .map(Pdfium::new)
        .map_err(|e| McqGenError::PdfiumBindingFailed(format!("{:?}", e)))
}

fn env_library_path() -> Option<PathBuf> {
    std::env::var_os(PDFIUM_LIB_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
