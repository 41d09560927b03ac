//! Page rasterisation: PDF pages (via pdfium) or image files to `DynamicImage`.
//!
//! pdfium keeps thread-local state and is not async-safe, so all of it runs
//! inside `tokio::task::spawn_blocking`. Pixel density follows the configured
//! DPI (pdfium's unit is 1/72 inch), capped on both axes by
//! `max_rendered_pixels`.

use crate::config::{PageSelection, TranscriptionConfig};
use crate::error::ExamOcrError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rendered pages of one document.
#[derive(Debug)]
pub struct RenderedDocument {
    /// Page count of the whole document, before selection.
    pub total_pages: usize,
    /// `(page_index_0based, image)` in page order.
    pub pages: Vec<(usize, DynamicImage)>,
}

/// Rasterise the selected pages of a PDF.
pub async fn render_pages(
    pdf_path: &Path,
    config: &TranscriptionConfig,
) -> Result<RenderedDocument, ExamOcrError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let selection = config.pages.clone();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, dpi, max_pixels, password.as_deref(), &selection)
    })
    .await
    .map_err(|e| ExamOcrError::Internal(format!("Render task panicked: {}", e)))?
}

/// Decode a single image file as page 0.
pub async fn load_image(path: &Path) -> Result<RenderedDocument, ExamOcrError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let image = image::open(&path).map_err(|e| ExamOcrError::ImageLoadFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        debug!(
            "Loaded image {} → {}x{} px",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(RenderedDocument {
            total_pages: 1,
            pages: vec![(0, image)],
        })
    })
    .await
    .map_err(|e| ExamOcrError::Internal(format!("Image load task panicked: {}", e)))?
}

/// Bind pdfium: `PDFIUM_LIB_PATH` (file or directory), then `./`, then the
/// system library search path.
fn bind_pdfium() -> Result<Pdfium, ExamOcrError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(p) if !p.is_empty() => {
            let path = PathBuf::from(p);
            let lib = if path.is_dir() {
                PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(&path))
            } else {
                path
            };
            Pdfium::bind_to_library(&lib)
        }
        _ => Pdfium::bind_to_library(&PathBuf::from(
            Pdfium::pdfium_platform_library_name_at_path("./"),
        ))
        .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| ExamOcrError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    selection: &PageSelection,
) -> Result<RenderedDocument, ExamOcrError> {
    let pdfium = bind_pdfium()?;

    let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ExamOcrError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ExamOcrError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ExamOcrError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })?;

    let pages = document.pages();
    let total_pages = pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let indices = selection.to_indices(total_pages);
    if indices.is_empty() {
        return Err(ExamOcrError::PageOutOfRange {
            page: first_requested_page(selection),
            total: total_pages,
        });
    }

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / 72.0)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = Vec::with_capacity(indices.len());

    for idx in indices {
        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("Skipping page {}: {:?}", idx + 1, e);
                continue;
            }
        };

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ExamOcrError::RasterisationFailed {
                page: idx + 1,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            idx + 1,
            image.width(),
            image.height()
        );

        results.push((idx, image));
    }

    Ok(RenderedDocument {
        total_pages,
        pages: results,
    })
}

/// 1-indexed page number to report when a selection matches nothing.
fn first_requested_page(selection: &PageSelection) -> usize {
    match selection {
        PageSelection::All => 0,
        PageSelection::Single(p) | PageSelection::Range(p, _) => *p,
        PageSelection::Set(pages) => pages.iter().copied().min().unwrap_or(0),
    }
}
