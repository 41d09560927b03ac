//! Input resolution: classify a user-supplied path as a PDF or a page image.
//!
//! Scanned exams arrive either as multi-page PDFs or as one photo/scan per
//! page. Images are recognised by extension and decoded directly; everything
//! else must carry the `%PDF` magic bytes so callers get a meaningful error
//! instead of a pdfium failure.

use crate::error::ExamOcrError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions treated as single-page image inputs.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// A validated input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// A PDF document to rasterise.
    Pdf(PathBuf),
    /// A single page image.
    Image(PathBuf),
}

impl InputKind {
    pub fn path(&self) -> &Path {
        match self {
            InputKind::Pdf(p) | InputKind::Image(p) => p,
        }
    }
}

/// Check whether a path looks like a supported page image.
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Validate that `input` exists and is readable, and classify it.
pub fn resolve_input(input: &str) -> Result<InputKind, ExamOcrError> {
    let path = PathBuf::from(input);

    if !path.exists() {
        return Err(ExamOcrError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExamOcrError::PermissionDenied { path });
        }
        Err(_) => return Err(ExamOcrError::FileNotFound { path }),
    };

    if is_image_path(&path) {
        debug!("Resolved image input: {}", path.display());
        return Ok(InputKind::Image(path));
    }

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(ExamOcrError::NotAPdf { path, magic });
    }

    debug!("Resolved PDF input: {}", path.display());
    Ok(InputKind::Pdf(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn image_extensions_are_case_insensitive() {
        assert!(is_image_path(Path::new("scan.PNG")));
        assert!(is_image_path(Path::new("dir/page_1.jpeg")));
        assert!(!is_image_path(Path::new("exam.pdf")));
        assert!(!is_image_path(Path::new("noext")));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, ExamOcrError::FileNotFound { .. }));
    }

    #[test]
    fn pdf_magic_is_checked() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("exam.pdf");
        std::fs::File::create(&good)
            .unwrap()
            .write_all(b"%PDF-1.7\n")
            .unwrap();
        assert_eq!(
            resolve_input(good.to_str().unwrap()).unwrap(),
            InputKind::Pdf(good.clone())
        );

        let bad = dir.path().join("notes.txt");
        std::fs::write(&bad, b"hello world").unwrap();
        let err = resolve_input(bad.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ExamOcrError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn image_input_skips_magic_check() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("page.png");
        std::fs::write(&img, b"not really a png").unwrap();
        assert_eq!(
            resolve_input(img.to_str().unwrap()).unwrap(),
            InputKind::Image(img)
        );
    }
}
