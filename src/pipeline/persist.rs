//! Debug persistence: write each band to disk for visual inspection.
//!
//! Layout: `{dir}/segments_p{page}/segment_{n}.png`, both numbers 1-indexed,
//! so a reviewer can line files up with the `--- Page N ---` headings and the
//! segment numbers in error messages.

use crate::error::ExamOcrError;
use crate::segmenter::Band;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory holding the bands of one page.
pub fn page_dir(root: &Path, page_num: usize) -> PathBuf {
    root.join(format!("segments_p{}", page_num))
}

/// Path of one band (`segment_num` is 1-indexed).
pub fn band_path(root: &Path, page_num: usize, segment_num: usize) -> PathBuf {
    page_dir(root, page_num).join(format!("segment_{}.png", segment_num))
}

/// Write every band of a page as PNG and return the written paths in order.
///
/// Blocking; call from `spawn_blocking` inside async code.
pub fn save_bands(
    root: &Path,
    page_num: usize,
    bands: &[Band],
) -> Result<Vec<PathBuf>, ExamOcrError> {
    let dir = page_dir(root, page_num);
    std::fs::create_dir_all(&dir).map_err(|e| ExamOcrError::SegmentWriteFailed {
        path: dir.clone(),
        detail: e.to_string(),
    })?;

    let mut paths = Vec::with_capacity(bands.len());
    for (i, band) in bands.iter().enumerate() {
        let path = band_path(root, page_num, i + 1);
        band.image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| ExamOcrError::SegmentWriteFailed {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        debug!(
            "Saved page {} segment {} ({}..{}) to {}",
            page_num,
            i + 1,
            band.segment.start,
            band.segment.end,
            path.display()
        );
        paths.push(path);
    }

    Ok(paths)
}
