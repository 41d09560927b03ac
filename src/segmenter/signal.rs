//! Row statistics: per-row luminance dispersion and its smoothed form.
//!
//! A row carrying text, handwriting, or a diagram stroke has pixels that swing
//! between ink and paper, so its standard deviation is high. A blank or
//! near-uniform row sits close to zero. The cut search in [`super::cuts`]
//! only ever looks at the smoothed signal.
//!
//! Luminance uses the ITU-R BT.601 weights (0.299, 0.587, 0.114) in 16-bit
//! fixed point, not the BT.709 weights of `DynamicImage::to_luma8`. The
//! default cost weights were tuned on 601 luma, and the two differ most on
//! saturated colour such as red-pen marks.

use image::{DynamicImage, GrayImage, Luma};

/// Width of the uniform moving-average window applied to the row signal.
pub const SMOOTHING_WINDOW: usize = 5;

/// BT.601 luminance of every pixel, rounded to nearest. Alpha is ignored.
///
/// Grey input passes through unchanged.
pub fn luma_601(image: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = image {
        return gray.clone();
    }
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = (r as u32 * 19_595 + g as u32 * 38_470 + b as u32 * 7_471 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Population standard deviation of luminance values for every row.
///
/// Output length equals the image height. An image of zero width yields a
/// zero for every row.
pub fn row_std_devs(gray: &GrayImage) -> Vec<f64> {
    let width = gray.width() as usize;
    if width == 0 {
        return vec![0.0; gray.height() as usize];
    }

    gray.as_raw()
        .chunks_exact(width)
        .map(|row| {
            let n = row.len() as f64;
            let mean = row.iter().map(|&p| p as f64).sum::<f64>() / n;
            let var = row
                .iter()
                .map(|&p| {
                    let d = p as f64 - mean;
                    d * d
                })
                .sum::<f64>()
                / n;
            var.sqrt()
        })
        .collect()
}

/// Uniform moving average with "same"-length output and zero padding.
///
/// `out[i]` is the sum of `signal[j]` over the window centred on `i`, divided
/// by `window`, where samples outside `[0, len)` count as zero. For an odd
/// window the centre is exact; for an even window it leans one sample
/// towards lower indices on the left side, which is the same alignment as a
/// "same"-mode discrete convolution.
pub fn smooth(signal: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || signal.is_empty() {
        return signal.to_vec();
    }

    let hi = (window - 1) / 2;
    let lo = window - 1 - hi;

    // prefix[k] = sum of signal[..k]
    let mut prefix = Vec::with_capacity(signal.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &v in signal {
        acc += v;
        prefix.push(acc);
    }

    let len = signal.len();
    let scale = window as f64;
    (0..len)
        .map(|i| {
            let from = i.saturating_sub(lo);
            let to = (i + hi + 1).min(len);
            (prefix[to] - prefix[from]) / scale
        })
        .collect()
}
