//! Greedy cut-point search over the smoothed row signal.
//!
//! Starting at the top of the page, each step scores every admissible cut row
//! in a bounded look-ahead window and takes the cheapest one:
//!
//! ```text
//! cost(i) = height_weight · |(i − start) − target_height|
//!         + std_weight    · smoothed[i]²
//! ```
//!
//! The first term pulls segments towards the target height; the second makes
//! cutting through a content-bearing row expensive. Squaring the dispersion
//! means a cut through a text line costs far more than a few dozen rows of
//! height deviation, so the search walks to the nearest whitespace gap.

use super::Segment;
use crate::config::SegmenterConfig;

/// Split `[0, smoothed.len())` into contiguous segments.
///
/// Always covers the full range with no gaps or overlaps. Every segment
/// except the last is at least `min_height` rows tall. Ties in cost go to
/// the smallest row index, so the result is fully deterministic.
///
/// An empty signal (zero-height image) returns no segments.
pub fn find_cuts(smoothed: &[f64], config: &SegmenterConfig) -> Vec<Segment> {
    let height = smoothed.len();
    let target = config.target_height as usize;
    let min_height = (config.min_height as usize).max(1);

    let mut segments = Vec::new();
    let mut start = 0usize;

    while start < height {
        let remaining = height - start;
        if remaining <= target {
            segments.push(Segment::new(start as u32, height as u32));
            break;
        }

        let window_start = start + min_height;
        let window_end = (start + 2 * target).min(height);
        match cheapest_cut(smoothed, start, window_start..window_end, config) {
            Some(cut) => {
                segments.push(Segment::new(start as u32, cut as u32));
                start = cut;
            }
            None => {
                // Unreachable with a validated config (min_height ≤ target_height).
                segments.push(Segment::new(start as u32, height as u32));
                break;
            }
        }
    }

    segments
}

/// Index of the minimum-cost row in `window`, first occurrence on ties.
fn cheapest_cut(
    smoothed: &[f64],
    start: usize,
    window: std::ops::Range<usize>,
    config: &SegmenterConfig,
) -> Option<usize> {
    let target = config.target_height as usize;
    let mut best: Option<(usize, f64)> = None;

    for i in window {
        let cost = cut_cost(i - start, target, smoothed[i], config);
        match best {
            Some((_, best_cost)) if cost >= best_cost => {}
            _ => best = Some((i, cost)),
        }
    }

    best.map(|(i, _)| i)
}

/// Cost of ending a segment of `segment_height` rows on a row whose smoothed
/// dispersion is `dispersion`.
pub fn cut_cost(
    segment_height: usize,
    target_height: usize,
    dispersion: f64,
    config: &SegmenterConfig,
) -> f64 {
    let height_cost = config.height_weight * segment_height.abs_diff(target_height) as f64;
    let std_cost = config.std_weight * dispersion * dispersion;
    height_cost + std_cost
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(target: u32, min: u32) -> SegmenterConfig {
        SegmenterConfig::with_heights(target, min)
    }

    fn assert_partition(segments: &[Segment], height: u32) {
        assert!(!segments.is_empty());
        assert_eq!(segments[0].start, 0);
        assert_eq!(segments.last().unwrap().end, height);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "gap or overlap: {pair:?}");
        }
        for s in segments {
            assert!(s.start < s.end, "empty segment {s:?}");
        }
    }

    #[test]
    fn flat_signal_cuts_at_target() {
        let segments = find_cuts(&vec![0.0; 1000], &cfg(400, 200));
        assert_eq!(
            segments,
            vec![Segment::new(0, 400), Segment::new(400, 800), Segment::new(800, 1000)]
        );
    }

    #[test]
    fn short_signal_is_one_segment() {
        let segments = find_cuts(&vec![3.0; 400], &cfg(400, 200));
        assert_eq!(segments, vec![Segment::new(0, 400)]);

        let segments = find_cuts(&vec![3.0; 150], &cfg(400, 200));
        assert_eq!(segments, vec![Segment::new(0, 150)]);
    }

    #[test]
    fn empty_signal_has_no_segments() {
        assert!(find_cuts(&[], &cfg(400, 200)).is_empty());
    }

    #[test]
    fn ties_go_to_the_lowest_row() {
        // Rows 390 and 410 are equally far from the target and both blank;
        // everything else is busy enough to dominate.
        let mut signal = vec![100.0; 1000];
        signal[390] = 0.0;
        signal[410] = 0.0;
        let segments = find_cuts(&signal, &cfg(400, 200));
        assert_eq!(segments[0], Segment::new(0, 390));
    }

    #[test]
    fn busy_page_is_bounded_by_twice_the_target() {
        // Uniformly busy: the dispersion term is constant, so height decides.
        let segments = find_cuts(&vec![50.0; 3000], &cfg(400, 200));
        assert_partition(&segments, 3000);
        for s in &segments {
            assert!(s.height() < 800);
        }
    }

    #[test]
    fn cut_near_the_end_leaves_a_short_tail() {
        // 500 rows, only row 499 is blank: the cut lands on it and the tail
        // is a single row, still emitted.
        let mut signal = vec![100.0; 500];
        signal[499] = 0.0;
        let segments = find_cuts(&signal, &cfg(400, 200));
        assert_eq!(segments, vec![Segment::new(0, 499), Segment::new(499, 500)]);
    }

    #[test]
    fn zero_min_height_never_produces_empty_segments() {
        let config = SegmenterConfig {
            min_height: 0,
            ..cfg(10, 5)
        };
        let segments = find_cuts(&vec![0.0; 95], &config);
        assert_partition(&segments, 95);
    }

    #[test]
    fn inverted_heights_still_cover_the_range() {
        // min > target is rejected by validation; the search must still be total.
        let config = SegmenterConfig {
            min_height: 900,
            ..cfg(400, 200)
        };
        let segments = find_cuts(&vec![0.0; 1000], &config);
        assert_partition(&segments, 1000);
    }

    #[test]
    fn cost_terms() {
        let config = SegmenterConfig::default();
        assert_eq!(cut_cost(400, 400, 0.0, &config), 0.0);
        assert_eq!(cut_cost(420, 400, 0.0, &config), 20.0);
        assert_eq!(cut_cost(400, 400, 2.0, &config), 20.0);
    }
}
