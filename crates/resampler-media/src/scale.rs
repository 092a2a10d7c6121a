//! Bound-fitting dimension math.
//!
//! Pure functions, testable without any I/O or images.

/// True when both dimensions already fit within `bound`.
pub fn fits_within(width: u32, height: u32, bound: u32) -> bool {
    width <= bound && height <= bound
}

/// Scale `(width, height)` so the longer edge equals `bound`.
///
/// Both axes use the same ratio `bound / max(width, height)` and are
/// truncated independently, never rounded. The ratio is applied in exact
/// integer arithmetic so the longer edge lands on `bound` exactly. An axis
/// that truncates to zero is raised to one pixel so the result stays encodable.
///
/// # Examples
/// ```
/// # use resampler_media::scale::scale_to_fit;
/// assert_eq!(scale_to_fit(2000, 1000, 850), (850, 425));
/// assert_eq!(scale_to_fit(333, 1000, 150), (49, 150));
/// ```
pub fn scale_to_fit(width: u32, height: u32, bound: u32) -> (u32, u32) {
    let longest = u64::from(width.max(height).max(1));
    let scale = |edge: u32| -> u32 {
        let scaled = u64::from(bound) * u64::from(edge) / longest;
        (scaled as u32).max(1)
    };
    (scale(width), scale(height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landscape_scales_to_bound() {
        assert_eq!(scale_to_fit(2000, 1000, 850), (850, 425));
    }

    #[test]
    fn portrait_scales_to_bound() {
        assert_eq!(scale_to_fit(1000, 2000, 850), (425, 850));
    }

    #[test]
    fn square_scales_to_bound() {
        assert_eq!(scale_to_fit(400, 400, 150), (150, 150));
    }

    #[test]
    fn truncates_rather_than_rounds() {
        // 150 * 999 / 1000 = 149.85 -> 149
        assert_eq!(scale_to_fit(1000, 999, 150), (150, 149));
        // 850 * 1001 / 1600 = 531.78 -> 531
        assert_eq!(scale_to_fit(1600, 1001, 850), (850, 531));
    }

    #[test]
    fn degenerate_axis_is_at_least_one_pixel() {
        assert_eq!(scale_to_fit(10_000, 3, 150), (150, 1));
    }

    #[test]
    fn fits_within_is_inclusive() {
        assert!(fits_within(150, 150, 150));
        assert!(fits_within(100, 100, 150));
        assert!(!fits_within(151, 10, 150));
        assert!(!fits_within(10, 151, 150));
    }

    #[test]
    fn scaled_dimensions_stay_within_bound_and_keep_aspect() {
        let dims = [1u32, 2, 3, 7, 149, 150, 151, 640, 851, 1023, 2000, 4097];
        for &w in &dims {
            for &h in &dims {
                for &n in &[1u32, 150, 850] {
                    let (sw, sh) = scale_to_fit(w, h, n);
                    assert!(sw.max(sh) <= n, "{w}x{h}@{n} -> {sw}x{sh}");
                    assert_eq!(sw.max(sh), n, "longer edge lands on bound");

                    // Each axis is within one unit of the exact scaled value.
                    let ratio = n as f64 / w.max(h) as f64;
                    assert!((ratio * w as f64 - sw as f64).abs() < 1.0 + f64::EPSILON || sw == 1);
                    assert!((ratio * h as f64 - sh as f64).abs() < 1.0 + f64::EPSILON || sh == 1);
                }
            }
        }
    }
}
