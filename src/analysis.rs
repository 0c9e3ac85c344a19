//! Post-processing of an error curve into native-height candidates.

/// A ratio must clear this fraction of the best ratio's excess over 1.
pub const RELATIVE_THRESHOLD: f64 = 0.33;

/// At most this many ratios are considered as candidates.
pub const MAX_CANDIDATES: usize = 5;

/// Accepted candidates must be at least this many positions apart.
pub const EXCLUSION_WINDOW: usize = 20;

/// Ratio of each error to the one before it.
///
/// `ratio[0]` is `0`; `ratio[i]` is `errors[i - 1] / errors[i]`, or `0` when
/// `errors[i]` is zero. A ratio well above 1 marks a sharp drop in error.
pub fn ratio_curve(errors: &[f64]) -> Vec<f64> {
    if errors.is_empty() {
        return Vec::new();
    }
    let mut ratios = Vec::with_capacity(errors.len());
    ratios.push(0.0);
    ratios.extend(errors.windows(2).map(|w| {
        let (last, current) = (w[0], w[1]);
        if current != 0.0 { last / current } else { 0.0 }
    }));
    ratios
}

/// Indices of the most pronounced drops in a ratio curve.
///
/// Ratios are ranked descending; those with `r - 1` above
/// [`RELATIVE_THRESHOLD`] times the best `r - 1` are kept, capped at
/// [`MAX_CANDIDATES`]. Each kept value maps to the first index holding it, and
/// is accepted unless an already accepted index lies closer than
/// [`EXCLUSION_WINDOW`]. The pass is greedy: a later, better peak inside the
/// window of an earlier acceptance is dropped.
pub fn pick_candidates(ratios: &[f64]) -> Vec<usize> {
    let mut sorted = ratios.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let Some(&max_difference) = sorted.first() else {
        return Vec::new();
    };

    let mut accepted: Vec<usize> = Vec::new();
    let kept = sorted
        .iter()
        .filter(|&&r| r - 1.0 > (max_difference - 1.0) * RELATIVE_THRESHOLD)
        .take(MAX_CANDIDATES);

    for &diff in kept {
        let Some(current) = ratios.iter().position(|&r| r == diff) else {
            continue;
        };
        if accepted.iter().all(|&res| current.abs_diff(res) >= EXCLUSION_WINDOW) {
            accepted.push(current);
        }
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_ratio_is_zero() {
        let r = ratio_curve(&[0.5, 0.25, 0.25]);
        assert_eq!(r, vec![0.0, 2.0, 1.0]);
        assert!(ratio_curve(&[]).is_empty());
        assert_eq!(ratio_curve(&[0.3]), vec![0.0]);
    }

    #[test]
    fn zero_error_gives_zero_ratio() {
        let r = ratio_curve(&[0.5, 0.0, 0.25]);
        assert_eq!(r[1], 0.0);
        assert_eq!(r[2], 0.0);
    }

    #[test]
    fn single_sharp_drop_is_picked() {
        let mut errors = vec![1e-3; 60];
        errors[30] = 1e-7;
        for e in errors.iter_mut().skip(31) {
            *e = 9e-4;
        }
        let ratios = ratio_curve(&errors);
        assert_eq!(pick_candidates(&ratios), vec![30]);
    }

    #[test]
    fn nearby_peaks_are_suppressed_greedily() {
        let mut ratios = vec![1.0; 100];
        ratios[0] = 0.0;
        ratios[40] = 10.0;
        // Within the window of 40: dropped even though it is a strong peak.
        ratios[55] = 9.0;
        // Exactly EXCLUSION_WINDOW away: kept.
        ratios[60] = 8.0;
        ratios[90] = 7.0;
        assert_eq!(pick_candidates(&ratios), vec![40, 60, 90]);
    }

    #[test]
    fn weak_ratios_are_filtered() {
        let mut ratios = vec![1.0; 50];
        ratios[0] = 0.0;
        ratios[10] = 11.0;
        // 3.0 - 1 = 2 < (11 - 1) * 0.33
        ratios[40] = 3.0;
        assert_eq!(pick_candidates(&ratios), vec![10]);
    }

    #[test]
    fn at_most_five_ratios_are_considered() {
        let mut ratios = vec![1.0; 200];
        ratios[0] = 0.0;
        for (i, idx) in [20, 50, 80, 110, 140, 170].into_iter().enumerate() {
            ratios[idx] = 10.0 - i as f64 * 0.1;
        }
        // The sixth-best peak at 170 is never looked at.
        assert_eq!(pick_candidates(&ratios), vec![20, 50, 80, 110, 140]);
    }

    #[test]
    fn duplicate_values_map_to_first_index() {
        let mut ratios = vec![1.0; 80];
        ratios[0] = 0.0;
        ratios[10] = 5.0;
        ratios[60] = 5.0;
        // Both copies of 5.0 resolve to index 10; 60 is never reached.
        assert_eq!(pick_candidates(&ratios), vec![10]);
    }

    #[test]
    fn no_drop_means_no_candidates() {
        // Monotonically rising error: every ratio is below 1.
        let errors: Vec<f64> = (1..30).map(|i| i as f64 * 1e-4).collect();
        assert!(pick_candidates(&ratio_curve(&errors)).is_empty());
        assert!(pick_candidates(&[]).is_empty());
    }
}
