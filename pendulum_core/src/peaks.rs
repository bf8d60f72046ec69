//! Local-maximum detection and period estimation.

/// Indices of local maxima with `values[i] >= height`.
///
/// A maximum needs a strict rise on its left and a strict fall on its right;
/// a flat top counts once, at its middle sample. The first and last samples
/// are never peaks.
pub fn find_peaks(values: &[f64], height: f64) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < n {
        if values[i - 1] < values[i] {
            let mut j = i;
            while j + 1 < n && values[j + 1] == values[i] {
                j += 1;
            }
            if j + 1 < n && values[j + 1] < values[i] {
                let mid = (i + j) / 2;
                if values[mid] >= height {
                    peaks.push(mid);
                }
            }
            i = j + 1;
        } else {
            i += 1;
        }
    }
    peaks
}

/// Drop peaks that sit within `min_distance` (in `times` units) of a higher
/// peak. Returned indices stay in ascending order.
pub fn enforce_distance(peaks: &[usize], times: &[f64], values: &[f64], min_distance: f64) -> Vec<usize> {
    if min_distance <= 0.0 || peaks.len() < 2 {
        return peaks.to_vec();
    }
    let mut by_height = peaks.to_vec();
    by_height.sort_by(|&a, &b| values[b].total_cmp(&values[a]).then(a.cmp(&b)));
    let mut kept: Vec<usize> = Vec::with_capacity(peaks.len());
    for p in by_height {
        if kept
            .iter()
            .all(|&k| (times[k] - times[p]).abs() >= min_distance)
        {
            kept.push(p);
        }
    }
    kept.sort_unstable();
    kept
}

/// Mean spacing of consecutive peak times; `None` with fewer than two peaks.
pub fn mean_period(peak_times: &[f64]) -> Option<f64> {
    if peak_times.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = peak_times.windows(2).map(|w| w[1] - w[0]).collect();
    crate::util::mean(&diffs).filter(|p| p.is_finite() && *p > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0.0, 1.0, 0.0], 0.5, vec![1])]
    #[case(&[0.0, 1.0, 0.0], 1.5, vec![])]
    #[case(&[1.0, 0.0, 1.0], 0.0, vec![])]
    #[case(&[0.0, 2.0, 2.0, 2.0, 0.0], 0.0, vec![2])]
    #[case(&[0.0, 2.0, 2.0, 3.0, 0.0], 0.0, vec![3])]
    #[case(&[0.0, 1.0, 1.0], 0.0, vec![])]
    #[case(&[], 0.0, vec![])]
    fn peak_cases(#[case] v: &[f64], #[case] h: f64, #[case] expected: Vec<usize>) {
        assert_eq!(find_peaks(v, h), expected);
    }

    #[test]
    fn distance_keeps_highest_of_a_cluster() {
        let times = [0.0, 0.1, 0.2, 0.3, 0.4, 0.5, 3.0];
        let values = [0.0, 1.0, 0.5, 1.2, 0.4, 0.0, 0.9];
        let kept = enforce_distance(&[1, 3, 6], &times, &values, 1.0);
        assert_eq!(kept, vec![3, 6]);
    }

    #[test]
    fn period_is_mean_spacing() {
        assert_eq!(mean_period(&[1.0]), None);
        let p = mean_period(&[1.0, 4.0, 7.2]).unwrap();
        assert!((p - 3.1).abs() < 1e-12);
    }
}
