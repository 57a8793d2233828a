//! Retention-time alignment of two chromatograms by cross-correlation.
//!
//! Both (zero-padded) linear splines are sampled on a common grid covering
//! the union of their domains. The shift is the lag `τ` maximizing
//! `Σ reference(t + τ) · other(t)`, so that `t + τ` maps a time of the
//! other run onto the reference timeline.
//!
//! A coarse pass scans every lag up to `max_shift` on a 0.01 min grid, then
//! a fine pass refines within ±0.02 min on a 0.001 min grid. Ties go to the
//! smaller absolute lag.

use super::spline::LinearSpline;

const COARSE_RESOLUTION: f64 = 100.0;
const FINE_RESOLUTION: f64 = 1000.0;
const FINE_SEARCH_HALF_WIDTH: f64 = 0.02;

/// Largest shift (min) searched when none is configured.
pub const DEFAULT_MAX_RT_SHIFT: f64 = 5.0;

fn sample(spline: &LinearSpline, start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| spline.interpolate(start + i as f64 * step))
        .collect()
}

fn is_better(score: f64, lag: f64, best_score: f64, best_lag: f64) -> bool {
    score > best_score || (score == best_score && lag.abs() < best_lag.abs())
}

/// Shift to add to the times of `other` to align it onto `reference`,
/// searched within `±max_shift`.
pub fn estimate_rt_shift(reference: &LinearSpline, other: &LinearSpline, max_shift: f64) -> f64 {
    let (ref_start, ref_end) = reference.domain();
    let (other_start, other_end) = other.domain();
    let start = ref_start.min(other_start);
    let end = ref_end.max(other_end);

    // Coarse pass: integer lags on the sampled grid.
    let step = 1.0 / COARSE_RESOLUTION;
    let n = ((end - start) * COARSE_RESOLUTION).ceil() as usize + 1;
    let ref_samples = sample(reference, start, step, n);
    let other_samples = sample(other, start, step, n);

    let other_nonzero: Vec<(i64, f64)> = other_samples
        .iter()
        .enumerate()
        .filter(|(_, v)| **v != 0.0)
        .map(|(i, v)| (i as i64, *v))
        .collect();

    let mut best_lag = 0i64;
    let mut best_score = f64::NEG_INFINITY;
    let n_i = n as i64;
    let max_lag = ((max_shift.max(0.0) * COARSE_RESOLUTION).ceil() as i64).min(n_i - 1);
    for lag in -max_lag..=max_lag {
        // reference[i + lag] * other[i] over the overlapping indices
        let score: f64 = other_nonzero
            .iter()
            .filter(|(i, _)| (0..n_i).contains(&(i + lag)))
            .map(|(i, v)| ref_samples[(i + lag) as usize] * v)
            .sum();
        if is_better(score, lag as f64, best_score, best_lag as f64) {
            best_score = score;
            best_lag = lag;
        }
    }
    let coarse_shift = best_lag as f64 * step;

    // Fine pass: evaluate the reference spline directly at shifted times.
    let fine_step = 1.0 / FINE_RESOLUTION;
    let fine_n = ((end - start) * FINE_RESOLUTION).ceil() as usize + 1;
    let other_fine = sample(other, start, fine_step, fine_n);
    let num_fine_lags = (FINE_SEARCH_HALF_WIDTH * FINE_RESOLUTION).round() as i64;

    let mut best_shift = coarse_shift;
    let mut best_score = f64::NEG_INFINITY;
    for j in -num_fine_lags..=num_fine_lags {
        let shift = coarse_shift + j as f64 * fine_step;
        if shift.abs() > max_shift + fine_step / 2.0 {
            continue;
        }
        let score: f64 = other_fine
            .iter()
            .enumerate()
            .filter(|(_, v)| **v != 0.0)
            .map(|(i, v)| reference.interpolate(start + i as f64 * fine_step + shift) * v)
            .sum();
        if is_better(score, shift, best_score, best_shift) {
            best_score = score;
            best_shift = shift;
        }
    }
    best_shift
}

#[cfg(test)]
mod tests {
    use super::*;

    // Triangle peak with apex at `apex`, padded with zeros.
    fn triangle(apex: f64) -> LinearSpline {
        let xs: Vec<f64> = (-6..=6).map(|i| apex + i as f64).collect();
        let ys: Vec<f64> = (-6..=6)
            .map(|i: i32| (3 - i.abs()).max(0) as f64 * 100.0)
            .collect();
        LinearSpline::new(xs, ys).unwrap()
    }

    #[test]
    fn test_identical_traces_have_zero_shift() {
        let a = triangle(10.0);
        assert_eq!(estimate_rt_shift(&a, &a, DEFAULT_MAX_RT_SHIFT), 0.0);
    }

    #[test]
    fn test_shift_sign() {
        let reference = triangle(10.0);
        let late = triangle(10.1);
        let early = triangle(9.9);
        assert!((estimate_rt_shift(&reference, &late, DEFAULT_MAX_RT_SHIFT) + 0.1).abs() < 1e-3);
        assert!((estimate_rt_shift(&reference, &early, DEFAULT_MAX_RT_SHIFT) - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_large_shift_is_antisymmetric() {
        let a = triangle(10.0);
        let b = triangle(13.0);
        let ab = estimate_rt_shift(&a, &b, DEFAULT_MAX_RT_SHIFT);
        let ba = estimate_rt_shift(&b, &a, DEFAULT_MAX_RT_SHIFT);
        assert!((ab + 3.0).abs() < 1e-3);
        assert!((ab + ba).abs() < 1e-3);
    }

    #[test]
    fn test_shift_is_bounded() {
        let a = triangle(10.0);
        let b = triangle(13.0);
        // The true shift is out of range, the best lag inside it is found.
        let bounded = estimate_rt_shift(&a, &b, 1.0);
        assert!((bounded + 1.0).abs() < 1e-9);
    }
}
