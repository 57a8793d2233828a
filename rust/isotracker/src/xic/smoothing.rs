//! Moving-window intensity smoothing applied before extremum detection.
//!
//! The first and last `window / 2` points are passed through unchanged.

use crate::errors::{
    DataProcessingError,
    Result,
};

pub const DEFAULT_SMOOTHING_WINDOW: usize = 5;

fn check_window(window: usize, context: &str) -> Result<()> {
    if window == 0 {
        return Err(DataProcessingError::ExpectedNonEmptyData {
            context: Some(format!("{}: smoothing window must be > 0", context)),
        }
        .into());
    }
    Ok(())
}

/// Intensity-weighted mean: each point in the window contributes
/// proportionally to its own share of the window's total.
///
/// An all-zero window stays at zero.
pub fn weighted_smoothing(intensity: &[f64], window: usize) -> Result<Vec<f64>> {
    check_window(window, "weighted_smoothing")?;
    let half = window / 2;
    let n = intensity.len();
    let mut out = intensity.to_vec();
    if n < window {
        return Ok(out);
    }
    for i in half..n - half {
        let vals = &intensity[i - half..i - half + window];
        let sum: f64 = vals.iter().sum();
        if sum == 0.0 {
            out[i] = 0.0;
            continue;
        }
        out[i] = vals.iter().map(|x| x * (x / sum)).sum();
    }
    Ok(out)
}

/// Plain moving average.
pub fn mean_smoothing(intensity: &[f64], window: usize) -> Result<Vec<f64>> {
    check_window(window, "mean_smoothing")?;
    let half = window / 2;
    let n = intensity.len();
    let mut out = intensity.to_vec();
    if n < window {
        return Ok(out);
    }
    for i in half..n - half {
        let sum: f64 = intensity[i - half..i - half + window].iter().sum();
        out[i] = sum / window as f64;
    }
    Ok(out)
}

/// Weighted smoothing followed by a plain moving average.
pub fn smooth_intensities(intensity: &[f64], window: usize) -> Result<Vec<f64>> {
    let weighted = weighted_smoothing(intensity, window)?;
    mean_smoothing(&weighted, window)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_smoothing_keeps_edges() {
        let data = vec![1.0, 2.0, 10.0, 2.0, 1.0, 3.0];
        let out = mean_smoothing(&data, 5).unwrap();
        assert_eq!(out[0], 1.0);
        assert_eq!(out[1], 2.0);
        assert!((out[2] - 3.2).abs() < 1e-12);
        assert!((out[3] - 3.6).abs() < 1e-12);
        assert_eq!(out[4], 1.0);
        assert_eq!(out[5], 3.0);
    }

    #[test]
    fn test_weighted_favours_intense_points() {
        let data = vec![0.0, 0.0, 10.0, 0.0, 0.0];
        let out = weighted_smoothing(&data, 5).unwrap();
        assert_eq!(out[2], 10.0);
        let flat = weighted_smoothing(&[0.0; 7], 5).unwrap();
        assert!(flat.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        assert!(smooth_intensities(&[1.0, 2.0], 0).is_err());
    }
}
