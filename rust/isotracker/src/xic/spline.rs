//! Piecewise interpolants over sorted knots.
//!
//! Both splines extrapolate with their first/last segment outside the knot
//! range.

use crate::errors::{
    DataProcessingError,
    Result,
};

const ZERO_TOLERANCE: f64 = 1e-15;

fn check_knots(xs: &[f64], ys: &[f64], needed: usize, context: &str) -> Result<()> {
    if xs.len() != ys.len() {
        return Err(DataProcessingError::ExpectedSlicesSameLength {
            expected: xs.len(),
            other: ys.len(),
            context: context.to_string(),
        }
        .into());
    }
    if xs.len() < needed {
        return Err(DataProcessingError::InsufficientPoints {
            needed,
            got: xs.len(),
            context: context.to_string(),
        }
        .into());
    }
    if xs.iter().chain(ys.iter()).any(|x| !x.is_finite()) {
        return Err(DataProcessingError::ExpectedFiniteNonNanData {
            context: context.to_string(),
        }
        .into());
    }
    if xs.windows(2).any(|w| w[0] >= w[1]) {
        return Err(DataProcessingError::ExpectedFiniteNonNanData {
            context: format!("{}: knots must be strictly increasing", context),
        }
        .into());
    }
    Ok(())
}

// Index of the segment [xs[k], xs[k + 1]] used for `t`, clamped to the
// first and last segments.
fn segment_index(xs: &[f64], t: f64) -> usize {
    let pos = xs.partition_point(|x| *x <= t);
    pos.saturating_sub(1).min(xs.len() - 2)
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearSpline {
    xs: Vec<f64>,
    intercepts: Vec<f64>,
    slopes: Vec<f64>,
}

impl LinearSpline {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        check_knots(&xs, &ys, 2, "LinearSpline")?;
        let slopes = xs
            .windows(2)
            .zip(ys.windows(2))
            .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
            .collect();
        let intercepts = ys[..ys.len() - 1].to_vec();
        Ok(Self {
            xs,
            intercepts,
            slopes,
        })
    }

    pub fn knots(&self) -> &[f64] {
        &self.xs
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    pub fn interpolate(&self, t: f64) -> f64 {
        let k = segment_index(&self.xs, t);
        self.intercepts[k] + (t - self.xs[k]) * self.slopes[k]
    }

    pub fn differentiate(&self, t: f64) -> f64 {
        self.slopes[segment_index(&self.xs, t)]
    }

    pub fn differentiate2(&self, _t: f64) -> f64 {
        0.0
    }
}

/// Akima cubic spline: a Hermite spline whose knot derivatives are a
/// weighted average of the neighbouring slopes, which keeps it from
/// overshooting around outliers.
#[derive(Debug, Clone, PartialEq)]
pub struct AkimaSpline {
    xs: Vec<f64>,
    c0: Vec<f64>,
    c1: Vec<f64>,
    c2: Vec<f64>,
    c3: Vec<f64>,
}

// Derivative at xs[index_t] of the parabola through three knots.
fn differentiate_three_point(
    xs: &[f64],
    ys: &[f64],
    index_t: usize,
    index0: usize,
    index1: usize,
    index2: usize,
) -> f64 {
    let x0 = ys[index0];
    let x1 = ys[index1];
    let x2 = ys[index2];
    let t = xs[index_t] - xs[index0];
    let t1 = xs[index1] - xs[index0];
    let t2 = xs[index2] - xs[index0];
    let a = (x2 - x0 - (t2 / t1 * (x1 - x0))) / (t2 * t2 - t1 * t2);
    let b = (x1 - x0 - a * t1 * t1) / t1;
    (2.0 * a * t) + b
}

impl AkimaSpline {
    pub const MIN_POINTS: usize = 5;

    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        check_knots(&xs, &ys, Self::MIN_POINTS, "AkimaSpline")?;
        let n = xs.len();

        let m: Vec<f64> = (0..n - 1)
            .map(|i| (ys[i + 1] - ys[i]) / (xs[i + 1] - xs[i]))
            .collect();
        let mut w = vec![0.0; n - 1];
        for i in 1..n - 1 {
            w[i] = (m[i] - m[i - 1]).abs();
        }

        let mut dd = vec![0.0; n];
        for i in 2..n - 2 {
            let wi1 = w[i - 1];
            let wi2 = w[i + 1];
            dd[i] = if wi1.abs() < ZERO_TOLERANCE && wi2.abs() < ZERO_TOLERANCE {
                ((xs[i + 1] - xs[i]) * m[i - 1] + (xs[i] - xs[i - 1]) * m[i])
                    / (xs[i + 1] - xs[i - 1])
            } else {
                (wi2 * m[i - 1] + wi1 * m[i]) / (wi2 + wi1)
            };
        }
        dd[0] = differentiate_three_point(&xs, &ys, 0, 0, 1, 2);
        dd[1] = differentiate_three_point(&xs, &ys, 1, 0, 1, 2);
        dd[n - 2] = differentiate_three_point(&xs, &ys, n - 2, n - 3, n - 2, n - 1);
        dd[n - 1] = differentiate_three_point(&xs, &ys, n - 1, n - 3, n - 2, n - 1);

        let mut c0 = Vec::with_capacity(n - 1);
        let mut c1 = Vec::with_capacity(n - 1);
        let mut c2 = Vec::with_capacity(n - 1);
        let mut c3 = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            let width = xs[i + 1] - xs[i];
            let w2 = width * width;
            c0.push(ys[i]);
            c1.push(dd[i]);
            c2.push((3.0 * (ys[i + 1] - ys[i]) / width - 2.0 * dd[i] - dd[i + 1]) / width);
            c3.push((2.0 * (ys[i] - ys[i + 1]) / width + dd[i] + dd[i + 1]) / w2);
        }

        Ok(Self { xs, c0, c1, c2, c3 })
    }

    pub fn interpolate(&self, t: f64) -> f64 {
        let k = segment_index(&self.xs, t);
        let x = t - self.xs[k];
        self.c0[k] + x * (self.c1[k] + x * (self.c2[k] + x * self.c3[k]))
    }

    pub fn differentiate(&self, t: f64) -> f64 {
        let k = segment_index(&self.xs, t);
        let x = t - self.xs[k];
        self.c1[k] + x * (2.0 * self.c2[k] + x * 3.0 * self.c3[k])
    }

    pub fn differentiate2(&self, t: f64) -> f64 {
        let k = segment_index(&self.xs, t);
        let x = t - self.xs[k];
        2.0 * self.c2[k] + x * 6.0 * self.c3[k]
    }

    /// Points where the first derivative is zero, in ascending order.
    pub fn stationary_points(&self) -> Vec<f64> {
        let mut points = Vec::new();
        for k in 0..self.xs.len() - 1 {
            let a = 6.0 * self.c3[k];
            let b = 2.0 * self.c2[k];
            let c = self.c1[k];
            let len = self.xs[k + 1] - self.xs[k];
            let mut push = |t: f64| {
                if (0.0..=len).contains(&t) {
                    points.push(self.xs[k] + t);
                }
            };
            // Quadratic term negligible over the segment: solve the linear one.
            if a.abs() * len * len <= ZERO_TOLERANCE * (b.abs() * len + c.abs()) {
                if b != 0.0 {
                    push(-c / b);
                }
                continue;
            }
            let d = b * b - 2.0 * a * c;
            if d == 0.0 {
                push(-b / a);
            } else if d > 0.0 {
                let sq = d.sqrt();
                push((-b + sq) / a);
                push((-b - sq) / a);
            }
        }
        points.sort_by(|a, b| a.total_cmp(b));
        // A root on a knot shows up in both neighbouring segments.
        points.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_spline() {
        let spline = LinearSpline::new(vec![0.0, 1.0, 3.0], vec![0.0, 10.0, 0.0]).unwrap();
        assert_eq!(spline.interpolate(0.5), 5.0);
        assert_eq!(spline.interpolate(2.0), 5.0);
        assert_eq!(spline.differentiate(1.0), -5.0);
        assert_eq!(spline.differentiate(0.2), 10.0);
        // Extrapolates with the end segments.
        assert_eq!(spline.interpolate(-1.0), -10.0);
        assert_eq!(spline.differentiate2(2.0), 0.0);
    }

    #[test]
    fn test_akima_passes_through_knots() {
        let xs: Vec<f64> = (0..8).map(|x| x as f64).collect();
        let ys = vec![0.0, 1.0, 4.0, 9.0, 4.0, 1.0, 0.0, 0.0];
        let spline = AkimaSpline::new(xs.clone(), ys.clone()).unwrap();
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert!((spline.interpolate(*x) - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_akima_reproduces_lines() {
        let xs: Vec<f64> = (0..6).map(|x| x as f64 * 0.5).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x + 1.0).collect();
        let spline = AkimaSpline::new(xs, ys).unwrap();
        assert!((spline.interpolate(1.3) - 3.6).abs() < 1e-9);
        assert!((spline.differentiate(1.3) - 2.0).abs() < 1e-9);
        assert!(spline.stationary_points().is_empty());
    }

    #[test]
    fn test_akima_stationary_point_of_symmetric_peak() {
        let xs: Vec<f64> = (0..11).map(|x| x as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 25.0 - (x - 5.0) * (x - 5.0)).collect();
        let spline = AkimaSpline::new(xs, ys).unwrap();
        let points = spline.stationary_points();
        assert_eq!(points.len(), 1);
        assert!((points[0] - 5.0).abs() < 1e-9);
        assert!(spline.differentiate2(points[0]) < 0.0);
    }

    #[test]
    fn test_akima_needs_five_points() {
        assert!(AkimaSpline::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0; 4]).is_err());
    }
}
