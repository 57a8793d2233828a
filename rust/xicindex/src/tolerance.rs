use crate::errors::ToleranceError;
use crate::utils::{
    TupleRange,
    ppm_error,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Symmetric m/z tolerance.
///
/// Convention: the value is the half-width of the window, so a tolerance of
/// `Absolute(1.0)` on a value of 10 means a range of (9, 11).
///
/// ```
/// use xicindex::MzTolerance;
///
/// let tol: MzTolerance = serde_json::from_str(r#"{"ppm": 10.0}"#).unwrap();
/// assert_eq!(tol, MzTolerance::Ppm(10.0));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MzTolerance {
    #[serde(rename = "da")]
    Absolute(f64),
    #[serde(rename = "ppm")]
    Ppm(f64),
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance::Ppm(10.0)
    }
}

impl MzTolerance {
    // ============================================================================
    // Validation
    // ============================================================================

    /// Rejects tolerances that are zero, negative or not finite.
    ///
    /// ```
    /// use xicindex::MzTolerance;
    ///
    /// assert!(MzTolerance::Ppm(10.0).validate().is_ok());
    /// assert!(MzTolerance::Ppm(0.0).validate().is_err());
    /// assert!(MzTolerance::Absolute(f64::NAN).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), ToleranceError> {
        let value = match self {
            MzTolerance::Absolute(x) => *x,
            MzTolerance::Ppm(x) => *x,
        };
        if !value.is_finite() {
            return Err(ToleranceError::NotFinite(value));
        }
        if value <= 0.0 {
            return Err(ToleranceError::NonPositive(value));
        }
        Ok(())
    }

    // ============================================================================
    // Ranges
    // ============================================================================

    /// Half-width of the window around `mz`, in daltons.
    pub fn half_width(&self, mz: f64) -> f64 {
        match self {
            MzTolerance::Absolute(x) => *x,
            MzTolerance::Ppm(x) => mz * x / 1e6,
        }
    }

    /// Range of m/z values accepted around `mz`.
    ///
    /// ```
    /// use xicindex::MzTolerance;
    ///
    /// let range = MzTolerance::Ppm(20.0).mz_range(500.0).unwrap();
    /// // For 500 Da at 20 ppm: ±0.01 Da
    /// assert!((range.start() - 499.99).abs() < 1e-9);
    /// assert!((range.end() - 500.01).abs() < 1e-9);
    /// ```
    pub fn mz_range(&self, mz: f64) -> Result<TupleRange<f64>, ToleranceError> {
        self.validate()?;
        if !mz.is_finite() {
            return Err(ToleranceError::NotFinite(mz));
        }
        let half = self.half_width(mz);
        TupleRange::try_new(mz - half, mz + half).map_err(|_| ToleranceError::NotFinite(mz))
    }

    /// Whether `observed` lies within tolerance of `theoretical`.
    pub fn within(&self, observed: f64, theoretical: f64) -> bool {
        match self {
            MzTolerance::Absolute(x) => (observed - theoretical).abs() <= *x,
            MzTolerance::Ppm(x) => ppm_error(observed, theoretical).abs() <= *x,
        }
    }
}
