//! Theoretical isotope envelopes from the averagine model.
//!
//! The number of extra neutrons follows a Poisson distribution whose mean
//! grows linearly with the peptide mass.

/// Mass difference between 13C and 12C.
pub const C13_MINUS_C12: f64 = 1.003_354_838_1;

/// Isotopes with a normalized abundance at or below this are only kept to
/// reach the minimum number of isotopes.
pub const MIN_ISOTOPE_ABUNDANCE: f64 = 0.1;

const MAX_ISOTOPES: i32 = 20;

/// Mean of the Poisson distribution of extra neutrons at a given mass.
pub fn lam(mass: f64, slope: f64, intercept: f64) -> f64 {
    slope * mass + intercept
}

fn factorial(n: i32) -> f64 {
    (1..=n).fold(1.0, |acc, x| acc * x as f64)
}

fn poisson_weights(mass: f64, num_peaks: i32) -> Vec<f64> {
    let lam_val = lam(mass, 0.000594, -0.03091).max(0.0);
    let exp = (-lam_val).exp();
    (0..num_peaks)
        .map(|k| exp * lam_val.powi(k) / factorial(k))
        .collect()
}

/// Expected isotopes of a peptide, relative to its monoisotopic mass.
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeDistribution {
    /// Mass shift of each kept isotope from the monoisotopic mass, ascending.
    pub mass_shifts: Vec<f64>,
    /// Abundance of each kept isotope, the most abundant one being 1.0.
    pub abundances: Vec<f64>,
}

impl IsotopeDistribution {
    /// Builds the envelope for a monoisotopic mass.
    ///
    /// ```
    /// use isotracker::isotopes::IsotopeDistribution;
    ///
    /// let dist = IsotopeDistribution::averagine(500.0, 2);
    /// assert_eq!(dist.mass_shifts.len(), 2);
    /// assert_eq!(dist.abundances[0], 1.0);
    /// ```
    pub fn averagine(monoisotopic_mass: f64, num_isotopes_required: usize) -> Self {
        let weights = poisson_weights(monoisotopic_mass, MAX_ISOTOPES);
        let max = weights.iter().cloned().fold(0.0, f64::max);
        let mut mass_shifts = Vec::new();
        let mut abundances = Vec::new();
        for (k, w) in weights.iter().enumerate() {
            let normalized = if max > 0.0 { w / max } else { 0.0 };
            if mass_shifts.len() < num_isotopes_required || normalized > MIN_ISOTOPE_ABUNDANCE {
                mass_shifts.push(k as f64 * C13_MINUS_C12);
                abundances.push(normalized);
            }
        }
        Self {
            mass_shifts,
            abundances,
        }
    }

    /// Position of the most abundant isotope. Ties resolve to the lighter one.
    pub fn most_abundant_index(&self) -> usize {
        let mut best = 0;
        for (i, a) in self.abundances.iter().enumerate() {
            if *a > self.abundances[best] {
                best = i;
            }
        }
        best
    }

    /// Mass shift of the isotope used to extract chromatograms.
    pub fn peakfinding_shift(&self) -> f64 {
        self.mass_shifts
            .get(self.most_abundant_index())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn min_shift(&self) -> f64 {
        self.mass_shifts.first().copied().unwrap_or(0.0)
    }

    pub fn max_shift(&self) -> f64 {
        self.mass_shifts.last().copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.mass_shifts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass_shifts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_peptide_is_monoisotopic_dominant() {
        let dist = IsotopeDistribution::averagine(1000.0, 2);
        assert_eq!(dist.most_abundant_index(), 0);
        assert_eq!(dist.peakfinding_shift(), 0.0);
        // 1.0, 0.56, 0.16 are kept, 0.03 is not
        assert_eq!(dist.len(), 3);
        assert!((dist.abundances[1] - 0.563).abs() < 1e-3);
    }

    #[test]
    fn test_heavy_peptide_shifts_peakfinding_isotope() {
        let dist = IsotopeDistribution::averagine(3000.0, 2);
        assert_eq!(dist.most_abundant_index(), 1);
        assert!((dist.peakfinding_shift() - C13_MINUS_C12).abs() < 1e-12);
        assert_eq!(dist.abundances[1], 1.0);
    }

    #[test]
    fn test_minimum_isotopes_are_always_kept() {
        let dist = IsotopeDistribution::averagine(10.0, 3);
        assert_eq!(dist.len(), 3);
        assert_eq!(dist.abundances, vec![1.0, 0.0, 0.0]);
    }
}
