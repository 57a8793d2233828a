//! Isotope-envelope peak finding around identifications.

use crate::errors::Result;
use crate::isotopes::{
    C13_MINUS_C12,
    IsotopeDistribution,
};
use crate::models::{
    ChromatographicPeak,
    DetectionType,
    Identification,
    IsotopicEnvelope,
};
use crate::utils::correlation::pearson_correlation;
use std::collections::HashSet;
use std::sync::Arc;
use xicindex::utils::{
    to_mass,
    to_mz,
};
use xicindex::{
    IndexedPeak,
    MzTolerance,
    PeakIndexingEngine,
    ScanIndex,
    SpectraFileInfo,
    XicQuery,
};

/// Minimum Pearson correlation between observed and expected isotope
/// intensities for an envelope to be accepted.
pub const MIN_ENVELOPE_CORRELATION: f64 = 0.7;

/// How much better a mass-shifted envelope may correlate before the
/// unshifted one is rejected.
const SHIFTED_CORRELATION_MARGIN: f64 = 0.1;

/// Peaks with fewer envelopes are never split.
const MIN_ENVELOPES_TO_CUT: usize = 5;

#[derive(Debug, Clone, Copy)]
struct IsotopePoint {
    experimental: f64,
    theoretical: f64,
    mass: f64,
}

fn correlation(points: &[IsotopePoint]) -> f64 {
    if points.is_empty() {
        return f64::NAN;
    }
    let experimental: Vec<f64> = points.iter().map(|x| x.experimental).collect();
    let theoretical: Vec<f64> = points.iter().map(|x| x.theoretical).collect();
    pearson_correlation(&experimental, &theoretical).unwrap_or(f64::NAN)
}

/// Peak finding against the index of one file.
pub struct PeakFinder<'a> {
    pub index: &'a PeakIndexingEngine,
    pub peakfinding_tolerance: MzTolerance,
    pub ppm_tolerance: MzTolerance,
    pub isotope_tolerance: MzTolerance,
    pub num_isotopes_required: usize,
    pub missed_scans_allowed: usize,
    pub discrimination_factor: f64,
    pub integrate: bool,
}

impl<'a> PeakFinder<'a> {
    pub fn file(&self) -> &Arc<SpectraFileInfo> {
        self.index.file()
    }

    /// Isotope envelopes of `id` in the peaks of a chromatogram.
    ///
    /// Each peak is taken as the most abundant isotope; the rest of the
    /// envelope is looked up in the same scan, walking away from it until an
    /// isotope is missing or more than four-fold off its expected intensity.
    /// The same walk is repeated one C13 spacing lighter and heavier, and the
    /// envelope is rejected when one of those fits better.
    pub fn isotopic_envelopes(
        &self,
        xic: &[IndexedPeak],
        id: &Identification,
        charge: i32,
    ) -> Result<Vec<IsotopicEnvelope>> {
        let dist = IsotopeDistribution::averagine(id.monoisotopic_mass, self.num_isotopes_required);
        let n = dist.len();
        if n < self.num_isotopes_required {
            return Ok(Vec::new());
        }
        let pf_index = dist.most_abundant_index();

        let mut out = Vec::new();
        for peak in xic {
            let observed_error = to_mass(peak.mz, charge) - id.peakfinding_mass;
            let mut experimental = vec![0.0; n];
            let mut by_shift: [Vec<IsotopePoint>; 3] = Default::default();

            for (slot, shift) in [-1.0, 0.0, 1.0].into_iter().enumerate() {
                for direction in [-1i64, 1] {
                    let mut i = if direction < 0 {
                        pf_index as i64 - 1
                    } else {
                        pf_index as i64
                    };
                    while i >= 0 && (i as usize) < n {
                        let k = i as usize;
                        let mass = id.monoisotopic_mass
                            + observed_error
                            + dist.mass_shifts[k]
                            + shift * C13_MINUS_C12;
                        let theoretical = dist.abundances[k] * peak.intensity;
                        let Some(found) = self.index.get_indexed_peak(
                            to_mz(mass, charge),
                            peak.scan_index,
                            &self.isotope_tolerance,
                        )?
                        else {
                            break;
                        };
                        if found.intensity < theoretical / 4.0 || found.intensity > theoretical * 4.0 {
                            break;
                        }
                        by_shift[slot].push(IsotopePoint {
                            experimental: found.intensity,
                            theoretical,
                            mass,
                        });
                        if shift == 0.0 {
                            experimental[k] = found.intensity;
                        }
                        i += direction;
                    }
                }
            }

            if by_shift[1].len() < self.num_isotopes_required {
                continue;
            }
            if !self.envelope_correlates(&mut by_shift, peak, charge)? {
                continue;
            }

            // Isotopes that were not seen are imputed from the peak-finding one.
            let anchor = experimental[pf_index];
            for (k, value) in experimental.iter_mut().enumerate() {
                if *value == 0.0 {
                    *value = dist.abundances[k] * anchor;
                }
            }
            out.push(IsotopicEnvelope::new(*peak, charge, experimental.iter().sum()));
        }
        Ok(out)
    }

    // Slot 1 of `by_shift` holds the unshifted envelope, slots 0 and 2 the
    // ones a C13 spacing lighter and heavier.
    fn envelope_correlates(
        &self,
        by_shift: &mut [Vec<IsotopePoint>; 3],
        peak: &IndexedPeak,
        charge: i32,
    ) -> Result<bool> {
        let corr = correlation(&by_shift[1]);

        // A peak one spacing below the lightest isotope should not be there.
        for points in by_shift.iter_mut() {
            let Some(lightest) = points
                .iter()
                .map(|x| x.mass)
                .min_by(|a, b| a.total_cmp(b))
            else {
                continue;
            };
            let unexpected_mass = lightest - C13_MINUS_C12;
            let found = self.index.get_indexed_peak(
                to_mz(unexpected_mass, charge),
                peak.scan_index,
                &self.isotope_tolerance,
            )?;
            points.push(IsotopePoint {
                experimental: found.map_or(0.0, |x| x.intensity),
                theoretical: 0.0,
                mass: unexpected_mass,
            });
        }

        let padded = correlation(&by_shift[1]);
        let or_worst = |x: f64| if x.is_nan() { -1.0 } else { x };
        let lighter = or_worst(correlation(&by_shift[0]));
        let heavier = or_worst(correlation(&by_shift[2]));

        Ok(corr > MIN_ENVELOPE_CORRELATION
            && lighter - padded < SHIFTED_CORRELATION_MARGIN
            && heavier - padded < SHIFTED_CORRELATION_MARGIN)
    }

    /// Finds the peak of an identification in this file.
    ///
    /// `charges` are the charge states searched when the identification's own
    /// charge is not enforced. The result always carries the identification,
    /// with no envelopes if nothing was found.
    pub fn quantify_identification(
        &self,
        id: &Arc<Identification>,
        charges: &[i32],
        id_specific_charge_state: bool,
    ) -> Result<ChromatographicPeak> {
        let mut peak = ChromatographicPeak::new(id.clone(), self.file().clone(), DetectionType::Msms);
        let own_charge = [id.precursor_charge];
        let charges = if id_specific_charge_state {
            &own_charge[..]
        } else {
            charges
        };

        for &charge in charges {
            let query = XicQuery::new(id.peakfinding_mass, charge, id.ms2_retention_time)
                .with_missed_scans(self.missed_scans_allowed);
            let mut xic = self.index.get_xic(&query, &self.peakfinding_tolerance)?;
            xic.retain(|x| {
                self.ppm_tolerance
                    .within(to_mass(x.mz, charge), id.peakfinding_mass)
            });
            let envelopes = self.isotopic_envelopes(&xic, id, charge)?;
            peak.envelopes.extend(envelopes);
        }

        peak.calculate_intensity(self.integrate);
        cut_peak(
            &mut peak,
            id.ms2_retention_time,
            self.discrimination_factor,
            self.integrate,
        );
        if peak.envelopes.is_empty() {
            return Ok(peak);
        }

        // Other charge states only count within the elution of the precursor charge.
        let precursor_scans = peak
            .envelopes
            .iter()
            .filter(|x| x.charge == id.precursor_charge)
            .map(|x| x.peak.scan_index);
        match (precursor_scans.clone().min(), precursor_scans.max()) {
            (Some(first), Some(last)) => {
                peak.envelopes
                    .retain(|x| first <= x.peak.scan_index && x.peak.scan_index <= last);
            }
            _ => peak.envelopes.clear(),
        }
        peak.calculate_intensity(self.integrate);
        Ok(peak)
    }
}

/// Splits a peak at the first deep valley on either side of its apex.
///
/// Looks at the apex charge state only. A valley is deep when the signal
/// rises again above it by more than `factor` (relative to the risen
/// intensity), confirmed either by the point after the valley or by a gap in
/// the scans. The side that does not contain `identification_rt` is dropped,
/// valley included, and the search repeats on what is left.
pub fn cut_peak(
    peak: &mut ChromatographicPeak,
    identification_rt: f64,
    factor: f64,
    integrate: bool,
) {
    loop {
        if peak.envelopes.len() < MIN_ENVELOPES_TO_CUT {
            return;
        }
        let Some(apex) = peak.apex else {
            return;
        };
        let mut timepoints: Vec<IsotopicEnvelope> = peak
            .envelopes
            .iter()
            .filter(|x| x.charge == apex.charge)
            .copied()
            .collect();
        timepoints.sort_by_key(|x| x.peak.scan_index);
        let Some(apex_index) = timepoints
            .iter()
            .position(|x| x.peak.key() == apex.peak.key())
        else {
            return;
        };
        let scans: HashSet<ScanIndex> = timepoints.iter().map(|x| x.peak.scan_index).collect();
        let Some(valley) = find_valley(&timepoints, apex_index, &scans, factor) else {
            return;
        };

        let valley_rt = valley.peak.retention_time;
        if identification_rt > valley_rt {
            peak.envelopes.retain(|x| x.peak.retention_time > valley_rt);
        } else {
            peak.envelopes.retain(|x| x.peak.retention_time < valley_rt);
        }
        peak.split_rt = Some(valley_rt);
        peak.calculate_intensity(integrate);
    }
}

fn find_valley(
    timepoints: &[IsotopicEnvelope],
    apex_index: usize,
    scans: &HashSet<ScanIndex>,
    factor: f64,
) -> Option<IsotopicEnvelope> {
    let in_bounds = |i: i64| i >= 0 && (i as usize) < timepoints.len();
    for direction in [1i64, -1] {
        let mut valley: Option<(usize, IsotopicEnvelope)> = None;
        let mut i = apex_index as i64 + direction;
        while in_bounds(i) {
            let current = timepoints[i as usize];
            if valley.is_none_or(|(_, v)| current.intensity < v.intensity) {
                valley = Some((i as usize, current));
            }
            let (valley_index, valley_env) = valley?;

            let discrimination = (current.intensity - valley_env.intensity) / current.intensity;
            let next = valley_index as i64 + direction;
            if discrimination > factor && in_bounds(next) {
                let second = timepoints[next as usize];
                if (current.intensity - second.intensity) / current.intensity > factor {
                    return Some(valley_env);
                }
                let next_scan = valley_env.peak.scan_index.index as i64 + direction;
                if next_scan < 0 || !scans.contains(&ScanIndex::new(next_scan as u32)) {
                    return Some(valley_env);
                }
            }
            i += direction;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use xicindex::Ms1Scan;

    fn file() -> Arc<SpectraFileInfo> {
        Arc::new(SpectraFileInfo::new("a.mzML", "a", 0, 0, 0))
    }

    fn envelope(scan: u32, intensity: f64) -> IsotopicEnvelope {
        IsotopicEnvelope::new(
            IndexedPeak {
                mz: 500.0,
                intensity,
                scan_index: ScanIndex::new(scan),
                retention_time: 10.0 + scan as f64 * 0.1,
            },
            2,
            intensity,
        )
    }

    fn peak_from(intensities: &[f64]) -> ChromatographicPeak {
        let id = Arc::new(Identification::new(file(), "PEPTIDE", "PEPTIDE", 998.0, 10.0, 2, vec![]));
        let mut peak = ChromatographicPeak::new(id, file(), DetectionType::Msms);
        peak.envelopes = intensities
            .iter()
            .enumerate()
            .map(|(i, x)| envelope(i as u32, *x))
            .collect();
        peak.calculate_intensity(false);
        peak
    }

    #[test]
    fn test_cut_peak_at_valley() {
        // Two bumps, the right one taller; the identification sits on the left one.
        let mut peak = peak_from(&[10.0, 50.0, 80.0, 6.0, 5.0, 60.0, 100.0, 90.0, 30.0]);
        cut_peak(&mut peak, 10.2, 0.6, false);
        assert!((peak.split_rt.unwrap() - 10.4).abs() < 1e-9);
        assert_eq!(peak.envelopes.len(), 4);
        assert_eq!(peak.intensity, 80.0);

        let mut peak = peak_from(&[10.0, 50.0, 80.0, 6.0, 5.0, 60.0, 100.0, 90.0, 30.0]);
        cut_peak(&mut peak, 10.6, 0.6, false);
        assert_eq!(peak.envelopes.len(), 4);
        assert_eq!(peak.intensity, 100.0);
    }

    #[test]
    fn test_cut_peak_keeps_single_bump() {
        let mut peak = peak_from(&[10.0, 50.0, 80.0, 100.0, 70.0, 40.0, 20.0]);
        cut_peak(&mut peak, 10.3, 0.6, false);
        assert!(peak.split_rt.is_none());
        assert_eq!(peak.envelopes.len(), 7);

        let mut short = peak_from(&[10.0, 100.0, 5.0, 100.0]);
        cut_peak(&mut short, 10.1, 0.6, false);
        assert_eq!(short.envelopes.len(), 4);
    }

    fn scans_with_envelope(mass: f64, charge: i32, scale: &[f64]) -> Vec<Ms1Scan> {
        let dist = IsotopeDistribution::averagine(mass, 2);
        scale
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let peaks: Vec<(f64, f64)> = dist
                    .mass_shifts
                    .iter()
                    .zip(dist.abundances.iter())
                    .map(|(shift, abundance)| (to_mz(mass + shift, charge), abundance * s))
                    .collect();
                Ms1Scan::from_pairs(10.0 + i as f64 * 0.1, &peaks)
            })
            .collect()
    }

    fn finder(index: &PeakIndexingEngine) -> PeakFinder<'_> {
        PeakFinder {
            index,
            peakfinding_tolerance: MzTolerance::Ppm(20.0),
            ppm_tolerance: MzTolerance::Ppm(10.0),
            isotope_tolerance: MzTolerance::Ppm(5.0),
            num_isotopes_required: 2,
            missed_scans_allowed: 1,
            discrimination_factor: 0.6,
            integrate: false,
        }
    }

    #[test]
    fn test_quantify_identification() {
        let mass = 1000.0;
        let scans = scans_with_envelope(mass, 2, &[1e4, 5e4, 1e5, 5e4, 1e4]);
        let (index, _) = PeakIndexingEngine::build(file(), scans).unwrap();
        let dist = IsotopeDistribution::averagine(mass, 2);
        let mut id = Identification::new(file(), "PEPTIDE", "PEPTIDE", mass, 10.2, 2, vec![]);
        id.peakfinding_mass = mass + dist.peakfinding_shift();
        let id = Arc::new(id);

        let peak = finder(&index)
            .quantify_identification(&id, &[2], true)
            .unwrap();
        assert_eq!(peak.envelopes.len(), 5);
        let apex = peak.apex.unwrap();
        assert!((apex.peak.retention_time - 10.2).abs() < 1e-9);
        let expected: f64 = dist.abundances.iter().map(|x| x * 1e5).sum();
        assert!((peak.intensity - expected).abs() / expected < 1e-6);
        assert_eq!(peak.num_charge_states_observed, 1);
    }

    #[test]
    fn test_missing_target_gives_empty_peak() {
        let scans = scans_with_envelope(1000.0, 2, &[1e4, 5e4, 1e5]);
        let (index, _) = PeakIndexingEngine::build(file(), scans).unwrap();
        let id = Arc::new(Identification::new(file(), "PEPTIDE", "PEPTIDE", 1500.0, 10.1, 2, vec![]));
        let peak = finder(&index)
            .quantify_identification(&id, &[1, 2, 3], false)
            .unwrap();
        assert!(peak.envelopes.is_empty());
        assert_eq!(peak.intensity, 0.0);
        assert_eq!(peak.identifications.len(), 1);
    }
}
