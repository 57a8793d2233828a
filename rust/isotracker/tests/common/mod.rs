//! Synthetic LC-MS runs with Gaussian elution profiles.

#![allow(dead_code)]

use isotracker::Identification;
use isotracker::isotopes::IsotopeDistribution;
use std::sync::Arc;
use xicindex::utils::to_mz;
use xicindex::{
    InMemorySpectra,
    Ms1Scan,
    SpectraFileInfo,
};

pub const CHARGE: i32 = 2;
pub const SCAN_SPACING: f64 = 0.05;
pub const FIRST_RT: f64 = 10.0;
pub const LAST_RT: f64 = 35.0;
pub const PEAK_SD: f64 = 0.3;
pub const AMPLITUDE: f64 = 1e6;

/// One eluting species.
#[derive(Debug, Clone, Copy)]
pub struct Feature {
    pub mass: f64,
    pub apex_rt: f64,
    pub amplitude: f64,
}

impl Feature {
    pub fn new(mass: f64, apex_rt: f64) -> Self {
        Self {
            mass,
            apex_rt,
            amplitude: AMPLITUDE,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    fn intensity_at(&self, rt: f64) -> f64 {
        let z = (rt - self.apex_rt) / PEAK_SD;
        self.amplitude * (-0.5 * z * z).exp()
    }
}

/// Scans every [`SCAN_SPACING`] minutes carrying the averagine envelope of
/// every feature at [`CHARGE`], plus one unrelated peak.
pub fn synthetic_scans(features: &[Feature]) -> Vec<Ms1Scan> {
    let num_scans = ((LAST_RT - FIRST_RT) / SCAN_SPACING).round() as usize + 1;
    (0..num_scans)
        .map(|i| {
            let rt = FIRST_RT + i as f64 * SCAN_SPACING;
            let mut peaks: Vec<(f64, f64)> = vec![(300.0, 100.0)];
            for feature in features {
                let height = feature.intensity_at(rt);
                let dist = IsotopeDistribution::averagine(feature.mass, 2);
                for (shift, abundance) in dist.mass_shifts.iter().zip(dist.abundances.iter()) {
                    let intensity = height * abundance;
                    if intensity < 1.0 {
                        continue;
                    }
                    let mz = to_mz(feature.mass + shift, CHARGE);
                    match peaks.iter_mut().find(|(x, _)| (*x - mz).abs() < 1e-9) {
                        Some((_, existing)) => *existing += intensity,
                        None => peaks.push((mz, intensity)),
                    }
                }
            }
            peaks.sort_by(|a, b| a.0.total_cmp(&b.0));
            Ms1Scan::from_pairs(rt, &peaks)
        })
        .collect()
}

pub fn spectra_file(name: &str, biorep: u32) -> Arc<SpectraFileInfo> {
    Arc::new(SpectraFileInfo::new(
        format!("{}.tsv", name),
        "control",
        biorep,
        0,
        0,
    ))
}

pub fn spectra(runs: &[(&Arc<SpectraFileInfo>, Vec<Feature>)]) -> InMemorySpectra {
    let mut out = InMemorySpectra::new();
    for (file, features) in runs {
        out.insert(file, synthetic_scans(features));
    }
    out
}

pub fn identification(
    file: &Arc<SpectraFileInfo>,
    base_sequence: &str,
    modified_sequence: &str,
    mass: f64,
    rt: f64,
) -> Identification {
    let protein = Arc::new(isotracker::ProteinGroup::new("P12345", "GENE1", "Human"));
    Identification::new(
        file.clone(),
        base_sequence,
        modified_sequence,
        mass,
        rt,
        CHARGE,
        vec![protein],
    )
}
