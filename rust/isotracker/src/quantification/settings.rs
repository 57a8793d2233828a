use crate::errors::ConfigurationError;
use crate::isobaric::IsoTrackerIdFilter;
use crate::xic_groups::SharedPeakSettings;
use serde::{
    Deserialize,
    Serialize,
};
use xicindex::MzTolerance;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsoTrackerSettings {
    pub enabled: bool,
    /// Only track groups identified at least twice in one run.
    pub require_multiple_ids_in_one_file: bool,
    /// Residues a modification has to sit on to be tracked. Empty tracks all.
    pub motifs: Vec<char>,
    /// Minutes added on each side of the identifications when extracting.
    pub xic_rt_padding: f64,
    pub shared_peaks: SharedPeakSettings,
}

impl Default for IsoTrackerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            require_multiple_ids_in_one_file: true,
            motifs: Vec::new(),
            xic_rt_padding: 3.0,
            shared_peaks: SharedPeakSettings::default(),
        }
    }
}

impl IsoTrackerSettings {
    pub fn id_filter(&self) -> Result<Option<IsoTrackerIdFilter>, ConfigurationError> {
        if self.motifs.is_empty() {
            return Ok(None);
        }
        IsoTrackerIdFilter::new(&self.motifs).map(Some)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub ppm_tolerance: f64,
    pub peakfinding_ppm_tolerance: f64,
    pub isotope_ppm_tolerance: f64,
    pub num_isotopes_required: usize,
    pub missed_scans_allowed: usize,
    pub id_specific_charge_state: bool,
    pub integrate: bool,
    pub discrimination_factor_to_cut_peak: f64,

    pub match_between_runs: bool,
    pub mbr_ppm_tolerance: f64,
    /// Width (min) of the window searched around the predicted time.
    pub mbr_rt_window: f64,
    pub require_msms_id_in_condition: bool,

    pub normalize: bool,
    pub quantify_ambiguous_peptides: bool,
    pub use_shared_peptides_for_protein_quant: bool,

    /// Worker threads for the run; the ambient rayon pool when unset.
    pub max_threads: Option<usize>,
    pub isotracker: IsoTrackerSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ppm_tolerance: 10.0,
            peakfinding_ppm_tolerance: 20.0,
            isotope_ppm_tolerance: 5.0,
            num_isotopes_required: 2,
            missed_scans_allowed: 1,
            id_specific_charge_state: false,
            integrate: false,
            discrimination_factor_to_cut_peak: 0.6,
            match_between_runs: false,
            mbr_ppm_tolerance: 10.0,
            mbr_rt_window: 2.5,
            require_msms_id_in_condition: false,
            normalize: false,
            quantify_ambiguous_peptides: false,
            use_shared_peptides_for_protein_quant: false,
            max_threads: None,
            isotracker: IsoTrackerSettings::default(),
        }
    }
}

fn ppm(field: &'static str, value: f64) -> Result<MzTolerance, ConfigurationError> {
    let tol = MzTolerance::Ppm(value);
    tol.validate()
        .map_err(|source| ConfigurationError::InvalidTolerance { field, source })?;
    Ok(tol)
}

fn check(field: &'static str, ok: bool, reason: impl Into<String>) -> Result<(), ConfigurationError> {
    if ok {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidSetting {
            field,
            reason: reason.into(),
        })
    }
}

impl EngineSettings {
    pub fn tolerance(&self) -> Result<MzTolerance, ConfigurationError> {
        ppm("ppm_tolerance", self.ppm_tolerance)
    }

    pub fn peakfinding_tolerance(&self) -> Result<MzTolerance, ConfigurationError> {
        ppm("peakfinding_ppm_tolerance", self.peakfinding_ppm_tolerance)
    }

    pub fn isotope_tolerance(&self) -> Result<MzTolerance, ConfigurationError> {
        ppm("isotope_ppm_tolerance", self.isotope_ppm_tolerance)
    }

    pub fn mbr_tolerance(&self) -> Result<MzTolerance, ConfigurationError> {
        ppm("mbr_ppm_tolerance", self.mbr_ppm_tolerance)
    }

    /// Rejects every setting the engine could not run with.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.tolerance()?;
        self.peakfinding_tolerance()?;
        self.isotope_tolerance()?;
        self.mbr_tolerance()?;
        check(
            "num_isotopes_required",
            self.num_isotopes_required >= 1,
            "at least one isotope is needed",
        )?;
        let f = self.discrimination_factor_to_cut_peak;
        check(
            "discrimination_factor_to_cut_peak",
            f > 0.0 && f < 1.0,
            format!("expected a value in (0, 1), got {}", f),
        )?;
        check(
            "mbr_rt_window",
            self.mbr_rt_window.is_finite() && self.mbr_rt_window > 0.0,
            format!("expected a positive window, got {}", self.mbr_rt_window),
        )?;
        check(
            "max_threads",
            self.max_threads != Some(0),
            "zero threads requested",
        )?;

        let iso = &self.isotracker;
        check(
            "isotracker.xic_rt_padding",
            iso.xic_rt_padding.is_finite() && iso.xic_rt_padding >= 0.0,
            format!("expected a non-negative padding, got {}", iso.xic_rt_padding),
        )?;
        let shared = &iso.shared_peaks;
        check(
            "isotracker.shared_peaks.count_threshold",
            shared.count_threshold > 0.0 && shared.count_threshold <= 1.0,
            format!("expected a fraction in (0, 1], got {}", shared.count_threshold),
        )?;
        check(
            "isotracker.shared_peaks.rt_tolerance",
            shared.rt_tolerance.is_finite() && shared.rt_tolerance > 0.0,
            format!("expected a positive tolerance, got {}", shared.rt_tolerance),
        )?;
        for (field, value) in [
            ("isotracker.shared_peaks.intensity_cutoff", shared.intensity_cutoff),
            ("isotracker.shared_peaks.trimming_window", shared.trimming_window),
            ("isotracker.shared_peaks.min_peak_width", shared.min_peak_width),
            ("isotracker.shared_peaks.max_rt_shift", shared.max_rt_shift),
        ] {
            check(
                field,
                value.is_finite() && value >= 0.0,
                format!("expected a non-negative value, got {}", value),
            )?;
        }
        iso.id_filter()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let settings: EngineSettings = serde_json::from_str(
            r#"{"ppm_tolerance": 5.0, "isotracker": {"enabled": true, "motifs": ["S", "T"]}}"#,
        )
        .unwrap();
        assert_eq!(settings.ppm_tolerance, 5.0);
        assert_eq!(settings.peakfinding_ppm_tolerance, 20.0);
        assert!(settings.isotracker.enabled);
        assert!(settings.isotracker.require_multiple_ids_in_one_file);
        assert!(settings.isotracker.id_filter().unwrap().is_some());
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let settings = EngineSettings {
            ppm_tolerance: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigurationError::InvalidTolerance {
                field: "ppm_tolerance",
                ..
            })
        ));

        let mut settings = EngineSettings::default();
        settings.isotracker.shared_peaks.count_threshold = 1.5;
        assert!(settings.validate().is_err());

        let mut settings = EngineSettings::default();
        settings.isotracker.motifs = vec!['1'];
        assert!(settings.validate().is_err());
    }
}
