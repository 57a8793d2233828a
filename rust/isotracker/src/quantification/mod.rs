//! The quantification engine: indexes every run, finds the peaks of the
//! identifications, optionally transfers them between runs and tracks
//! isobaric groups, then rolls everything up into results.

pub mod error_checking;
pub mod isotracking;
pub mod mbr;
pub mod normalization;
pub mod peakfinding;
pub mod settings;

pub use settings::{
    EngineSettings,
    IsoTrackerSettings,
};

use crate::errors::{
    ConfigurationError,
    Result,
};
use crate::isobaric::{
    IsobaricPeptideGroup,
    build_isobaric_groups,
    dedup_sorted,
    envelope_target_mz,
    get_target_mz,
};
use crate::isotopes::IsotopeDistribution;
use crate::models::{
    ChromatographicPeak,
    Identification,
};
use crate::results::QuantificationResults;
use error_checking::run_error_checking;
use indicatif::{
    ParallelProgressIterator,
    ProgressStyle,
};
use isotracking::{
    IsoTrackingSettings,
    IsobaricPeakGroup,
    track_group,
};
use mbr::{
    MbrSettings,
    find_mbr_peaks,
};
use normalization::normalization_factors;
use peakfinding::PeakFinder;
use rayon::prelude::*;
use std::collections::{
    BTreeMap,
    BTreeSet,
    HashSet,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{
    error,
    info,
    instrument,
};
use xicindex::{
    MzTolerance,
    PeakIndexingEngine,
    SpectraFileInfo,
    SpectraSource,
};

struct FileQuantification {
    file: Arc<SpectraFileInfo>,
    index: Option<PeakIndexingEngine>,
    peaks: Vec<ChromatographicPeak>,
}

impl FileQuantification {
    fn empty(file: &Arc<SpectraFileInfo>) -> Self {
        Self {
            file: file.clone(),
            index: None,
            peaks: Vec::new(),
        }
    }
}

pub struct QuantificationEngine {
    identifications: Vec<Arc<Identification>>,
    files: Vec<Arc<SpectraFileInfo>>,
    settings: EngineSettings,
}

impl QuantificationEngine {
    /// Validates the settings and prepares the identifications.
    ///
    /// The runs to quantify are the ones the identifications come from.
    pub fn new(identifications: Vec<Identification>, settings: EngineSettings) -> Result<Self> {
        settings.validate()?;
        if identifications.is_empty() {
            return Err(ConfigurationError::NoIdentifications.into());
        }
        let identifications: Vec<Arc<Identification>> = identifications
            .into_iter()
            .map(|mut id| {
                let dist =
                    IsotopeDistribution::averagine(id.monoisotopic_mass, settings.num_isotopes_required);
                id.peakfinding_mass = id.monoisotopic_mass + dist.peakfinding_shift();
                Arc::new(id)
            })
            .collect();
        let files: BTreeSet<Arc<SpectraFileInfo>> =
            identifications.iter().map(|x| x.file.clone()).collect();
        Ok(Self {
            identifications,
            files: files.into_iter().collect(),
            settings,
        })
    }

    /// Adds runs with no identification of their own.
    pub fn with_spectra_files(mut self, files: impl IntoIterator<Item = SpectraFileInfo>) -> Self {
        let mut all: BTreeSet<Arc<SpectraFileInfo>> = self.files.drain(..).collect();
        for file in files {
            if !all.contains(&file) {
                all.insert(Arc::new(file));
            }
        }
        self.files = all.into_iter().collect();
        self
    }

    pub fn files(&self) -> &[Arc<SpectraFileInfo>] {
        &self.files
    }

    pub fn identifications(&self) -> &[Arc<Identification>] {
        &self.identifications
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // Every charge between the lowest and highest identified one.
    fn charge_states(&self) -> Vec<i32> {
        let charges = self.identifications.iter().map(|x| x.precursor_charge);
        match (charges.clone().min(), charges.max()) {
            (Some(lo), Some(hi)) => (lo..=hi).collect(),
            _ => Vec::new(),
        }
    }

    /// The isobaric groups eligible for tracking.
    pub fn isobaric_groups(&self) -> Result<Vec<IsobaricPeptideGroup>> {
        let iso = &self.settings.isotracker;
        let filter = iso.id_filter()?;
        let mut groups = build_isobaric_groups(&self.identifications, filter.as_ref());
        if iso.require_multiple_ids_in_one_file {
            groups.retain(|x| x.has_multiple_ids_in_one_file());
        }
        Ok(groups)
    }

    fn peak_finder<'a>(&self, index: &'a PeakIndexingEngine) -> Result<PeakFinder<'a>> {
        let s = &self.settings;
        Ok(PeakFinder {
            index,
            peakfinding_tolerance: s.peakfinding_tolerance()?,
            ppm_tolerance: s.tolerance()?,
            isotope_tolerance: s.isotope_tolerance()?,
            num_isotopes_required: s.num_isotopes_required,
            missed_scans_allowed: s.missed_scans_allowed,
            discrimination_factor: s.discrimination_factor_to_cut_peak,
            integrate: s.integrate,
        })
    }

    // m/z values the indices have to keep after MS2 peak finding.
    fn retained_target_mz(&self, groups: &[IsobaricPeptideGroup]) -> Vec<f64> {
        let required = self.settings.num_isotopes_required;
        let mut out = get_target_mz(groups, required);
        if self.settings.match_between_runs {
            for id in self.identifications.iter() {
                out.extend(envelope_target_mz(
                    id.monoisotopic_mass,
                    [id.precursor_charge],
                    required,
                ));
            }
            dedup_sorted(&mut out);
        }
        out
    }

    // Wide enough for every later extraction from a pruned index.
    fn prune_tolerance(&self) -> MzTolerance {
        let s = &self.settings;
        let mut ppm = s.ppm_tolerance.max(s.isotope_ppm_tolerance);
        if s.match_between_runs {
            ppm = ppm.max(s.mbr_ppm_tolerance);
        }
        MzTolerance::Ppm(ppm)
    }

    /// Runs the whole quantification, on `max_threads` workers when set.
    pub fn run(&self, source: &dyn SpectraSource) -> Result<QuantificationResults> {
        match self.settings.max_threads {
            Some(n) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ConfigurationError::InvalidSetting {
                        field: "max_threads",
                        reason: e.to_string(),
                    })?;
                pool.install(|| self.run_on_current_pool(source))
            }
            None => self.run_on_current_pool(source),
        }
    }

    fn run_on_current_pool(&self, source: &dyn SpectraSource) -> Result<QuantificationResults> {
        let start = Instant::now();
        let settings = &self.settings;
        info!(
            "Quantifying {} identifications over {} files",
            self.identifications.len(),
            self.files.len()
        );

        let iso_groups = if settings.isotracker.enabled {
            self.isobaric_groups()?
        } else {
            Vec::new()
        };
        let needs_index = !iso_groups.is_empty() || settings.match_between_runs;
        let targets = needs_index.then(|| self.retained_target_mz(&iso_groups));

        let quantified = self
            .files
            .par_iter()
            .map(|file| self.quantify_file(file, source, targets.as_deref()))
            .collect::<Result<Vec<_>>>()?;
        let mut peaks: BTreeMap<Arc<SpectraFileInfo>, Vec<ChromatographicPeak>> = BTreeMap::new();
        let mut indices: BTreeMap<Arc<SpectraFileInfo>, PeakIndexingEngine> = BTreeMap::new();
        for q in quantified {
            if let Some(index) = q.index {
                indices.insert(q.file.clone(), index);
            }
            peaks.insert(q.file, q.peaks);
        }

        if settings.match_between_runs {
            let mbr_settings = MbrSettings {
                ppm_tolerance: settings.mbr_ppm_tolerance,
                rt_window: settings.mbr_rt_window,
                require_msms_id_in_condition: settings.require_msms_id_in_condition,
            };
            let transferred = indices
                .par_iter()
                .map(|(file, index)| -> Result<_> {
                    let finder = self.peak_finder(index)?;
                    let found = find_mbr_peaks(&finder, &peaks, &self.identifications, &mbr_settings)?;
                    Ok((file.clone(), found))
                })
                .collect::<Result<Vec<_>>>()?;
            for (file, found) in transferred {
                info!("Match-between-runs found {} peaks in {}", found.len(), file);
                peaks.entry(file).or_default().extend(found);
            }
        }

        peaks.par_iter_mut().for_each(|(_, file_peaks)| {
            let taken = std::mem::take(file_peaks);
            *file_peaks = run_error_checking(taken, settings.integrate);
        });

        let mut tracked = if iso_groups.is_empty() {
            Vec::new()
        } else {
            self.track_isobaric_groups(&iso_groups, &indices)?
        };
        drop(indices);

        if settings.normalize {
            let factors = normalization_factors(&peaks);
            let factor = |file: &Arc<SpectraFileInfo>| factors.get(file).copied().unwrap_or(1.0);
            for (file, file_peaks) in peaks.iter_mut() {
                let f = factor(file);
                file_peaks.iter_mut().for_each(|x| x.scale_intensity(f));
            }
            for peak in tracked
                .iter_mut()
                .flat_map(|x| x.tracked_peaks.iter_mut())
                .flat_map(|x| x.peaks.iter_mut())
            {
                peak.scale_intensity(factor(&peak.file));
            }
        }

        replace_isobaric_peaks(&mut peaks, &tracked);

        let mut results = QuantificationResults::new(self.files.clone(), peaks, tracked);
        results.calculate_peptide_results(&self.identifications, settings.quantify_ambiguous_peptides);
        results.calculate_protein_results(settings.use_shared_peptides_for_protein_quant);
        info!("Quantification finished in {:?}", start.elapsed());
        Ok(results)
    }

    /// Indexes one run and finds the peaks of its own identifications.
    ///
    /// A run whose spectra cannot be read or indexed is logged and left
    /// empty; the other runs go on.
    #[instrument(skip_all, fields(file = %file))]
    fn quantify_file(
        &self,
        file: &Arc<SpectraFileInfo>,
        source: &dyn SpectraSource,
        targets: Option<&[f64]>,
    ) -> Result<FileQuantification> {
        let scans = match source.read_ms1_scans(file) {
            Ok(x) => x,
            Err(e) => {
                error!("Could not read the spectra of {}: {}", file, e);
                return Ok(FileQuantification::empty(file));
            }
        };
        let (mut index, stats) = match PeakIndexingEngine::build(file.clone(), scans) {
            Ok(x) => x,
            Err(e) => {
                error!("Could not index {}: {}", file, e);
                return Ok(FileQuantification::empty(file));
            }
        };
        info!(
            "Indexed {}: {} peaks over {} scans",
            file, stats.num_peaks, stats.num_scans
        );

        let peaks = {
            let finder = self.peak_finder(&index)?;
            let charges = self.charge_states();
            let id_specific = self.settings.id_specific_charge_state;
            self.identifications
                .par_iter()
                .filter(|x| x.file == *file)
                .map(|id| finder.quantify_identification(id, &charges, id_specific))
                .collect::<Result<Vec<_>>>()?
        };
        info!("Found {} MS2 peaks in {}", peaks.len(), file);

        let index = match targets {
            Some(targets) => {
                index.prune(targets, &self.prune_tolerance())?;
                Some(index)
            }
            None => None,
        };
        Ok(FileQuantification {
            file: file.clone(),
            index,
            peaks,
        })
    }

    fn track_isobaric_groups(
        &self,
        groups: &[IsobaricPeptideGroup],
        indices: &BTreeMap<Arc<SpectraFileInfo>, PeakIndexingEngine>,
    ) -> Result<Vec<IsobaricPeakGroup>> {
        let iso = &self.settings.isotracker;
        let settings = IsoTrackingSettings {
            tolerance: self.settings.tolerance()?,
            xic_rt_padding: iso.xic_rt_padding,
            integrate: self.settings.integrate,
            shared_peaks: iso.shared_peaks,
        };
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());

        let tracked = groups
            .par_iter()
            .progress_with_style(style)
            .map(|group| match track_group(group, indices, &settings) {
                Ok(x) => x,
                Err(e) => {
                    error!("Failed to track {}: {}", group.base_sequence, e);
                    None
                }
            })
            .collect::<Vec<_>>();
        let tracked: Vec<IsobaricPeakGroup> = tracked.into_iter().flatten().collect();
        info!(
            "Tracked {} of {} isobaric groups",
            tracked.len(),
            groups.len()
        );
        Ok(tracked)
    }
}

// Peaks of the tracked sequences found around single identifications give
// way to the peaks of the shared regions.
fn replace_isobaric_peaks(
    peaks: &mut BTreeMap<Arc<SpectraFileInfo>, Vec<ChromatographicPeak>>,
    tracked: &[IsobaricPeakGroup],
) {
    let tracked_sequences: HashSet<&str> = tracked
        .iter()
        .flat_map(|x| x.tracked_peaks.iter())
        .flat_map(|x| x.identifications.iter())
        .map(|x| x.modified_sequence.as_str())
        .collect();
    if tracked_sequences.is_empty() {
        return;
    }
    for file_peaks in peaks.values_mut() {
        file_peaks.retain(|peak| {
            peak.detection_type.is_isotrack()
                || !peak
                    .identifications
                    .iter()
                    .all(|x| tracked_sequences.contains(x.modified_sequence.as_str()))
        });
    }
    for peak in tracked
        .iter()
        .flat_map(|x| x.tracked_peaks.iter())
        .flat_map(|x| x.peaks.iter())
    {
        peaks.entry(peak.file.clone()).or_default().push(peak.clone());
    }
}
