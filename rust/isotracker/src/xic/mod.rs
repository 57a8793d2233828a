//! Extracted ion chromatograms and the signal processing done on them.

pub mod alignment;
pub mod extrema;
pub mod smoothing;
pub mod spline;

use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::models::Identification;
use extrema::{
    Extremum,
    ExtremumKind,
    sort_by_retention_time,
};
use smoothing::{
    DEFAULT_SMOOTHING_WINDOW,
    smooth_intensities,
};
use spline::{
    AkimaSpline,
    LinearSpline,
};
use std::sync::Arc;
use xicindex::{
    IndexedPeak,
    SpectraFileInfo,
};

/// Zero-intensity points added on each side before building the linear spline.
pub const NUM_PADDING_PEAKS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdProvenance {
    /// Identified in the same run as the chromatogram.
    Own,
    /// Lent by another run because this one had none.
    Borrowed,
}

#[derive(Debug, Clone)]
pub struct AttachedIdentification {
    pub id: Arc<Identification>,
    pub provenance: IdProvenance,
}

/// Chromatogram of one target in one run.
#[derive(Debug, Clone)]
pub struct Xic {
    peaks: Vec<IndexedPeak>,
    peak_finding_mz: f64,
    file: Arc<SpectraFileInfo>,
    pub is_reference: bool,
    ids: Vec<AttachedIdentification>,
    linear_spline: LinearSpline,
    smoothed_spline: Option<AkimaSpline>,
    rt_shift: f64,
    extrema: Vec<Extremum>,
}

impl Xic {
    /// Builds the chromatogram and its splines.
    ///
    /// Peaks must be sorted by retention time. Identifications from another
    /// run than `file` are kept as borrowed.
    pub fn new(
        peaks: Vec<IndexedPeak>,
        peak_finding_mz: f64,
        file: Arc<SpectraFileInfo>,
        is_reference: bool,
        ids: Vec<Arc<Identification>>,
    ) -> Result<Self> {
        if peaks.len() < 2 {
            return Err(DataProcessingError::InsufficientPoints {
                needed: 2,
                got: peaks.len(),
                context: format!("Xic::new for {}", file),
            }
            .into());
        }
        let linear_spline = Self::build_linear_spline(&peaks)?;
        let smoothed_spline = if peaks.len() >= AkimaSpline::MIN_POINTS {
            let xs: Vec<f64> = peaks.iter().map(|x| x.retention_time).collect();
            let ys: Vec<f64> = peaks.iter().map(|x| x.intensity).collect();
            let smoothed = smooth_intensities(&ys, DEFAULT_SMOOTHING_WINDOW)?;
            Some(AkimaSpline::new(xs, smoothed)?)
        } else {
            None
        };

        let ids = ids
            .into_iter()
            .map(|id| {
                let provenance = if id.file == file {
                    IdProvenance::Own
                } else {
                    IdProvenance::Borrowed
                };
                AttachedIdentification { id, provenance }
            })
            .collect();

        Ok(Self {
            peaks,
            peak_finding_mz,
            file,
            is_reference,
            ids,
            linear_spline,
            smoothed_spline,
            rt_shift: 0.0,
            extrema: Vec::new(),
        })
    }

    fn build_linear_spline(peaks: &[IndexedPeak]) -> Result<LinearSpline> {
        let first = peaks[0].retention_time;
        let last = peaks[peaks.len() - 1].retention_time;
        let gap = (last - first) / (peaks.len() - 1) as f64;

        let mut xs = Vec::with_capacity(peaks.len() + 2 * NUM_PADDING_PEAKS);
        let mut ys = Vec::with_capacity(peaks.len() + 2 * NUM_PADDING_PEAKS);
        for i in (1..=NUM_PADDING_PEAKS).rev() {
            xs.push(first - gap * i as f64);
            ys.push(0.0);
        }
        for peak in peaks {
            xs.push(peak.retention_time);
            ys.push(peak.intensity);
        }
        for i in 1..=NUM_PADDING_PEAKS {
            xs.push(last + gap * i as f64);
            ys.push(0.0);
        }
        LinearSpline::new(xs, ys)
    }

    pub fn peaks(&self) -> &[IndexedPeak] {
        &self.peaks
    }

    pub fn peak_finding_mz(&self) -> f64 {
        self.peak_finding_mz
    }

    pub fn file(&self) -> &Arc<SpectraFileInfo> {
        &self.file
    }

    pub fn ids(&self) -> &[AttachedIdentification] {
        &self.ids
    }

    pub fn own_ids(&self) -> impl Iterator<Item = &Arc<Identification>> {
        self.ids
            .iter()
            .filter(|x| x.provenance == IdProvenance::Own)
            .map(|x| &x.id)
    }

    pub fn num_own_ids(&self) -> usize {
        self.own_ids().count()
    }

    pub fn linear_spline(&self) -> &LinearSpline {
        &self.linear_spline
    }

    pub fn smoothed_spline(&self) -> Option<&AkimaSpline> {
        self.smoothed_spline.as_ref()
    }

    pub fn rt_shift(&self) -> f64 {
        self.rt_shift
    }

    pub fn set_rt_shift(&mut self, rt_shift: f64) {
        self.rt_shift = rt_shift;
    }

    pub fn extrema(&self) -> &[Extremum] {
        &self.extrema
    }

    /// Smoothed intensity at `rt`, falling back to the raw interpolation.
    pub fn smoothed_intensity(&self, rt: f64) -> f64 {
        match &self.smoothed_spline {
            Some(s) => s.interpolate(rt),
            None => self.linear_spline.interpolate(rt),
        }
    }

    /// Shift to add to this run's times to land on the reference timeline,
    /// no larger than `max_shift` either way.
    pub fn alignment_shift(&self, reference: &Xic, max_shift: f64) -> f64 {
        alignment::estimate_rt_shift(&reference.linear_spline, &self.linear_spline, max_shift)
    }

    /// How much later this run's apex elutes than the reference's.
    pub fn apex_offset(&self, reference: &Xic) -> f64 {
        -self.alignment_shift(reference, alignment::DEFAULT_MAX_RT_SHIFT)
    }

    /// Computes and stores the shift to the reference.
    pub fn align_to(&mut self, reference: &Xic) -> f64 {
        self.rt_shift = self.alignment_shift(reference, alignment::DEFAULT_MAX_RT_SHIFT);
        self.rt_shift
    }

    /// Finds local maxima and minima, reported on the reference timeline.
    ///
    /// Uses the stationary points of the smoothed spline; chromatograms too
    /// short for one use the slope sign changes of the padded linear trace.
    pub fn find_extrema(&mut self) {
        let mut extrema = Vec::new();
        match &self.smoothed_spline {
            Some(spline) => {
                for point in spline.stationary_points() {
                    let d2 = spline.differentiate2(point);
                    let kind = if d2 < 0.0 {
                        ExtremumKind::Maximum
                    } else if d2 > 0.0 {
                        ExtremumKind::Minimum
                    } else {
                        continue;
                    };
                    let intensity = self.linear_spline.interpolate(point);
                    extrema.push(Extremum::new(intensity, point + self.rt_shift, kind));
                }
            }
            None => {
                let knots = self.linear_spline.knots();
                for i in 1..knots.len() - 1 {
                    let left = self.linear_spline.differentiate((knots[i - 1] + knots[i]) / 2.0);
                    let right = self.linear_spline.differentiate((knots[i] + knots[i + 1]) / 2.0);
                    let kind = if left > 0.0 && right < 0.0 {
                        ExtremumKind::Maximum
                    } else if left < 0.0 && right > 0.0 {
                        ExtremumKind::Minimum
                    } else {
                        continue;
                    };
                    let intensity = self.linear_spline.interpolate(knots[i]);
                    extrema.push(Extremum::new(intensity, knots[i] + self.rt_shift, kind));
                }
            }
        }
        sort_by_retention_time(&mut extrema);
        self.extrema = extrema;
    }
}
