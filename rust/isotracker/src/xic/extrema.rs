use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtremumKind {
    Maximum,
    Minimum,
}

/// A local maximum or minimum of a chromatogram.
///
/// The retention time is on the reference timeline (already shifted).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub intensity: f64,
    pub retention_time: f64,
    pub kind: ExtremumKind,
}

impl Extremum {
    pub fn new(intensity: f64, retention_time: f64, kind: ExtremumKind) -> Self {
        Self {
            intensity,
            retention_time,
            kind,
        }
    }

    pub fn is_maximum(&self) -> bool {
        self.kind == ExtremumKind::Maximum
    }
}

pub(crate) fn sort_by_retention_time(extrema: &mut [Extremum]) {
    extrema.sort_by(|a, b| {
        a.retention_time
            .total_cmp(&b.retention_time)
            .then(b.intensity.total_cmp(&a.intensity))
    });
}

/// A shared chromatographic peak, on the reference timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRegion {
    pub apex_rt: f64,
    pub start_rt: f64,
    pub end_rt: f64,
}

impl PeakRegion {
    pub fn new(apex_rt: f64, start_rt: f64, end_rt: f64) -> Self {
        Self {
            apex_rt,
            start_rt,
            end_rt,
        }
    }

    pub fn width(&self) -> f64 {
        self.end_rt - self.start_rt
    }

    pub fn contains(&self, rt: f64) -> bool {
        self.start_rt <= rt && rt <= self.end_rt
    }

    /// The same region seen from a run whose timeline is shifted by `rt_shift`
    /// relative to the reference.
    pub fn in_run_time(&self, rt_shift: f64) -> Self {
        Self {
            apex_rt: self.apex_rt - rt_shift,
            start_rt: self.start_rt - rt_shift,
            end_rt: self.end_rt - rt_shift,
        }
    }
}
