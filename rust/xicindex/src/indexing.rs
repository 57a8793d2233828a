use crate::errors::IndexingError;
use crate::rt_mapping::{
    ScanIndex,
    ScanToRtMapping,
};
use crate::spectra_file::SpectraFileInfo;
use crate::tolerance::MzTolerance;
use crate::utils::OptionallyRestricted::{
    self,
    Restricted,
    Unrestricted,
};
use crate::utils::{
    TupleRange,
    to_mz,
};
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use std::sync::Arc;
use tracing::{
    debug,
    info,
};

/// Default number of peaks per m/z bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 4096;

/// A single centroided MS1 peak, tagged with the scan it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedPeak {
    pub mz: f64,
    pub intensity: f64,
    pub scan_index: ScanIndex,
    pub retention_time: f64,
}

impl IndexedPeak {
    /// Identity of the peak within its file.
    ///
    /// Two peaks with the same key are the same physical signal, which is
    /// what the peak-merging logic downstream relies on.
    pub fn key(&self) -> (ScanIndex, u64) {
        (self.scan_index, self.mz.to_bits())
    }
}

/// One MS1 spectrum as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Ms1Scan {
    pub retention_time: f64,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

impl Ms1Scan {
    pub fn new(retention_time: f64, mz: Vec<f64>, intensity: Vec<f64>) -> Self {
        Self {
            retention_time,
            mz,
            intensity,
        }
    }

    pub fn from_pairs(retention_time: f64, peaks: &[(f64, f64)]) -> Self {
        let (mz, intensity) = peaks.iter().copied().unzip();
        Self {
            retention_time,
            mz,
            intensity,
        }
    }
}

/// Statistics about the building of a [`PeakIndexingEngine`].
#[derive(Debug, Clone)]
pub struct IndexBuildingStats {
    pub num_scans: usize,
    pub num_peaks: usize,
    pub num_buckets: usize,
    pub memory_usage_bytes: usize,
    pub sorting_time: std::time::Duration,
    pub bucketing_time: std::time::Duration,
}

impl std::fmt::Display for IndexBuildingStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Peak Index Building Stats:")?;
        writeln!(f, "  Scans: {}", self.num_scans)?;
        writeln!(f, "  Peaks: {}", self.num_peaks)?;
        writeln!(f, "  Buckets: {}", self.num_buckets)?;
        writeln!(
            f,
            "  Estimated memory usage: {:.2} MB",
            self.memory_usage_bytes as f64 / (1024.0 * 1024.0)
        )?;
        writeln!(f, "  Sorting time: {:.2?}", self.sorting_time)?;
        write!(f, "  Bucketing time: {:.2?}", self.bucketing_time)
    }
}

/// Parameters of a chromatogram extraction around an identification.
#[derive(Debug, Clone, Copy)]
pub struct XicQuery {
    pub neutral_mass: f64,
    pub charge: i32,
    pub retention_time: f64,
    pub missed_scans_allowed: usize,
    pub rt_half_width: OptionallyRestricted<f64>,
}

impl XicQuery {
    pub fn new(neutral_mass: f64, charge: i32, retention_time: f64) -> Self {
        Self {
            neutral_mass,
            charge,
            retention_time,
            missed_scans_allowed: 1,
            rt_half_width: Unrestricted,
        }
    }

    pub fn with_missed_scans(mut self, missed_scans_allowed: usize) -> Self {
        self.missed_scans_allowed = missed_scans_allowed;
        self
    }

    pub fn with_rt_half_width(mut self, half_width: f64) -> Self {
        self.rt_half_width = Restricted(half_width);
        self
    }

    fn target_mz(&self) -> f64 {
        to_mz(self.neutral_mass, self.charge)
    }
}

/// Per-file index of MS1 peaks.
///
/// Peaks are stored in m/z order, split in fixed-size buckets; each bucket
/// is internally sorted by scan so a (m/z, scan) box query only touches the
/// buckets overlapping the m/z range and binary-searches the scans inside.
#[derive(Debug, Clone)]
pub struct PeakIndexingEngine {
    file: Arc<SpectraFileInfo>,
    peaks: Vec<IndexedPeak>,
    bucket_mz_ranges: Vec<TupleRange<f64>>,
    bucket_size: usize,
    scan_to_rt: ScanToRtMapping,
}

#[derive(Debug, Clone, Copy)]
struct PeakBucket<'a> {
    inner: &'a [IndexedPeak],
}

impl<'a> PeakBucket<'a> {
    // All peaks in self.inner[range] have a scan index within scan_range.
    fn find_scan_range(&self, scan_range: TupleRange<ScanIndex>) -> std::ops::Range<usize> {
        let start_idx = self
            .inner
            .partition_point(|x| x.scan_index < scan_range.start());
        let end_idx = start_idx
            + self.inner[start_idx..].partition_point(|x| x.scan_index <= scan_range.end());
        start_idx..end_idx
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl PeakIndexingEngine {
    /// Builds the index for one file from its MS1 scans.
    ///
    /// Scans are ordered by retention time and numbered from zero.
    /// Any non-finite value in the input is rejected.
    pub fn build(
        file: Arc<SpectraFileInfo>,
        scans: Vec<Ms1Scan>,
    ) -> Result<(Self, IndexBuildingStats), IndexingError> {
        Self::build_with_bucket_size(file, scans, DEFAULT_BUCKET_SIZE)
    }

    pub fn build_with_bucket_size(
        file: Arc<SpectraFileInfo>,
        mut scans: Vec<Ms1Scan>,
        bucket_size: usize,
    ) -> Result<(Self, IndexBuildingStats), IndexingError> {
        if scans.is_empty() {
            return Err(IndexingError::NoScans {
                path: file.path.clone(),
            });
        }
        if let Some(pos) = scans.iter().position(|x| !x.retention_time.is_finite()) {
            return Err(IndexingError::NonFiniteValue {
                scan: pos,
                field: "retention_time",
            });
        }
        scans.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));

        let mut peaks = Vec::with_capacity(scans.iter().map(|x| x.mz.len()).sum());
        for (i, scan) in scans.iter().enumerate() {
            if scan.mz.len() != scan.intensity.len() {
                return Err(IndexingError::MismatchedLengths {
                    scan: i,
                    num_mz: scan.mz.len(),
                    num_intensity: scan.intensity.len(),
                });
            }
            for (&mz, &intensity) in scan.mz.iter().zip(scan.intensity.iter()) {
                if !mz.is_finite() {
                    return Err(IndexingError::NonFiniteValue {
                        scan: i,
                        field: "mz",
                    });
                }
                if !intensity.is_finite() {
                    return Err(IndexingError::NonFiniteValue {
                        scan: i,
                        field: "intensity",
                    });
                }
                peaks.push(IndexedPeak {
                    mz,
                    intensity,
                    scan_index: ScanIndex::new(i as u32),
                    retention_time: scan.retention_time,
                });
            }
        }
        let scan_to_rt =
            ScanToRtMapping::try_new(scans.iter().map(|x| x.retention_time).collect())?;
        drop(scans);

        let (out, stats) = Self::from_parts(file, peaks, scan_to_rt, bucket_size);
        debug!("Built index for {}:\n{}", out.file, stats);
        Ok((out, stats))
    }

    /// Canonical constructor; all the bucketing logic lives here.
    ///
    /// NOTE: This internally uses `par_sort_unstable` to sort the peaks.
    fn from_parts(
        file: Arc<SpectraFileInfo>,
        mut peaks: Vec<IndexedPeak>,
        scan_to_rt: ScanToRtMapping,
        bucket_size: usize,
    ) -> (Self, IndexBuildingStats) {
        let bucket_size = bucket_size.max(1);
        let st = std::time::Instant::now();
        peaks.par_sort_unstable_by(|x, y| {
            x.mz.total_cmp(&y.mz)
                .then(x.scan_index.cmp(&y.scan_index))
                .then(x.intensity.total_cmp(&y.intensity))
        });
        let sorting_time = st.elapsed();

        let st = std::time::Instant::now();
        let bucket_mz_ranges: Vec<_> = peaks
            .par_chunks_mut(bucket_size)
            .filter_map(|chunk| {
                let start = chunk.first()?.mz;
                let end = chunk.last()?.mz;
                chunk.sort_unstable_by(|x, y| {
                    x.scan_index
                        .cmp(&y.scan_index)
                        .then(x.mz.total_cmp(&y.mz))
                        .then(x.intensity.total_cmp(&y.intensity))
                });
                TupleRange::try_new(start, end).ok()
            })
            .collect();
        let bucketing_time = st.elapsed();

        let out = Self {
            file,
            peaks,
            bucket_mz_ranges,
            bucket_size,
            scan_to_rt,
        };
        let stats = IndexBuildingStats {
            num_scans: out.scan_to_rt.len(),
            num_peaks: out.peaks.len(),
            num_buckets: out.bucket_mz_ranges.len(),
            memory_usage_bytes: out.aproximate_memory_usage(),
            sorting_time,
            bucketing_time,
        };
        (out, stats)
    }

    fn aproximate_memory_usage(&self) -> usize {
        std::mem::size_of::<Self>()
            + std::mem::size_of::<TupleRange<f64>>() * self.bucket_mz_ranges.capacity()
            + std::mem::size_of::<IndexedPeak>() * self.peaks.capacity()
            + std::mem::size_of::<f64>() * self.scan_to_rt.len()
    }

    pub fn file(&self) -> &Arc<SpectraFileInfo> {
        &self.file
    }

    pub fn scan_to_rt(&self) -> &ScanToRtMapping {
        &self.scan_to_rt
    }

    pub fn num_peaks(&self) -> usize {
        self.peaks.len()
    }

    pub fn num_scans(&self) -> usize {
        self.scan_to_rt.len()
    }

    // ============================================================================
    // Queries
    // ============================================================================

    /// Peaks inside an m/z range, optionally restricted to a range of scans.
    ///
    /// Peaks come out grouped by bucket, and by scan within each bucket.
    pub fn query_peaks(
        &self,
        mz_range: TupleRange<f64>,
        scan_range: OptionallyRestricted<TupleRange<ScanIndex>>,
    ) -> impl Iterator<Item = &IndexedPeak> {
        QueryPeaksIterator::new(self, mz_range, scan_range)
    }

    /// The peak closest in m/z to `mz` in a given scan, if any lies within tolerance.
    pub fn get_indexed_peak(
        &self,
        mz: f64,
        scan: ScanIndex,
        tolerance: &MzTolerance,
    ) -> Result<Option<&IndexedPeak>, IndexingError> {
        let mz_range = tolerance.mz_range(mz)?;
        let scan_range = TupleRange::try_new(scan, scan).map_err(|_| {
            IndexingError::ScanOutOfBounds {
                index: scan.index,
                num_scans: self.num_scans(),
            }
        })?;
        Ok(self.closest_in_box(mz, mz_range, scan_range))
    }

    fn closest_in_box(
        &self,
        mz: f64,
        mz_range: TupleRange<f64>,
        scan_range: TupleRange<ScanIndex>,
    ) -> Option<&IndexedPeak> {
        let mut best: Option<&IndexedPeak> = None;
        for peak in self.query_peaks(mz_range, Restricted(scan_range)) {
            best = match best {
                None => Some(peak),
                Some(curr) => {
                    let curr_err = (curr.mz - mz).abs();
                    let new_err = (peak.mz - mz).abs();
                    if new_err < curr_err || (new_err == curr_err && peak.mz < curr.mz) {
                        Some(peak)
                    } else {
                        Some(curr)
                    }
                }
            }
        }
        best
    }

    /// Extracts the chromatogram of a target around an identification.
    ///
    /// The walk starts at the last scan before the query retention time and
    /// moves outwards in both directions, one scan at a time, until more than
    /// `missed_scans_allowed` consecutive scans have no matching peak (or the
    /// retention-time window, if any, is exhausted). The returned peaks are
    /// sorted by retention time.
    pub fn get_xic(
        &self,
        query: &XicQuery,
        tolerance: &MzTolerance,
    ) -> Result<Vec<IndexedPeak>, IndexingError> {
        tolerance.validate()?;
        let target_mz = query.target_mz();
        // Also checks the target m/z is finite.
        tolerance.mz_range(target_mz)?;
        let Some(start) = self.scan_to_rt.last_scan_before(query.retention_time) else {
            return Ok(Vec::new());
        };
        let rt_window = match query.rt_half_width {
            Restricted(w) => Restricted(TupleRange::try_new(
                query.retention_time - w,
                query.retention_time + w,
            )
            .map_err(|_| IndexingError::NonFiniteValue {
                scan: start.as_usize(),
                field: "retention_time window",
            })?),
            Unrestricted => Unrestricted,
        };

        let mut out = Vec::new();
        let num_scans = self.num_scans();
        for direction in [1i64, -1] {
            let mut missed_scans = 0usize;
            let mut t = start.as_usize() as i64 + if direction > 0 { 0 } else { -1 };
            while t >= 0 && (t as usize) < num_scans {
                let scan = ScanIndex::new(t as u32);
                let rt = self.scan_to_rt.rt_for_index(scan)?;
                if !rt_window.is_unrestricted_or(|w| w.contains(rt)) {
                    break;
                }
                match self.get_indexed_peak(target_mz, scan, tolerance)? {
                    Some(peak) => {
                        missed_scans = 0;
                        out.push(*peak);
                    }
                    None if scan != start => {
                        missed_scans += 1;
                    }
                    None => {}
                }
                if missed_scans > query.missed_scans_allowed {
                    break;
                }
                t += direction;
            }
        }

        out.sort_by(|a, b| a.retention_time.total_cmp(&b.retention_time));
        Ok(out)
    }

    /// Best matching peak (closest in m/z) per scan, for every scan in a
    /// retention-time window. Scans with no match are absent from the output.
    pub fn get_xic_in_window(
        &self,
        neutral_mass: f64,
        charge: i32,
        tolerance: &MzTolerance,
        rt_range: TupleRange<f64>,
    ) -> Result<Vec<IndexedPeak>, IndexingError> {
        let target_mz = to_mz(neutral_mass, charge);
        let mz_range = tolerance.mz_range(target_mz)?;
        let scans = self.scan_to_rt.scans_in_range(rt_range);
        if scans.is_empty() {
            return Ok(Vec::new());
        }
        let scan_range = TupleRange::try_new(
            ScanIndex::new(scans.start as u32),
            ScanIndex::new((scans.end - 1) as u32),
        )
        .map_err(|_| IndexingError::ScanOutOfBounds {
            index: scans.start as u32,
            num_scans: self.num_scans(),
        })?;

        let mut best: Vec<Option<IndexedPeak>> = vec![None; scans.len()];
        for peak in self.query_peaks(mz_range, Restricted(scan_range)) {
            let slot = &mut best[peak.scan_index.as_usize() - scans.start];
            let replace = match slot {
                None => true,
                Some(curr) => {
                    let curr_err = (curr.mz - target_mz).abs();
                    let new_err = (peak.mz - target_mz).abs();
                    new_err < curr_err || (new_err == curr_err && peak.mz < curr.mz)
                }
            };
            if replace {
                *slot = Some(*peak);
            }
        }
        Ok(best.into_iter().flatten().collect())
    }

    /// Drops every peak that is not within `tolerance` of any of the
    /// target m/z values and rebuilds the buckets.
    ///
    /// Returns the number of peaks removed. Pruning twice with the same
    /// targets removes nothing the second time.
    pub fn prune(&mut self, target_mzs: &[f64], tolerance: &MzTolerance) -> Result<usize, IndexingError> {
        tolerance.validate()?;
        let mut targets: Vec<f64> = target_mzs.iter().copied().filter(|x| x.is_finite()).collect();
        targets.sort_by(|a, b| a.total_cmp(b));

        let keep = |mz: f64| -> bool {
            let pos = targets.partition_point(|x| *x < mz);
            let right = targets.get(pos).is_some_and(|t| tolerance.within(mz, *t));
            let left = pos > 0 && tolerance.within(mz, targets[pos - 1]);
            right || left
        };

        let before = self.peaks.len();
        let surviving: Vec<IndexedPeak> = self
            .peaks
            .par_iter()
            .filter(|x| keep(x.mz))
            .copied()
            .collect();
        let removed = before - surviving.len();

        let (rebuilt, stats) = Self::from_parts(
            self.file.clone(),
            surviving,
            self.scan_to_rt.clone(),
            self.bucket_size,
        );
        *self = rebuilt;
        info!(
            "Pruned index for {}: kept {} of {} peaks ({} buckets)",
            self.file, stats.num_peaks, before, stats.num_buckets
        );
        Ok(removed)
    }

    /// Query the bucket indices that overlap with the given m/z range.
    fn query_bucket_range(&self, mz_range: TupleRange<f64>) -> std::ops::Range<usize> {
        let start_idx = self
            .bucket_mz_ranges
            .partition_point(|x| x.end() < mz_range.start());
        let end_idx = start_idx
            + self.bucket_mz_ranges[start_idx..].partition_point(|x| x.start() <= mz_range.end());
        start_idx..end_idx
    }

    fn get_bucket(&self, bucket_idx: usize) -> Option<PeakBucket<'_>> {
        let start = bucket_idx * self.bucket_size;
        if start >= self.peaks.len() {
            return None;
        }
        let end = ((bucket_idx + 1) * self.bucket_size).min(self.peaks.len());
        Some(PeakBucket {
            inner: &self.peaks[start..end],
        })
    }
}

/// Walks the buckets of a query one at a time, so the peaks can be
/// borrowed from the index without collecting them.
#[derive(Debug)]
struct QueryPeaksIterator<'a> {
    index: &'a PeakIndexingEngine,
    mz_range: TupleRange<f64>,
    scan_range: OptionallyRestricted<TupleRange<ScanIndex>>,
    bucket_idx: usize,
    bucket_end: usize,
    position_in_bucket: usize,
    end_of_current_bucket: usize,
    current_bucket: Option<PeakBucket<'a>>,
}

impl<'a> QueryPeaksIterator<'a> {
    fn new(
        index: &'a PeakIndexingEngine,
        mz_range: TupleRange<f64>,
        scan_range: OptionallyRestricted<TupleRange<ScanIndex>>,
    ) -> Self {
        let bucket_range = index.query_bucket_range(mz_range);
        Self {
            index,
            mz_range,
            scan_range,
            bucket_idx: bucket_range.start,
            bucket_end: bucket_range.end,
            position_in_bucket: 0,
            end_of_current_bucket: 0,
            current_bucket: None,
        }
    }

    // None if there are no more buckets in the m/z range.
    fn advance_bucket(&mut self) -> Option<usize> {
        if self.bucket_idx >= self.bucket_end {
            return None;
        }
        let curr_bucket = self.index.get_bucket(self.bucket_idx)?;
        self.bucket_idx += 1;
        match self.scan_range {
            Restricted(scan_range) => {
                let range = curr_bucket.find_scan_range(scan_range);
                self.position_in_bucket = range.start;
                self.end_of_current_bucket = range.end;
            }
            Unrestricted => {
                self.position_in_bucket = 0;
                self.end_of_current_bucket = curr_bucket.len();
            }
        }
        self.current_bucket = Some(curr_bucket);
        Some(self.bucket_idx - 1)
    }

    fn next_in_current_bucket(&mut self) -> Option<&'a IndexedPeak> {
        while let Some(bucket) = self.current_bucket.as_ref() {
            if self.position_in_bucket >= self.end_of_current_bucket {
                return None;
            }
            let peak = &bucket.inner[self.position_in_bucket];
            self.position_in_bucket += 1;
            if self.mz_range.contains(peak.mz) {
                return Some(peak);
            }
        }
        None
    }
}

impl<'a> Iterator for QueryPeaksIterator<'a> {
    type Item = &'a IndexedPeak;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let peak = self.next_in_current_bucket();
            if peak.is_some() {
                return peak;
            }
            self.advance_bucket()?;
        }
    }
}
