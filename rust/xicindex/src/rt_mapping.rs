//! Mapping between MS1 scan indices and retention times.
//!
//! Scan indices are zero-based positions in the retention-time ordered
//! list of MS1 scans of a single file. They are only comparable within
//! one file.

use crate::errors::IndexingError;
use crate::utils::TupleRange;
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::fmt::Debug;
use std::ops::Range;

/// Zero-based index into the MS1 scans of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScanIndex {
    pub index: u32,
}

impl ScanIndex {
    pub fn new(index: u32) -> Self {
        Self { index }
    }

    pub fn as_usize(&self) -> usize {
        self.index as usize
    }
}

impl Serialize for ScanIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.index)
    }
}

impl<'de> Deserialize<'de> for ScanIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let index = u32::deserialize(deserializer)?;
        Ok(ScanIndex { index })
    }
}

#[derive(Clone, PartialEq)]
pub struct ScanToRtMapping {
    // Retention times in minutes, non-decreasing.
    retention_times: Vec<f64>,
}

fn glimpse_slc_f64(slice: &[f64]) -> String {
    if slice.len() <= 5 {
        format!("{:?}", slice)
    } else {
        format!(
            "[{:.3}, {:.3}, ..., {:.3}, {:.3}] (len={})",
            slice[0],
            slice[1],
            slice[slice.len() - 2],
            slice[slice.len() - 1],
            slice.len()
        )
    }
}

impl Debug for ScanToRtMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanToRtMapping")
            .field("retention_times", &glimpse_slc_f64(&self.retention_times))
            .finish()
    }
}

impl ScanToRtMapping {
    pub fn try_new(retention_times: Vec<f64>) -> Result<Self, IndexingError> {
        if let Some(pos) = retention_times.iter().position(|x| !x.is_finite()) {
            return Err(IndexingError::NonFiniteValue {
                scan: pos,
                field: "retention_time",
            });
        }
        if retention_times.windows(2).any(|w| w[0] > w[1]) {
            return Err(IndexingError::UnsortedRetentionTimes);
        }
        Ok(Self { retention_times })
    }

    pub fn len(&self) -> usize {
        self.retention_times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.retention_times.is_empty()
    }

    pub fn retention_times(&self) -> &[f64] {
        &self.retention_times
    }

    pub fn rt_for_index(&self, index: ScanIndex) -> Result<f64, IndexingError> {
        self.retention_times
            .get(index.as_usize())
            .copied()
            .ok_or(IndexingError::ScanOutOfBounds {
                index: index.index,
                num_scans: self.retention_times.len(),
            })
    }

    pub fn rt_range(&self) -> Option<TupleRange<f64>> {
        let first = self.retention_times.first()?;
        let last = self.retention_times.last()?;
        TupleRange::try_new(*first, *last).ok()
    }

    /// The scan whose retention time is closest to `rt`.
    ///
    /// Returns `None` only when the mapping is empty.
    pub fn closest_scan(&self, rt: f64) -> Option<ScanIndex> {
        if self.retention_times.is_empty() {
            return None;
        }
        let pos = self.retention_times.partition_point(|x| *x < rt);
        let best = if pos == 0 {
            0
        } else if pos >= self.retention_times.len() {
            self.retention_times.len() - 1
        } else {
            let left = rt - self.retention_times[pos - 1];
            let right = self.retention_times[pos] - rt;
            if left <= right { pos - 1 } else { pos }
        };
        Some(ScanIndex::new(best as u32))
    }

    /// The last scan strictly before `rt`, falling back to the first scan.
    pub fn last_scan_before(&self, rt: f64) -> Option<ScanIndex> {
        if self.retention_times.is_empty() {
            return None;
        }
        let pos = self.retention_times.partition_point(|x| *x < rt);
        Some(ScanIndex::new(pos.saturating_sub(1) as u32))
    }

    /// Indices of the scans whose retention time falls in the (inclusive) range.
    pub fn scans_in_range(&self, rt_range: TupleRange<f64>) -> Range<usize> {
        let start = self
            .retention_times
            .partition_point(|x| *x < rt_range.start());
        let end = self
            .retention_times
            .partition_point(|x| *x <= rt_range.end());
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> ScanToRtMapping {
        ScanToRtMapping::try_new(vec![1.0, 1.1, 1.2, 1.3, 1.4]).unwrap()
    }

    #[test]
    fn test_closest_scan() {
        let map = mapping();
        assert_eq!(map.closest_scan(0.0), Some(ScanIndex::new(0)));
        assert_eq!(map.closest_scan(1.16), Some(ScanIndex::new(2)));
        assert_eq!(map.closest_scan(1.14), Some(ScanIndex::new(1)));
        assert_eq!(map.closest_scan(9.0), Some(ScanIndex::new(4)));
    }

    #[test]
    fn test_last_scan_before() {
        let map = mapping();
        assert_eq!(map.last_scan_before(1.25), Some(ScanIndex::new(2)));
        // Exact hits are not "before".
        assert_eq!(map.last_scan_before(1.2), Some(ScanIndex::new(1)));
        assert_eq!(map.last_scan_before(0.5), Some(ScanIndex::new(0)));
    }

    #[test]
    fn test_scans_in_range() {
        let map = mapping();
        let range = TupleRange::try_new(1.05, 1.3).unwrap();
        assert_eq!(map.scans_in_range(range), 1..4);
        let outside = TupleRange::try_new(5.0, 6.0).unwrap();
        assert!(map.scans_in_range(outside).is_empty());
    }

    #[test]
    fn test_rejects_unsorted() {
        assert!(ScanToRtMapping::try_new(vec![1.0, 0.5]).is_err());
        assert!(ScanToRtMapping::try_new(vec![1.0, f64::NAN]).is_err());
    }

    #[test]
    fn test_scan_index_serializes_as_integer() {
        let txt = serde_json::to_string(&ScanIndex::new(7)).unwrap();
        assert_eq!(txt, "7");
        let back: ScanIndex = serde_json::from_str(&txt).unwrap();
        assert_eq!(back, ScanIndex::new(7));
    }
}
