use std::ops::RangeInclusive;
use thiserror::Error;

/// Mass of a proton, used to convert between neutral masses and m/z.
pub const PROTON_MASS: f64 = 1.007276466621;

/// Converts a neutral mass to the m/z observed at the given charge.
///
/// ```
/// use xicindex::utils::{to_mz, to_mass};
/// let mz = to_mz(1000.0, 2);
/// assert!((mz - 501.007276466621).abs() < 1e-9);
/// assert!((to_mass(mz, 2) - 1000.0).abs() < 1e-9);
/// ```
#[inline]
pub fn to_mz(neutral_mass: f64, charge: i32) -> f64 {
    let z = charge.abs().max(1) as f64;
    neutral_mass / z + PROTON_MASS
}

/// Converts an m/z observed at a given charge back to the neutral mass.
#[inline]
pub fn to_mass(mz: f64, charge: i32) -> f64 {
    let z = charge.abs().max(1) as f64;
    (mz - PROTON_MASS) * z
}

/// Relative error between an observed and a theoretical value, in parts per million.
#[inline]
pub fn ppm_error(observed: f64, theoretical: f64) -> f64 {
    (observed - theoretical) / theoretical * 1e6
}

/// Finds the index range of elements in a sorted slice whose keys fall within the specified range.
///
/// The slice has to be sorted by the result of `key_fn`. The returned range
/// can be used directly with slice indexing: `&slice[result_range]`.
///
/// # Examples
///
/// ```
/// use xicindex::utils::binary_search_range_by_key;
///
/// // Sorted by scan number
/// let scans = vec![(0u32, 1.0), (1, 2.0), (1, 2.5), (2, 3.0), (4, 5.0)];
/// let range = binary_search_range_by_key(&scans, 1..=2, |x| x.0);
/// assert_eq!(&scans[range], &[(1, 2.0), (1, 2.5), (2, 3.0)]);
///
/// let empty = binary_search_range_by_key(&scans, 3..=3, |x| x.0);
/// assert!(scans[empty].is_empty());
/// ```
pub fn binary_search_range_by_key<T, K, F>(
    slice: &[T],
    key_range: RangeInclusive<K>,
    key_fn: F,
) -> std::ops::Range<usize>
where
    F: Fn(&T) -> K,
    K: Ord,
{
    let start_idx = slice.partition_point(|x| key_fn(x) < *key_range.start());
    let end_idx = start_idx + slice[start_idx..].partition_point(|x| key_fn(x) <= *key_range.end());

    start_idx..end_idx
}

/// Closed-closed range [a, b] stored as a tuple.
///
/// Construction fails if the first element is greater than the second,
/// so an empty range never gets propagated through a query.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TupleRange<T: Copy + PartialOrd>(T, T);

#[derive(Error, Debug)]
pub enum TupleRangeError<T: Copy + PartialOrd + std::fmt::Debug> {
    #[error(
        "Expected the first element to be less than or equal to the second, got ({0:?}, {1:?})"
    )]
    ExpectedOrderedRange(T, T),
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TupleRange<T> {
    pub fn try_new(left: T, right: T) -> Result<Self, TupleRangeError<T>> {
        // NaN endpoints fail both comparisons, so they are checked explicitly.
        match left.partial_cmp(&right) {
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal) => {
                Ok(Self(left, right))
            }
            _ => Err(TupleRangeError::ExpectedOrderedRange(left, right)),
        }
    }

    pub fn as_tuple(&self) -> (T, T) {
        (self.0, self.1)
    }

    pub fn contains(&self, x: T) -> bool {
        self.0 <= x && x <= self.1
    }

    pub fn start(&self) -> T {
        self.0
    }

    pub fn end(&self) -> T {
        self.1
    }

    pub fn intersects(&self, other: Self) -> bool {
        !(self.end() < other.start() || other.end() < self.start())
    }
}

/// A value that can either restrict a query or leave it unrestricted.
///
/// Same shape as `Option<T>`, but `None` would read as "nothing allowed"
/// where what is meant is "no restriction".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionallyRestricted<T: Copy> {
    Restricted(T),
    Unrestricted,
}

impl<T: Copy> OptionallyRestricted<T> {
    pub fn to_option(&self) -> Option<T> {
        match self {
            OptionallyRestricted::Restricted(x) => Some(*x),
            OptionallyRestricted::Unrestricted => None,
        }
    }

    pub fn map<T2: Copy>(self, f: impl FnOnce(T) -> T2) -> OptionallyRestricted<T2> {
        match self {
            OptionallyRestricted::Restricted(x) => OptionallyRestricted::Restricted(f(x)),
            OptionallyRestricted::Unrestricted => OptionallyRestricted::Unrestricted,
        }
    }

    pub fn is_unrestricted_or(&self, f: impl FnOnce(&T) -> bool) -> bool {
        match self {
            OptionallyRestricted::Restricted(x) => f(x),
            OptionallyRestricted::Unrestricted => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_search_repeats() {
        let input = vec![
            1, 2, 3, 3, 3, 3, 3, 3, 3, 3, 4, 5, 6, 7, 7, 7, 7, 7, 8, 9, 10,
        ];
        let result = binary_search_range_by_key(&input, 3..=7, |&x| x);
        assert_eq!(result, 2..18);
    }

    #[test]
    fn test_tuple_range_rejects_nan_and_inverted() {
        assert!(TupleRange::try_new(2.0, 1.0).is_err());
        assert!(TupleRange::try_new(f64::NAN, 1.0).is_err());
        let range = TupleRange::try_new(1.0, 1.0).unwrap();
        assert!(range.contains(1.0));
        assert!(!range.contains(1.0001));
    }

    #[test]
    fn test_charge_conversion_is_symmetric() {
        for charge in 1..5 {
            let mz = to_mz(1234.5678, charge);
            assert!((to_mass(mz, charge) - 1234.5678).abs() < 1e-9);
        }
        // Negative charges are treated by magnitude.
        assert_eq!(to_mz(1000.0, -2), to_mz(1000.0, 2));
    }

    #[test]
    fn test_ppm_error() {
        assert!((ppm_error(1000.01, 1000.0) - 10.0).abs() < 1e-6);
    }
}
