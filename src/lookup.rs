//! # Nearest-lower-neighbour lookup over sorted times
//!
//! A [`LookupScheme`] answers one query: given a time `t`, which is the largest index `i`
//! such that `times[i] <= t`? Among repeated values the rightmost index is returned, and
//! queries outside the covered range are clamped to `0` or `N - 1` instead of failing.
//!
//! Two schemes are provided:
//!
//! - [`BinarySearchLookupScheme`] – stateless bisection, `O(log N)` per query.
//! - [`HuntingLookupScheme`] – remembers the previous answer and hunts outward from it
//!   before bisecting the bracket. Well suited to the monotonically increasing query
//!   times of the covariance history loop.
//!
//! Both are built over a non-decreasing, non-empty sequence in `O(N)`.

use std::cell::Cell;

use log::trace;
use serde::{Deserialize, Serialize};

use crate::constants::Time;
use crate::odpost_errors::OdPostError;

/// Selection of the lookup algorithm used by the covariance history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LookupSchemeKind {
    #[default]
    BinarySearch,
    Hunting,
}

impl LookupSchemeKind {
    /// Build the selected scheme over `times`.
    pub fn build(self, times: Vec<Time>) -> Result<Box<dyn LookupScheme>, OdPostError> {
        Ok(match self {
            LookupSchemeKind::BinarySearch => Box::new(BinarySearchLookupScheme::new(times)?),
            LookupSchemeKind::Hunting => Box::new(HuntingLookupScheme::new(times)?),
        })
    }
}

pub trait LookupScheme {
    /// Largest index `i` with `values()[i] <= t`, clamped to `[0, len() - 1]`.
    fn find_nearest_lower_neighbour(&self, t: Time) -> usize;

    /// The sorted values the scheme was built over.
    fn values(&self) -> &[Time];

    fn len(&self) -> usize {
        self.values().len()
    }

    fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

fn check_sorted(values: &[Time]) -> Result<(), OdPostError> {
    if values.is_empty() {
        return Err(OdPostError::NoObservations);
    }
    match values.windows(2).position(|w| w[1] < w[0]) {
        Some(i) => Err(OdPostError::UnsortedTimes { index: i + 1 }),
        None => Ok(()),
    }
}

/// Nearest-lower-neighbour index inside `values[lo..hi]`, offset back to the full slice.
///
/// Requires `values[lo] <= t` unless `lo == 0`.
#[inline]
fn bisect(values: &[Time], lo: usize, hi: usize, t: Time) -> usize {
    let upper = lo + values[lo..hi].partition_point(|&v| v <= t);
    upper.saturating_sub(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinarySearchLookupScheme {
    values: Vec<Time>,
}

impl BinarySearchLookupScheme {
    /// Return
    /// ----------
    /// * `Err(OdPostError::NoObservations)` if `values` is empty.
    /// * `Err(OdPostError::UnsortedTimes)` if `values` is not non-decreasing.
    pub fn new(values: Vec<Time>) -> Result<Self, OdPostError> {
        check_sorted(&values)?;
        Ok(BinarySearchLookupScheme { values })
    }
}

impl LookupScheme for BinarySearchLookupScheme {
    fn find_nearest_lower_neighbour(&self, t: Time) -> usize {
        let index = bisect(&self.values, 0, self.values.len(), t);
        trace!("binary search lookup: t = {t} -> index {index}");
        index
    }

    fn values(&self) -> &[Time] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HuntingLookupScheme {
    values: Vec<Time>,
    previous: Cell<usize>,
}

impl HuntingLookupScheme {
    /// Same preconditions as [`BinarySearchLookupScheme::new`].
    pub fn new(values: Vec<Time>) -> Result<Self, OdPostError> {
        check_sorted(&values)?;
        Ok(HuntingLookupScheme {
            values,
            previous: Cell::new(0),
        })
    }

    /// Expanding search from `start` until `t` is bracketed as `values[lo] <= t < values[hi]`
    /// (with `hi` possibly one past the end).
    fn hunt(&self, start: usize, t: Time) -> (usize, usize) {
        let n = self.values.len();
        let mut step = 1;

        if self.values[start] <= t {
            let mut lo = start;
            loop {
                let candidate = lo + step;
                if candidate >= n {
                    return (lo, n);
                }
                if self.values[candidate] <= t {
                    lo = candidate;
                    step *= 2;
                } else {
                    return (lo, candidate);
                }
            }
        }

        let mut hi = start;
        loop {
            match hi.checked_sub(step) {
                None => return (0, hi),
                Some(candidate) if self.values[candidate] <= t => return (candidate, hi),
                Some(candidate) => {
                    hi = candidate;
                    step *= 2;
                }
            }
        }
    }
}

impl LookupScheme for HuntingLookupScheme {
    fn find_nearest_lower_neighbour(&self, t: Time) -> usize {
        let (lo, hi) = self.hunt(self.previous.get(), t);
        let index = bisect(&self.values, lo, hi, t);
        self.previous.set(index);
        trace!("hunting lookup: t = {t}, bracket [{lo}, {hi}) -> index {index}");
        index
    }

    fn values(&self) -> &[Time] {
        &self.values
    }
}
