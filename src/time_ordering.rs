//! # Chronological ordering of observations
//!
//! The estimator delivers the information matrix and weight diagonal in type-and-link
//! order (see [`ObservationCollection`]). Building a covariance history needs them in
//! chronological order instead. This module:
//!
//! 1. computes a **stable** sort permutation of the concatenated time tags
//!    ([`SortPermutation::from_times`]),
//! 2. applies it to the rows of the information matrix and to the weight diagonal
//!    ([`reorder_rows`], [`reorder_vector`]),
//! 3. bundles the result in [`TimeOrderedInformation`].
//!
//! Ties keep their type-and-link order, so simultaneous observations always form one
//! contiguous run and identical inputs always produce identical permutations.

use itertools::Itertools;
use ordered_float::OrderedFloat;

use crate::constants::{Matrix, Time, Vector};
use crate::observations::collection::ObservationCollection;
use crate::odpost_errors::OdPostError;

/// Permutation mapping chronological rank to the original concatenation index.
///
/// `permutation[i]` is the index, in type-and-link order, of the `i`-th earliest scalar
/// observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortPermutation(Vec<usize>);

impl SortPermutation {
    /// Stable ascending sort order of `times`, together with the sorted times.
    pub fn from_times(times: &[Time]) -> (Self, Vec<Time>) {
        let order: Vec<usize> = (0..times.len())
            .sorted_by_key(|&i| OrderedFloat(times[i]))
            .collect();
        let sorted = order.iter().map(|&i| times[i]).collect();
        (SortPermutation(order), sorted)
    }

    /// Wrap an explicit index order, checking that it is a bijection on `0..order.len()`.
    pub fn from_order(order: Vec<usize>) -> Result<Self, OdPostError> {
        let len = order.len();
        let mut seen = vec![false; len];
        for (position, &index) in order.iter().enumerate() {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                Some(_) => return Err(OdPostError::DuplicateIndex { index, position }),
                None => return Err(OdPostError::IndexOutOfBounds { index, len }),
            }
        }
        Ok(SortPermutation(order))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inverse permutation: original index to chronological rank.
    pub fn inverse(&self) -> SortPermutation {
        let mut inverse = vec![0; self.0.len()];
        for (rank, &index) in self.0.iter().enumerate() {
            inverse[index] = rank;
        }
        SortPermutation(inverse)
    }

    /// Reorder `values` so that entry `i` of the output is `values[self[i]]`.
    pub fn apply<T: Clone>(&self, values: &[T]) -> Result<Vec<T>, OdPostError> {
        self.check_len(values.len())?;
        Ok(self.0.iter().map(|&i| values[i].clone()).collect())
    }

    fn check_len(&self, rows: usize) -> Result<(), OdPostError> {
        if self.0.len() != rows {
            return Err(OdPostError::SortConsistency {
                permutation: self.0.len(),
                rows,
            });
        }
        Ok(())
    }
}

/// Reorder the rows of `matrix`: row `i` of the result is row `permutation[i]` of the input.
///
/// Return
/// ----------
/// * `Err(OdPostError::SortConsistency)` if the permutation length differs from the
///   number of rows.
pub fn reorder_rows(
    matrix: &Matrix,
    permutation: &SortPermutation,
) -> Result<Matrix, OdPostError> {
    permutation.check_len(matrix.nrows())?;
    Ok(matrix.select_rows(permutation.as_slice()))
}

/// Reorder the entries of `vector` with the same convention as [`reorder_rows`].
pub fn reorder_vector(
    vector: &Vector,
    permutation: &SortPermutation,
) -> Result<Vector, OdPostError> {
    permutation.check_len(vector.nrows())?;
    Ok(vector.select_rows(permutation.as_slice()))
}

/// Information matrix, weights and time tags, all sorted by observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeOrderedInformation {
    /// Information matrix rows in chronological order.
    pub information_matrix: Matrix,
    /// Weight diagonal in chronological order.
    pub weights: Vector,
    /// Non-decreasing time tags, one per row.
    pub times: Vec<Time>,
    /// Permutation used to go from type-and-link order to chronological order.
    pub permutation: SortPermutation,
}

impl TimeOrderedInformation {
    /// Sort the type-and-link ordered information matrix and weights by observation time.
    ///
    /// Arguments
    /// -----------------
    /// * `measurements` – the observations the information matrix was computed from.
    /// * `information_matrix` – one row per scalar observation, in type-and-link order.
    /// * `weights` – weight diagonal, in the same order.
    ///
    /// Return
    /// ----------
    /// * `Err(OdPostError::SortConsistency)` if the number of scalar observations differs from
    ///   the number of information matrix rows or weights.
    pub fn build(
        measurements: &ObservationCollection,
        information_matrix: &Matrix,
        weights: &Vector,
    ) -> Result<Self, OdPostError> {
        let concatenated_times = measurements.concatenated_times();
        let (permutation, times) = SortPermutation::from_times(&concatenated_times);

        Ok(TimeOrderedInformation {
            information_matrix: reorder_rows(information_matrix, &permutation)?,
            weights: reorder_vector(weights, &permutation)?,
            times,
            permutation,
        })
    }

    /// Number of scalar observations.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}
