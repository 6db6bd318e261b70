use thiserror::Error;

use crate::constants::Time;

#[derive(Error, Debug, Clone)]
pub enum OdPostError {
    #[error("Shape mismatch in {context}: expected {expected}, found {found}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Matrix is not square: {rows} rows, {cols} columns")]
    NonSquareMatrix { rows: usize, cols: usize },

    #[error("Matrix is not symmetric: entries ({row}, {col}) and ({col}, {row}) differ")]
    NonSymmetricMatrix { row: usize, col: usize },

    #[error("Time sort order has {permutation} entries but the information matrix has {rows} rows")]
    SortConsistency { permutation: usize, rows: usize },

    #[error("Index {index} appears twice in the sort order (again at position {position})")]
    DuplicateIndex { index: usize, position: usize },

    #[error("Observation index {index} is out of bounds (number of observations: {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Normal equations are singular at epoch {epoch}")]
    SingularMatrix { epoch: Time },

    #[error("No observations available")]
    NoObservations,

    #[error("Duplicate observation record: {0}")]
    DuplicateObservationRecord(String),

    #[error("Observation times are not sorted: time {index} is earlier than its predecessor")]
    UnsortedTimes { index: usize },

    #[error("Non-finite observation time at sample {index}")]
    NonFiniteTime { index: usize },

    #[error("Invalid weight {value} for observation {index}")]
    InvalidWeight { index: usize, value: f64 },

    #[error("Invalid covariance history parameter: {0}")]
    InvalidParameter(String),
}

impl PartialEq for OdPostError {
    fn eq(&self, other: &Self) -> bool {
        use OdPostError::*;
        match (self, other) {
            (
                ShapeMismatch {
                    context: c1,
                    expected: e1,
                    found: f1,
                },
                ShapeMismatch {
                    context: c2,
                    expected: e2,
                    found: f2,
                },
            ) => c1 == c2 && e1 == e2 && f1 == f2,
            (NonSquareMatrix { rows: r1, cols: c1 }, NonSquareMatrix { rows: r2, cols: c2 }) => {
                r1 == r2 && c1 == c2
            }
            (
                NonSymmetricMatrix { row: r1, col: c1 },
                NonSymmetricMatrix { row: r2, col: c2 },
            ) => r1 == r2 && c1 == c2,
            (
                SortConsistency {
                    permutation: p1,
                    rows: r1,
                },
                SortConsistency {
                    permutation: p2,
                    rows: r2,
                },
            ) => p1 == p2 && r1 == r2,
            (
                DuplicateIndex {
                    index: i1,
                    position: p1,
                },
                DuplicateIndex {
                    index: i2,
                    position: p2,
                },
            ) => i1 == i2 && p1 == p2,
            (IndexOutOfBounds { index: i1, len: l1 }, IndexOutOfBounds { index: i2, len: l2 }) => {
                i1 == i2 && l1 == l2
            }
            // Epochs compare bitwise so that NaN epochs still match themselves
            (SingularMatrix { epoch: a }, SingularMatrix { epoch: b }) => {
                a.to_bits() == b.to_bits()
            }
            (DuplicateObservationRecord(a), DuplicateObservationRecord(b)) => a == b,
            (UnsortedTimes { index: a }, UnsortedTimes { index: b }) => a == b,
            (NonFiniteTime { index: a }, NonFiniteTime { index: b }) => a == b,
            (
                InvalidWeight {
                    index: i1,
                    value: v1,
                },
                InvalidWeight {
                    index: i2,
                    value: v2,
                },
            ) => i1 == i2 && v1.to_bits() == v2.to_bits(),
            (InvalidParameter(a), InvalidParameter(b)) => a == b,

            (NoObservations, NoObservations) => true,

            _ => false,
        }
    }
}
