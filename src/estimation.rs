//! # Estimation input and output carriers
//!
//! The covariance history is computed after a batch estimation has finished. The
//! estimator itself is outside this crate; these two structs only carry what it hands
//! over:
//!
//! - [`EstimationInput`] – the observations and the a-priori information,
//! - [`EstimationOutput`] – the normalized information matrix, normalization factors and
//!   weight diagonal of the converged solution.

use crate::constants::{Matrix, Vector};
use crate::covariance::history::CovarianceHistory;
use crate::covariance::normal_equations::normalize_inverse_covariance;
use crate::covariance::CovarianceHistoryParams;
use crate::observations::collection::ObservationCollection;
use crate::odpost_errors::OdPostError;

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationInput {
    pub measurements: ObservationCollection,
    /// Inverse a-priori covariance expressed in normalized parameters.
    pub normalized_inverse_apriori_covariance: Matrix,
}

impl EstimationInput {
    pub fn new(
        measurements: ObservationCollection,
        normalized_inverse_apriori_covariance: Matrix,
    ) -> Self {
        EstimationInput {
            measurements,
            normalized_inverse_apriori_covariance,
        }
    }

    /// Build the input from an inverse a-priori covariance in physical units.
    ///
    /// Return
    /// ----------
    /// * `Err(OdPostError::NonSquareMatrix)` if the matrix is not square.
    /// * `Err(OdPostError::ShapeMismatch)` if the factors do not match its size.
    pub fn from_physical_apriori(
        measurements: ObservationCollection,
        inverse_apriori_covariance: &Matrix,
        normalization_factors: &Vector,
    ) -> Result<Self, OdPostError> {
        let (rows, cols) = inverse_apriori_covariance.shape();
        if rows != cols {
            return Err(OdPostError::NonSquareMatrix { rows, cols });
        }
        if normalization_factors.len() != cols {
            return Err(OdPostError::ShapeMismatch {
                context: "normalization factors length",
                expected: cols,
                found: normalization_factors.len(),
            });
        }
        Ok(Self::new(
            measurements,
            normalize_inverse_covariance(inverse_apriori_covariance, normalization_factors),
        ))
    }

    pub fn parameter_count(&self) -> usize {
        self.normalized_inverse_apriori_covariance.ncols()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimationOutput {
    /// Partials of each scalar observation (rows, type-and-link order) with respect to the
    /// normalized parameters (columns).
    pub normalized_information_matrix: Matrix,
    /// Per-parameter factors mapping normalized parameters back to physical units.
    pub normalization_factors: Vector,
    /// Weight of each scalar observation, same order as the information matrix rows.
    pub weights_diagonal: Vector,
}

impl EstimationOutput {
    pub fn new(
        normalized_information_matrix: Matrix,
        normalization_factors: Vector,
        weights_diagonal: Vector,
    ) -> Self {
        EstimationOutput {
            normalized_information_matrix,
            normalization_factors,
            weights_diagonal,
        }
    }

    /// Shorthand for [`CovarianceHistory::from_estimation`].
    pub fn covariance_history(
        &self,
        input: &EstimationInput,
        params: &CovarianceHistoryParams,
    ) -> Result<CovarianceHistory, OdPostError> {
        CovarianceHistory::from_estimation(input, self, params)
    }
}

#[cfg(test)]
mod estimation_test {
    use super::*;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_from_physical_apriori() {
        let input = EstimationInput::from_physical_apriori(
            ObservationCollection::new(),
            &dmatrix![1.0, 0.0; 0.0, 4.0],
            &dvector![2.0, 0.5],
        )
        .unwrap();
        assert_eq!(input.parameter_count(), 2);
        assert_eq!(
            input.normalized_inverse_apriori_covariance,
            dmatrix![4.0, 0.0; 0.0, 1.0]
        );
    }

    #[test]
    fn test_from_physical_apriori_shape_errors() {
        let err = EstimationInput::from_physical_apriori(
            ObservationCollection::new(),
            &dmatrix![1.0, 0.0],
            &dvector![1.0],
        )
        .unwrap_err();
        assert_eq!(err, OdPostError::NonSquareMatrix { rows: 1, cols: 2 });

        let err = EstimationInput::from_physical_apriori(
            ObservationCollection::new(),
            &dmatrix![1.0],
            &dvector![1.0, 2.0],
        )
        .unwrap_err();
        assert!(matches!(err, OdPostError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_empty_measurements() {
        let input = EstimationInput::new(ObservationCollection::new(), dmatrix![1.0]);
        let output = EstimationOutput::new(
            Matrix::zeros(0, 1),
            dvector![1.0],
            Vector::zeros(0),
        );
        let err = output
            .covariance_history(&input, &CovarianceHistoryParams::default())
            .unwrap_err();
        assert_eq!(err, OdPostError::NoObservations);
    }
}
