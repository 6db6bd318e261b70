//! # Normal equations and covariance inversion
//!
//! For the first `k` time-ordered observations, the inverse of the normalized covariance
//! is
//!
//! ```text
//! Λ_k = Λ₀ + H_kᵀ · diag(w_k) · H_k
//! ```
//!
//! with `Λ₀` the normalized inverse a-priori covariance, `H_k` the first `k` rows of the
//! normalized information matrix and `w_k` their weights. The normalized covariance is
//! `Λ_k⁻¹`, and the covariance in physical units is `U · Λ_k⁻¹ · U` with
//! `U = diag(normalization factors)`.
//!
//! [`NormalEquations`] accumulates `H_kᵀ · diag(w_k) · H_k` row by row, so a growing
//! prefix only costs the newly included rows. Accumulation always runs in row order
//! on the lower triangle, which makes the incremental path bit-identical to a one-shot
//! evaluation ([`inverse_of_updated_covariance`]) and the result exactly symmetric.

use log::warn;
use nalgebra::DMatrix;

use crate::constants::{Matrix, Vector};
use crate::covariance::InversionMethod;
use crate::odpost_errors::OdPostError;

/// Relative tolerance on `|a_ij - a_ji|` when checking the a-priori matrix for symmetry.
const SYMMETRY_TOLERANCE: f64 = 1e-12;

/// Check that `inverse_apriori` is square and symmetric, and that the information matrix
/// and weights agree with it and with each other.
pub(crate) fn check_normal_equation_shapes(
    information_matrix: &Matrix,
    weights: &Vector,
    inverse_apriori: &Matrix,
) -> Result<(), OdPostError> {
    if inverse_apriori.nrows() != inverse_apriori.ncols() {
        return Err(OdPostError::NonSquareMatrix {
            rows: inverse_apriori.nrows(),
            cols: inverse_apriori.ncols(),
        });
    }
    let n_params = inverse_apriori.ncols();
    for j in 0..n_params {
        for i in (j + 1)..n_params {
            let (lower, upper) = (inverse_apriori[(i, j)], inverse_apriori[(j, i)]);
            let scale = lower.abs().max(upper.abs());
            if (lower - upper).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(OdPostError::NonSymmetricMatrix { row: i, col: j });
            }
        }
    }
    if information_matrix.ncols() != inverse_apriori.ncols() {
        return Err(OdPostError::ShapeMismatch {
            context: "information matrix columns",
            expected: inverse_apriori.ncols(),
            found: information_matrix.ncols(),
        });
    }
    if weights.len() != information_matrix.nrows() {
        return Err(OdPostError::ShapeMismatch {
            context: "weight diagonal length",
            expected: information_matrix.nrows(),
            found: weights.len(),
        });
    }
    Ok(())
}

/// Running sum of the normal equations over a growing prefix of observations.
#[derive(Debug, Clone)]
pub struct NormalEquations<'a> {
    information_matrix: &'a Matrix,
    weights: &'a Vector,
    inverse_apriori: &'a Matrix,
    /// Lower triangle of `H_kᵀ · diag(w_k) · H_k`, upper triangle left at zero.
    lower: Matrix,
    absorbed: usize,
}

impl<'a> NormalEquations<'a> {
    /// Start from the a-priori information only (no observation absorbed).
    ///
    /// Return
    /// ----------
    /// * `Err(OdPostError::NonSquareMatrix)` if `inverse_apriori` is not square.
    /// * `Err(OdPostError::NonSymmetricMatrix)` if it is not symmetric within round-off.
    /// * `Err(OdPostError::ShapeMismatch)` if the information matrix columns or the weight
    ///   count are inconsistent.
    pub fn new(
        information_matrix: &'a Matrix,
        weights: &'a Vector,
        inverse_apriori: &'a Matrix,
    ) -> Result<Self, OdPostError> {
        check_normal_equation_shapes(information_matrix, weights, inverse_apriori)?;
        let n_params = inverse_apriori.ncols();
        Ok(NormalEquations {
            information_matrix,
            weights,
            inverse_apriori,
            lower: DMatrix::zeros(n_params, n_params),
            absorbed: 0,
        })
    }

    /// Number of leading observation rows currently included.
    pub fn absorbed_rows(&self) -> usize {
        self.absorbed
    }

    /// Include rows up to (excluding) `upto`.
    ///
    /// Moving backwards restarts the accumulation from the a-priori information.
    ///
    /// Return
    /// ----------
    /// * `Err(OdPostError::IndexOutOfBounds)` if `upto` exceeds the number of rows.
    pub fn absorb_rows(&mut self, upto: usize) -> Result<(), OdPostError> {
        let n_rows = self.information_matrix.nrows();
        if upto > n_rows {
            return Err(OdPostError::IndexOutOfBounds {
                index: upto - 1,
                len: n_rows,
            });
        }
        if upto < self.absorbed {
            self.lower.fill(0.0);
            self.absorbed = 0;
        }

        let information_matrix = self.information_matrix;
        let n_params = self.lower.ncols();
        for row in self.absorbed..upto {
            let weight = self.weights[row];
            let partials = information_matrix.row(row);
            for j in 0..n_params {
                let weighted = weight * partials[j];
                for i in j..n_params {
                    self.lower[(i, j)] += weighted * partials[i];
                }
            }
        }
        self.absorbed = upto;
        Ok(())
    }

    /// `Λ₀ + H_kᵀ · diag(w_k) · H_k` for the rows absorbed so far.
    pub fn inverse_covariance(&self) -> Matrix {
        let mut information = self.lower.clone();
        information.fill_upper_triangle_with_lower_triangle();
        information + self.inverse_apriori
    }

    /// Normalized covariance for the rows absorbed so far, `None` if the normal equations
    /// cannot be inverted with `method`.
    pub fn covariance(&self, method: InversionMethod) -> Option<Matrix> {
        invert(self.inverse_covariance(), method)
    }
}

/// One-shot `Λ₀ + Hᵀ · diag(w) · H` over all rows of `information_matrix`.
pub fn inverse_of_updated_covariance(
    information_matrix: &Matrix,
    weights: &Vector,
    inverse_apriori: &Matrix,
) -> Result<Matrix, OdPostError> {
    let mut normal_equations = NormalEquations::new(information_matrix, weights, inverse_apriori)?;
    normal_equations.absorb_rows(information_matrix.nrows())?;
    Ok(normal_equations.inverse_covariance())
}

/// Invert `matrix` with the requested method.
///
/// Return
/// ----------
/// * `None` if the decomposition fails or the inverse contains non-finite entries.
/// * Otherwise the symmetric part of the inverse.
pub fn invert(matrix: Matrix, method: InversionMethod) -> Option<Matrix> {
    let inverse = match method {
        InversionMethod::Lu => matrix.try_inverse()?,
        InversionMethod::Cholesky => matrix.cholesky()?.inverse(),
        InversionMethod::PseudoInverse { epsilon } => {
            warn!("inverting normal equations with a pseudo-inverse (eps = {epsilon:e})");
            matrix.pseudo_inverse(epsilon).ok()?
        }
    };
    if !inverse.iter().all(|x| x.is_finite()) {
        return None;
    }
    // Input is symmetric, the decompositions only lose symmetry to round-off
    Some((&inverse + inverse.transpose()) * 0.5)
}

/// `diag(f) · m · diag(f)`, evaluated entry-wise so that symmetric input stays exactly symmetric.
fn scale_symmetric(m: &Matrix, factors: &Vector) -> Matrix {
    Matrix::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)] * (factors[i] * factors[j]))
}

/// Bring a normalized covariance back to physical units: `U · P · U`, `U = diag(factors)`.
pub fn unnormalize(normalized_covariance: &Matrix, normalization_factors: &Vector) -> Matrix {
    scale_symmetric(normalized_covariance, normalization_factors)
}

/// Express a physical inverse covariance in normalized parameters: `U · Λ · U`.
///
/// This is the inverse of [`unnormalize`] once the matrices are inverted, i.e.
/// `unnormalize(normalize_inverse_covariance(Λ, f)⁻¹, f) = Λ⁻¹`.
pub fn normalize_inverse_covariance(
    inverse_covariance: &Matrix,
    normalization_factors: &Vector,
) -> Matrix {
    scale_symmetric(inverse_covariance, normalization_factors)
}

#[cfg(test)]
mod normal_equations_test {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn test_matches_dense_product() {
        let h = dmatrix![1.0, 2.0; 0.5, -1.0; 3.0, 0.25];
        let w = dvector![2.0, 1.0, 0.5];
        let apriori = dmatrix![1.0, 0.1; 0.1, 2.0];

        let expected = &apriori + h.transpose() * Matrix::from_diagonal(&w) * &h;
        let computed = inverse_of_updated_covariance(&h, &w, &apriori).unwrap();
        assert_relative_eq!(computed, expected, max_relative = 1e-14);
        assert_eq!(computed, computed.transpose());
    }

    #[test]
    fn test_incremental_is_bit_identical() {
        let h = dmatrix![1.0, 2.0, 0.3; 0.5, -1.0, 1.7; 3.0, 0.25, -0.9; 0.1, 0.2, 0.3];
        let w = dvector![2.0, 1.0, 0.5, 4.0];
        let apriori = Matrix::identity(3, 3) * 1e-3;

        let mut incremental = NormalEquations::new(&h, &w, &apriori).unwrap();
        for k in 1..=4 {
            incremental.absorb_rows(k).unwrap();
            let prefix = h.rows(0, k).into_owned();
            let prefix_w = w.rows(0, k).into_owned();
            let direct = inverse_of_updated_covariance(&prefix, &prefix_w, &apriori).unwrap();
            assert_eq!(incremental.inverse_covariance(), direct);
        }

        // Going backwards restarts from the a-priori information
        incremental.absorb_rows(2).unwrap();
        let direct = inverse_of_updated_covariance(
            &h.rows(0, 2).into_owned(),
            &w.rows(0, 2).into_owned(),
            &apriori,
        )
        .unwrap();
        assert_eq!(incremental.inverse_covariance(), direct);
    }

    #[test]
    fn test_absorb_past_end() {
        let h = dmatrix![1.0; 2.0];
        let w = dvector![1.0, 1.0];
        let apriori = dmatrix![1.0];
        let mut normal_equations = NormalEquations::new(&h, &w, &apriori).unwrap();
        assert_eq!(
            normal_equations.absorb_rows(3).unwrap_err(),
            OdPostError::IndexOutOfBounds { index: 2, len: 2 }
        );
    }

    #[test]
    fn test_shape_checks() {
        let h = dmatrix![1.0, 2.0];
        let w = dvector![1.0];
        assert_eq!(
            NormalEquations::new(&h, &w, &dmatrix![1.0, 0.0, 0.0; 0.0, 1.0, 0.0]).unwrap_err(),
            OdPostError::NonSquareMatrix { rows: 2, cols: 3 }
        );
        assert_eq!(
            NormalEquations::new(&h, &w, &Matrix::identity(3, 3)).unwrap_err(),
            OdPostError::ShapeMismatch {
                context: "information matrix columns",
                expected: 3,
                found: 2
            }
        );
        assert_eq!(
            NormalEquations::new(&h, &dvector![1.0, 2.0], &Matrix::identity(2, 2)).unwrap_err(),
            OdPostError::ShapeMismatch {
                context: "weight diagonal length",
                expected: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_rejects_non_symmetric_apriori() {
        let h = dmatrix![1.0, 2.0, 0.5];
        let w = dvector![1.0];
        let apriori = dmatrix![1.0, 0.0, 0.3; 0.0, 1.0, 0.0; 0.0, 0.0, 1.0];
        assert_eq!(
            NormalEquations::new(&h, &w, &apriori).unwrap_err(),
            OdPostError::NonSymmetricMatrix { row: 2, col: 0 }
        );

        // Round-off level asymmetry is accepted
        let mut nearly = Matrix::identity(3, 3);
        nearly[(0, 1)] = 0.1;
        nearly[(1, 0)] = 0.1 * (1.0 + 1e-15);
        assert!(NormalEquations::new(&h, &w, &nearly).is_ok());
    }

    #[test]
    fn test_invert_methods_agree() {
        let m = dmatrix![4.0, 1.0, 0.5; 1.0, 3.0, 0.2; 0.5, 0.2, 2.0];
        let lu = invert(m.clone(), InversionMethod::Lu).unwrap();
        let cholesky = invert(m.clone(), InversionMethod::Cholesky).unwrap();
        let pinv = invert(m.clone(), InversionMethod::PseudoInverse { epsilon: 1e-14 }).unwrap();
        assert_relative_eq!(&lu * &m, Matrix::identity(3, 3), epsilon = 1e-12);
        assert_relative_eq!(lu, cholesky, epsilon = 1e-12);
        assert_relative_eq!(lu, pinv, epsilon = 1e-12);
    }

    #[test]
    fn test_invert_singular() {
        let zero = Matrix::zeros(2, 2);
        assert!(invert(zero.clone(), InversionMethod::Lu).is_none());
        assert!(invert(zero.clone(), InversionMethod::Cholesky).is_none());

        let rank_one = dmatrix![1.0, 2.0; 2.0, 4.0];
        assert!(invert(rank_one.clone(), InversionMethod::Lu).is_none());

        // Only the pseudo-inverse accepts a singular matrix
        let pinv = invert(rank_one, InversionMethod::PseudoInverse { epsilon: 1e-10 }).unwrap();
        assert_relative_eq!(pinv, dmatrix![0.04, 0.08; 0.08, 0.16], epsilon = 1e-12);
    }

    #[test]
    fn test_unnormalize_round_trip() {
        let factors = dvector![10.0, 0.5];
        let inverse_apriori = dmatrix![4.0, 1.0; 1.0, 2.0];
        let normalized = normalize_inverse_covariance(&inverse_apriori, &factors);
        let covariance = unnormalize(
            &invert(normalized, InversionMethod::Lu).unwrap(),
            &factors,
        );
        assert_relative_eq!(
            covariance,
            inverse_apriori.try_inverse().unwrap(),
            epsilon = 1e-12
        );

        let scaled = unnormalize(&dmatrix![1.0, 2.0; 2.0, 3.0], &factors);
        assert_eq!(scaled, dmatrix![100.0, 10.0; 10.0, 0.75]);
    }
}
