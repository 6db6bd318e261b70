//! # Covariance as a function of time
//!
//! [`covariance_matrix_as_function_of_time`] turns the output of a batch estimation into a
//! [`CovarianceHistory`]: the covariance the estimation would have produced had it only
//! used the observations up to each output epoch.
//!
//! ## Pipeline
//!
//! 1. **Validation** – shapes of the a-priori matrix, information matrix, normalization
//!    factors and weights are checked before any numerical work.
//! 2. **Time ordering** – the observations are collated, stably sorted by time, and the
//!    information matrix and weights are permuted accordingly
//!    ([`TimeOrderedInformation`]).
//! 3. **Output loop** – starting from the earliest observation time `t₀`, query times
//!    `t₀ + k·Δt` (`k = 1, 2, …`) are visited while the previous query time is before the
//!    last observation. For each query, the last included observation is found with a
//!    [`LookupScheme`](crate::lookup::LookupScheme) and extended through any run of
//!    simultaneous observations, so such a run is never split across two epochs.
//! 4. **Covariance** – the normal equations of the included prefix are inverted and
//!    unnormalized, then stored under the time of the last included observation.
//!
//! No covariance is produced for `t₀` itself, even when a query falls before the second
//! observation time. The query overshooting the last observation
//! is clamped to it and emitted unless
//! [`emit_trailing_partial_step`](crate::covariance::CovarianceHistoryParams) is disabled.
//!
//! ## Errors
//!
//! Every failure aborts the whole computation; a history with missing epochs is never
//! returned. See [`OdPostError`] for the taxonomy.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use ordered_float::OrderedFloat;

use crate::constants::{Matrix, Time, Vector};
use crate::covariance::normal_equations::{
    check_normal_equation_shapes, unnormalize, NormalEquations,
};
use crate::covariance::CovarianceHistoryParams;
use crate::estimation::{EstimationInput, EstimationOutput};
use crate::observations::collection::ObservationCollection;
use crate::odpost_errors::OdPostError;
use crate::time_ordering::TimeOrderedInformation;

/// Unnormalized covariance matrices keyed by the time of the last included observation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CovarianceHistory {
    entries: BTreeMap<OrderedFloat<Time>, Matrix>,
}

impl CovarianceHistory {
    /// Compute the history from the carriers of an estimation run.
    ///
    /// `output.normalization_factors` are multipliers: the physical covariance is
    /// `diag(f) · P_normalized · diag(f)`. An estimator that normalizes by dividing the
    /// partials by a transformation diagonal `d` (so that the physical covariance is
    /// `diag(d)⁻¹ · P_normalized · diag(d)⁻¹`) must pass `f = 1 / d` element-wise.
    ///
    /// See [`covariance_matrix_as_function_of_time`].
    pub fn from_estimation(
        input: &EstimationInput,
        output: &EstimationOutput,
        params: &CovarianceHistoryParams,
    ) -> Result<Self, OdPostError> {
        covariance_matrix_as_function_of_time(
            &input.measurements,
            &output.normalized_information_matrix,
            &output.normalization_factors,
            &output.weights_diagonal,
            &input.normalized_inverse_apriori_covariance,
            params,
        )
    }

    /// Covariance stored exactly at epoch `t`.
    pub fn get(&self, t: Time) -> Option<&Matrix> {
        self.entries.get(&OrderedFloat(t))
    }

    /// Covariance of the latest epoch at or before `t`.
    pub fn at_or_before(&self, t: Time) -> Option<(Time, &Matrix)> {
        self.entries
            .range(..=OrderedFloat(t))
            .next_back()
            .map(|(k, v)| (k.0, v))
    }

    /// Epochs and covariances in chronological order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Time, &Matrix)> + '_ {
        self.entries.iter().map(|(k, v)| (k.0, v))
    }

    pub fn epochs(&self) -> Vec<Time> {
        self.entries.keys().map(|k| k.0).collect()
    }

    pub fn first(&self) -> Option<(Time, &Matrix)> {
        self.iter().next()
    }

    pub fn last(&self) -> Option<(Time, &Matrix)> {
        self.iter().next_back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<OrderedFloat<Time>, Matrix> {
        self.entries
    }

    /// Formal errors (square roots of the covariance diagonal) at each epoch.
    pub fn formal_errors(&self) -> BTreeMap<OrderedFloat<Time>, Vector> {
        self.entries
            .iter()
            .map(|(k, covariance)| (*k, formal_errors(covariance)))
            .collect()
    }

    /// Correlation matrices at each epoch.
    ///
    /// Entries involving a parameter with zero formal error are set to zero.
    pub fn correlations(&self) -> BTreeMap<OrderedFloat<Time>, Matrix> {
        self.entries
            .iter()
            .map(|(k, covariance)| (*k, correlation(covariance)))
            .collect()
    }
}

fn formal_errors(covariance: &Matrix) -> Vector {
    covariance.diagonal().map(f64::sqrt)
}

fn correlation(covariance: &Matrix) -> Matrix {
    let sigma = formal_errors(covariance);
    Matrix::from_fn(covariance.nrows(), covariance.ncols(), |i, j| {
        let scale = sigma[i] * sigma[j];
        if scale > 0.0 {
            covariance[(i, j)] / scale
        } else {
            0.0
        }
    })
}

impl fmt::Display for CovarianceHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_params = self.first().map_or(0, |(_, m)| m.nrows());
        match (self.first(), self.last()) {
            (Some((start, _)), Some((end, _))) => write!(
                f,
                "CovarianceHistory({} epochs, {} parameters, [{}, {}])",
                self.len(),
                n_params,
                start,
                end
            )?,
            _ => write!(f, "CovarianceHistory(empty)")?,
        }

        if f.alternate() {
            writeln!(f)?;
            for (epoch, covariance) in self.iter() {
                write!(f, "  {epoch:>16.3} |")?;
                for sigma in formal_errors(covariance).iter() {
                    write!(f, " {sigma:>12.5e}")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Walk forward from `index` through observations sharing its exact time tag.
///
/// The last row is terminal. An `index` outside the table is an inconsistency of the
/// lookup and is reported as [`OdPostError::IndexOutOfBounds`].
fn extend_through_ties(times: &[Time], index: usize) -> Result<usize, OdPostError> {
    let len = times.len();
    if index >= len {
        return Err(OdPostError::IndexOutOfBounds { index, len });
    }
    let mut index = index;
    while index + 1 < len && times[index] == times[index + 1] {
        index += 1;
    }
    Ok(index)
}

/// Compute the unnormalized covariance at regular output epochs.
///
/// Arguments
/// -----------------
/// * `measurements` – all observations used by the estimation, in canonical type-and-link order.
/// * `normalized_information_matrix` – one row per scalar observation (type-and-link order),
///   one column per parameter, partials already scaled by the normalization factors.
/// * `normalization_factors` – per-parameter factors `f` such that the physical covariance is
///   `diag(f) · P_normalized · diag(f)`.
/// * `weights_diagonal` – weight of each scalar observation, same order as the matrix rows.
/// * `normalized_inverse_apriori_covariance` – square, one row/column per parameter.
/// * `params` – output step and numerical settings.
///
/// Return
/// ----------
/// * The covariance history, keyed by the time of the last observation included at each epoch.
///
/// Errors
/// ----------
/// * [`OdPostError::NonSquareMatrix`] – the a-priori matrix is not square.
/// * [`OdPostError::NonSymmetricMatrix`] – the a-priori matrix is not symmetric.
/// * [`OdPostError::ShapeMismatch`] – parameter or observation counts disagree.
/// * [`OdPostError::SortConsistency`] – the observations do not match the matrix rows.
/// * [`OdPostError::InvalidWeight`] – a weight is negative or not finite.
/// * [`OdPostError::InvalidParameter`] – `params` fails
///   [`CovarianceHistoryParams::validate`].
/// * [`OdPostError::NoObservations`] – there is nothing to process.
/// * [`OdPostError::SingularMatrix`] – the normal equations cannot be inverted at some epoch.
pub fn covariance_matrix_as_function_of_time(
    measurements: &ObservationCollection,
    normalized_information_matrix: &Matrix,
    normalization_factors: &Vector,
    weights_diagonal: &Vector,
    normalized_inverse_apriori_covariance: &Matrix,
    params: &CovarianceHistoryParams,
) -> Result<CovarianceHistory, OdPostError> {
    check_normal_equation_shapes(
        normalized_information_matrix,
        weights_diagonal,
        normalized_inverse_apriori_covariance,
    )?;
    let n_params = normalized_inverse_apriori_covariance.ncols();
    if normalization_factors.len() != n_params {
        return Err(OdPostError::ShapeMismatch {
            context: "normalization factors length",
            expected: n_params,
            found: normalization_factors.len(),
        });
    }
    if let Some((index, &value)) = weights_diagonal
        .iter()
        .enumerate()
        .find(|(_, w)| !(w.is_finite() && **w >= 0.0))
    {
        return Err(OdPostError::InvalidWeight { index, value });
    }
    // Params may come from a struct literal or a config file rather than the builder
    params.validate()?;
    let step = params.output_time_step;

    let TimeOrderedInformation {
        information_matrix,
        weights,
        times,
        ..
    } = TimeOrderedInformation::build(
        measurements,
        normalized_information_matrix,
        weights_diagonal,
    )?;

    let lookup = params.lookup.build(times)?;
    let times = lookup.values();
    let start = times[0];
    let end = times[times.len() - 1];

    let mut normal_equations = NormalEquations::new(
        &information_matrix,
        &weights,
        normalized_inverse_apriori_covariance,
    )?;
    let mut entries = BTreeMap::new();
    let mut previous_index = None;

    let mut k: u64 = 0;
    let mut query = start;
    while query < end {
        k += 1;
        query = start + k as f64 * step;
        if !params.emit_trailing_partial_step && query > end + params.time_tolerance {
            break;
        }

        let index = extend_through_ties(
            times,
            lookup.find_nearest_lower_neighbour(query + params.time_tolerance),
        )?;
        let epoch = times[index];
        // Only the initial cluster is covered yet, or nothing new since the last epoch
        if epoch == start || previous_index == Some(index) {
            continue;
        }

        normal_equations.absorb_rows(index + 1)?;
        let normalized = normal_equations
            .covariance(params.inversion)
            .ok_or(OdPostError::SingularMatrix { epoch })?;
        debug!(
            "covariance at epoch {epoch} (query {query}): {} of {} observations",
            index + 1,
            times.len()
        );

        entries.insert(
            OrderedFloat(epoch),
            unnormalize(&normalized, normalization_factors),
        );
        previous_index = Some(index);
    }

    info!(
        "covariance history: {} epochs over [{start}, {end}], {} observations, \
         {n_params} parameters",
        entries.len(),
        times.len()
    );
    Ok(CovarianceHistory { entries })
}
