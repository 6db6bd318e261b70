//! # Covariance history parameters
//!
//! This module defines [`CovarianceHistoryParams`] and its builder, which control how
//! [`covariance_matrix_as_function_of_time`](crate::covariance::history::covariance_matrix_as_function_of_time)
//! walks through the time-ordered observations:
//!
//! - the output time step `Δt` between two covariance evaluations,
//! - the tolerance added to each query time before the nearest-lower-neighbour lookup,
//! - the matrix inversion used on the normal equations ([`InversionMethod`]),
//! - the lookup algorithm ([`LookupSchemeKind`]),
//! - whether the last, incomplete output interval is emitted.
//!
//! ## Example
//!
//! ```rust
//! use odpost::covariance::{CovarianceHistoryParams, InversionMethod};
//!
//! let params = CovarianceHistoryParams::builder()
//!     .output_time_step(3600.0)
//!     .inversion(InversionMethod::Cholesky)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.output_time_step, 3600.0);
//! ```
use std::cmp::Ordering::{Equal, Greater};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{Time, DEFAULT_OUTPUT_TIME_STEP, DEFAULT_TIME_TOLERANCE};
use crate::lookup::LookupSchemeKind;
use crate::odpost_errors::OdPostError;

pub mod history;
pub mod normal_equations;

/// Inversion applied to the (normalized) normal-equations matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum InversionMethod {
    /// LU decomposition; fails on a singular matrix.
    #[default]
    Lu,
    /// Cholesky decomposition; fails unless the matrix is symmetric positive definite.
    Cholesky,
    /// Moore–Penrose pseudo-inverse, singular values below `epsilon` are discarded.
    /// Never reports a singular matrix, so it must be requested explicitly.
    PseudoInverse { epsilon: f64 },
}

impl fmt::Display for InversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InversionMethod::Lu => write!(f, "LU"),
            InversionMethod::Cholesky => write!(f, "Cholesky"),
            InversionMethod::PseudoInverse { epsilon } => {
                write!(f, "pseudo-inverse (eps = {epsilon:.1e})")
            }
        }
    }
}

/// Configuration of a covariance history computation.
///
/// Fields
/// -----------------
/// * `output_time_step` – spacing `Δt` between two output query times, in the unit of the
///   observation times. The first query is at `t₀ + Δt`; no covariance is produced for `t₀`.
/// * `time_tolerance` – added to each query time before looking up the last included
///   observation. Absorbs round-off when `Δt` is meant to land exactly on observation times.
/// * `inversion` – decomposition used to invert the normal equations.
/// * `lookup` – nearest-lower-neighbour algorithm.
/// * `emit_trailing_partial_step` – when the last query time overshoots the final
///   observation, emit the covariance including all observations (`true`) or stop before
///   that incomplete interval (`false`).
///
/// Defaults
/// -----------------
/// * `output_time_step`: 86 400 (one day in seconds)
/// * `time_tolerance`: 0.0
/// * `inversion`: [`InversionMethod::Lu`]
/// * `lookup`: [`LookupSchemeKind::BinarySearch`]
/// * `emit_trailing_partial_step`: `true`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CovarianceHistoryParams {
    pub output_time_step: Time,
    pub time_tolerance: Time,
    pub inversion: InversionMethod,
    pub lookup: LookupSchemeKind,
    pub emit_trailing_partial_step: bool,
}

impl CovarianceHistoryParams {
    /// Equivalent to [`CovarianceHistoryParams::default()`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> CovarianceHistoryParamsBuilder {
        CovarianceHistoryParamsBuilder::new()
    }
}

impl Default for CovarianceHistoryParams {
    fn default() -> Self {
        CovarianceHistoryParams {
            output_time_step: DEFAULT_OUTPUT_TIME_STEP,
            time_tolerance: DEFAULT_TIME_TOLERANCE,
            inversion: InversionMethod::default(),
            lookup: LookupSchemeKind::default(),
            emit_trailing_partial_step: true,
        }
    }
}

/// Builder for [`CovarianceHistoryParams`], with validation.
#[derive(Debug, Clone, Default)]
pub struct CovarianceHistoryParamsBuilder {
    params: CovarianceHistoryParams,
}

impl CovarianceHistoryParamsBuilder {
    pub fn new() -> Self {
        Self {
            params: CovarianceHistoryParams::default(),
        }
    }

    pub fn output_time_step(mut self, v: Time) -> Self {
        self.params.output_time_step = v;
        self
    }
    pub fn time_tolerance(mut self, v: Time) -> Self {
        self.params.time_tolerance = v;
        self
    }
    pub fn inversion(mut self, v: InversionMethod) -> Self {
        self.params.inversion = v;
        self
    }
    pub fn lookup(mut self, v: LookupSchemeKind) -> Self {
        self.params.lookup = v;
        self
    }
    pub fn emit_trailing_partial_step(mut self, v: bool) -> Self {
        self.params.emit_trailing_partial_step = v;
        self
    }

    /// Finalize the builder, see [`CovarianceHistoryParams::validate`].
    pub fn build(self) -> Result<CovarianceHistoryParams, OdPostError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Return true iff x > 0.0 and finite.
#[inline]
fn gt0(x: f64) -> bool {
    x.is_finite() && x.partial_cmp(&0.0) == Some(Greater)
}

/// Return true iff x >= 0.0 and finite.
#[inline]
fn ge0(x: f64) -> bool {
    x.is_finite() && matches!(x.partial_cmp(&0.0), Some(Greater) | Some(Equal))
}

impl CovarianceHistoryParams {
    /// Check the parameters, whether they come from the builder, a struct literal or a
    /// deserialized config file.
    ///
    /// Validation rules
    /// -----------------
    /// * `output_time_step > 0` and finite, otherwise the output loop would never end.
    /// * `time_tolerance >= 0` and finite.
    /// * `PseudoInverse { epsilon }` requires `epsilon >= 0` and finite.
    pub fn validate(&self) -> Result<(), OdPostError> {
        if !gt0(self.output_time_step) {
            return Err(OdPostError::InvalidParameter(format!(
                "output_time_step must be finite and > 0, got {}",
                self.output_time_step
            )));
        }
        if !ge0(self.time_tolerance) {
            return Err(OdPostError::InvalidParameter(format!(
                "time_tolerance must be finite and >= 0, got {}",
                self.time_tolerance
            )));
        }
        if let InversionMethod::PseudoInverse { epsilon } = self.inversion {
            if !ge0(epsilon) {
                return Err(OdPostError::InvalidParameter(format!(
                    "pseudo-inverse epsilon must be finite and >= 0, got {epsilon}"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for CovarianceHistoryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            const PARAM_COL: usize = 44;
            writeln!(f, "Covariance History Parameters")?;
            writeln!(f, "-----------------------------")?;

            macro_rules! line {
                ($fmt:expr, $val:expr, $comment:expr) => {{
                    let s = format!($fmt, $val);
                    let pad = if s.len() < PARAM_COL {
                        " ".repeat(PARAM_COL - s.len())
                    } else {
                        " ".to_string()
                    };
                    writeln!(f, "  {}{}# {}", s, pad, $comment)
                }};
            }

            line!(
                "output_time_step           = {:.3}",
                self.output_time_step,
                "Spacing between output epochs"
            )?;
            line!(
                "time_tolerance             = {:.1e}",
                self.time_tolerance,
                "Slack added to each query time"
            )?;
            line!(
                "inversion                  = {}",
                self.inversion,
                "Normal equations inversion"
            )?;
            line!(
                "lookup                     = {:?}",
                self.lookup,
                "Nearest-lower-neighbour search"
            )?;
            line!(
                "emit_trailing_partial_step = {}",
                self.emit_trailing_partial_step,
                "Emit the last incomplete interval"
            )?;
            Ok(())
        } else {
            write!(
                f,
                "CovarianceHistoryParams(dt={}, tol={:.1e}, inversion={}, lookup={:?}, \
                 trailing={})",
                self.output_time_step,
                self.time_tolerance,
                self.inversion,
                self.lookup,
                self.emit_trailing_partial_step,
            )
        }
    }
}

#[cfg(test)]
mod params_test {
    use super::*;

    #[test]
    fn test_default_builds() {
        let params = CovarianceHistoryParams::builder().build().unwrap();
        assert_eq!(params, CovarianceHistoryParams::default());
        assert_eq!(params.output_time_step, 86_400.0);
        assert_eq!(params.inversion, InversionMethod::Lu);
        assert!(params.emit_trailing_partial_step);
    }

    #[test]
    fn test_rejects_invalid_time_step() {
        for dt in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = CovarianceHistoryParams::builder()
                .output_time_step(dt)
                .build()
                .unwrap_err();
            assert!(matches!(err, OdPostError::InvalidParameter(_)), "dt = {dt}");
        }
    }

    #[test]
    fn test_rejects_invalid_tolerances() {
        assert!(CovarianceHistoryParams::builder()
            .time_tolerance(-1e-9)
            .build()
            .is_err());
        assert!(CovarianceHistoryParams::builder()
            .inversion(InversionMethod::PseudoInverse { epsilon: -1.0 })
            .build()
            .is_err());
        assert!(CovarianceHistoryParams::builder()
            .inversion(InversionMethod::PseudoInverse { epsilon: 1e-12 })
            .build()
            .is_ok());
    }

    #[test]
    fn test_validate_struct_literal() {
        for tol in [f64::NAN, -2.0, f64::INFINITY] {
            let params = CovarianceHistoryParams {
                time_tolerance: tol,
                ..CovarianceHistoryParams::default()
            };
            assert!(
                matches!(params.validate(), Err(OdPostError::InvalidParameter(_))),
                "tol = {tol}"
            );
        }
        let params = CovarianceHistoryParams {
            inversion: InversionMethod::PseudoInverse { epsilon: f64::NAN },
            ..CovarianceHistoryParams::default()
        };
        assert!(params.validate().is_err());
        assert_eq!(CovarianceHistoryParams::default().validate(), Ok(()));
    }

    #[test]
    fn test_display() {
        let params = CovarianceHistoryParams::builder()
            .output_time_step(60.0)
            .build()
            .unwrap();
        let compact = format!("{params}");
        assert!(compact.starts_with("CovarianceHistoryParams(dt=60"));
        let pretty = format!("{params:#}");
        assert!(pretty.contains("output_time_step"));
        assert!(pretty.contains("LU"));
    }
}
