//! # Constants and type definitions for odpost
//!
//! Shared type aliases and default numerical settings used by the post-processing
//! pipeline (collation, time ordering, covariance history).

use nalgebra::{DMatrix, DVector};

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Observation time tag, in the time unit of the estimator (TDB seconds past J2000).
pub type Time = f64;

/// Dense real matrix used for information and covariance matrices.
pub type Matrix = DMatrix<f64>;

/// Dense real column vector (observations, weights, normalization factors).
pub type Vector = DVector<f64>;

// -------------------------------------------------------------------------------------------------
// Defaults
// -------------------------------------------------------------------------------------------------

/// Number of seconds in a Julian day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Default output step of the covariance history: one day.
pub const DEFAULT_OUTPUT_TIME_STEP: Time = SECONDS_PER_DAY;

/// Default tolerance added to each output query time before the lookup.
pub const DEFAULT_TIME_TOLERANCE: Time = 0.0;
